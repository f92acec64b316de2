//! CLI Commands

pub mod monitor;
pub mod plan;
pub mod reclaim;
pub mod report;
pub mod resources;
pub mod run;
pub mod suite;
