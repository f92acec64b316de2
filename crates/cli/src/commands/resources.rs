//! Resources Command

use anyhow::Result;
use serde::Serialize;

use testfleet_core::{HostProbe, ResourceProbe, ResourceSnapshot};

use crate::output::{print_item, OutputFormat, TableDisplay};

#[derive(Serialize)]
pub struct ResourceDisplay {
    pub platform: String,
    pub cpu_count: u32,
    pub cpu_percent: f64,
    pub cpu_freq_mhz: f64,
    pub available_memory_gib: f64,
    pub memory_percent: f64,
}

impl From<ResourceSnapshot> for ResourceDisplay {
    fn from(snap: ResourceSnapshot) -> Self {
        Self {
            available_memory_gib: snap.available_memory_gib(),
            memory_percent: snap.memory_percent(),
            platform: snap.platform,
            cpu_count: snap.cpu_count,
            cpu_percent: snap.cpu_percent,
            cpu_freq_mhz: snap.cpu_freq_mhz,
        }
    }
}

impl TableDisplay for ResourceDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Platform", "CPUs", "CPU %", "CPU MHz", "Free Memory", "Memory %"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.platform.clone(),
            self.cpu_count.to_string(),
            format!("{:.1}", self.cpu_percent),
            format!("{:.0}", self.cpu_freq_mhz),
            format!("{:.1}GB", self.available_memory_gib),
            format!("{:.1}", self.memory_percent),
        ]
    }
}

pub async fn execute(format: OutputFormat) -> Result<()> {
    let snapshot = HostProbe::default().snapshot();
    print_item(&ResourceDisplay::from(snapshot), format);
    Ok(())
}
