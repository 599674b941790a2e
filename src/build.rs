//! Build record consumed by the performance analyzer
//!
//! Produced by the collection layer (hardware detection, resource sampler,
//! compiler timing). Every numeric field defaults to zero so partially
//! populated records deserialize and analyze cleanly.

use crate::remark::Remark;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// CPU description
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cpu {
    /// Model name
    pub model: String,
    /// Nominal frequency in MHz
    pub frequency: f64,
    /// Physical cores
    pub cores: u32,
    /// Hardware threads
    pub threads: u32,
    /// Vendor string
    pub vendor: String,
    /// Cache size in bytes
    pub cache_size: u64,
}

/// System memory in bytes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryInfo {
    /// Installed memory
    pub total: u64,
    /// Available at detection time
    pub available: u64,
    /// In use at detection time
    pub used: u64,
    /// Swap size
    pub swap_total: u64,
    /// Free swap
    pub swap_free: u64,
}

/// Accelerator description
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Gpu {
    /// Model name
    pub model: String,
    /// Device memory in bytes
    pub memory: u64,
    /// Driver version
    pub driver: String,
    /// Compute capability
    pub compute_caps: String,
}

/// Host hardware totals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hardware {
    /// CPU
    pub cpu: Cpu,
    /// Memory
    pub memory: MemoryInfo,
    /// Accelerators
    pub gpus: Vec<Gpu>,
}

/// I/O counters of the compiler process
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoStats {
    /// Bytes read
    pub read_bytes: u64,
    /// Bytes written
    pub write_bytes: u64,
    /// Read syscalls
    pub read_count: u64,
    /// Write syscalls
    pub write_count: u64,
}

/// Resource usage snapshot of the build
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceUsage {
    /// Peak resident memory in bytes
    pub max_memory: u64,
    /// CPU time in seconds
    pub cpu_time: f64,
    /// Threads used
    pub threads: u32,
    /// I/O counters
    pub io: IoStats,
}

/// Timing phases in seconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Performance {
    /// Total compile time
    pub compile_time: f64,
    /// Link time
    pub link_time: f64,
    /// Optimization time
    pub optimize_time: f64,
    /// Additional named phases (e.g. from `-ftime-trace`)
    pub phases: BTreeMap<String, f64>,
}

/// One compiler invocation with everything collected about it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildRecord {
    /// Build identifier
    pub id: String,
    /// Whether the compiler exited successfully
    pub success: bool,
    /// Wall-clock duration in seconds
    pub duration: f64,
    /// Host hardware
    pub hardware: Hardware,
    /// Resource usage
    pub resource_usage: ResourceUsage,
    /// Timing
    pub performance: Performance,
    /// Remarks in collection order
    pub remarks: Vec<Remark>,
}

impl BuildRecord {
    /// Create an empty record for the given build id
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Append remarks, assigning ids `<build-id>-<seq>` that continue after
    /// the remarks already attached.
    pub fn attach_remarks(&mut self, remarks: impl IntoIterator<Item = Remark>) {
        let mut seq = self.remarks.len();
        for mut remark in remarks {
            seq += 1;
            remark.id = format!("{}-{}", self.id, seq);
            self.remarks.push(remark);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remark::{PassType, RemarkKind, RemarkStatus};

    fn info(message: &str) -> Remark {
        Remark::new(RemarkKind::Info, PassType::Analysis, RemarkStatus::Analysis, message)
    }

    #[test]
    fn test_attach_assigns_sequential_ids() {
        let mut build = BuildRecord::new("b42");
        build.attach_remarks(vec![info("a"), info("b")]);
        build.attach_remarks(vec![info("c")]);

        let ids: Vec<_> = build.remarks.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b42-1", "b42-2", "b42-3"]);
    }

    #[test]
    fn test_partial_record_deserializes() {
        let json = r#"{"id": "x", "performance": {"compile_time": 12.5}}"#;
        let build: BuildRecord = serde_json::from_str(json).unwrap();
        assert_eq!(build.id, "x");
        assert!((build.performance.compile_time - 12.5).abs() < f64::EPSILON);
        assert_eq!(build.hardware.memory.total, 0);
        assert!(build.remarks.is_empty());
    }
}
