//! Kernel-info analysis module
//!
//! Scans `-Rpass=kernel-info` output for offload kernels:
//! - thread/grid limits and other `name = value` metrics
//! - direct and indirect call sites
//! - memory accesses and their address spaces
//! - alloca counts and sizes

mod parser;

pub use parser::{KernelInfoParser, KernelInfoScanner, MetricAccumulator};

use crate::remark::{KernelInfo, Remark, RemarkKind};
use std::collections::BTreeMap;

/// Fold the per-line kernel descriptors of a remark list into one
/// [`KernelInfo`] per artificial kernel function.
///
/// Only kernel-kind remarks with both a function name and a descriptor
/// contribute; see [`KernelInfo::merge`] for the union rule.
#[must_use]
pub fn merge_by_function(remarks: &[Remark]) -> BTreeMap<String, KernelInfo> {
    let mut kernels: BTreeMap<String, KernelInfo> = BTreeMap::new();

    for remark in remarks.iter().filter(|r| r.kind == RemarkKind::Kernel) {
        let Some(info) = &remark.kernel_info else {
            continue;
        };
        if remark.function.is_empty() {
            continue;
        }
        kernels.entry(remark.function.clone()).or_default().merge(info);
    }

    kernels
}
