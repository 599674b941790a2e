//! Read-only queries over collected remarks

use crate::remark::{PassType, Remark, RemarkKind, RemarkStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Remark counts per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    /// Applied optimizations
    pub passed: usize,
    /// Missed optimizations
    pub missed: usize,
    /// Analysis output
    pub analysis: usize,
}

impl StatusSummary {
    /// Total number of remarks counted
    #[must_use]
    pub fn total(&self) -> usize {
        self.passed + self.missed + self.analysis
    }
}

/// Filtering and grouping helpers for remark lists
pub trait RemarkQuery {
    /// Remarks produced by the given pass
    fn by_pass(&self, pass: PassType) -> Vec<&Remark>;

    /// Remarks of the given kind
    fn by_kind(&self, kind: RemarkKind) -> Vec<&Remark>;

    /// Count remarks per status
    fn status_summary(&self) -> StatusSummary;

    /// Group remarks by enclosing function. Remarks without a function name
    /// are left out.
    fn by_function(&self) -> BTreeMap<&str, Vec<&Remark>>;

    /// Remarks whose `args.reason` equals `reason`
    fn with_reason(&self, reason: &str) -> Vec<&Remark>;

    /// Sorted, deduplicated names of kernels seen in kernel remarks
    fn kernel_names(&self) -> Vec<&str>;

    /// Occurrences of each callee across inlining arguments and kernel call lists
    fn callee_counts(&self) -> BTreeMap<&str, usize>;

    /// Number of kernel memory accesses per address space
    fn memory_access_counts(&self) -> BTreeMap<&'static str, usize>;
}

fn function_of(remark: &Remark) -> Option<&str> {
    let name = if remark.function.is_empty() {
        remark.location.as_ref()?.function.as_deref()?
    } else {
        remark.function.as_str()
    };
    (!name.is_empty()).then_some(name)
}

impl RemarkQuery for [Remark] {
    fn by_pass(&self, pass: PassType) -> Vec<&Remark> {
        self.iter().filter(|r| r.pass == pass).collect()
    }

    fn by_kind(&self, kind: RemarkKind) -> Vec<&Remark> {
        self.iter().filter(|r| r.kind == kind).collect()
    }

    fn status_summary(&self) -> StatusSummary {
        let mut summary = StatusSummary::default();
        for remark in self {
            match remark.status {
                RemarkStatus::Passed => summary.passed += 1,
                RemarkStatus::Missed => summary.missed += 1,
                RemarkStatus::Analysis => summary.analysis += 1,
            }
        }
        summary
    }

    fn by_function(&self) -> BTreeMap<&str, Vec<&Remark>> {
        let mut groups: BTreeMap<&str, Vec<&Remark>> = BTreeMap::new();
        for remark in self {
            if let Some(function) = function_of(remark) {
                groups.entry(function).or_default().push(remark);
            }
        }
        groups
    }

    fn with_reason(&self, reason: &str) -> Vec<&Remark> {
        self.iter()
            .filter(|r| r.args.reason.as_deref() == Some(reason))
            .collect()
    }

    fn kernel_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .iter()
            .filter(|r| r.kind == RemarkKind::Kernel)
            .filter_map(function_of)
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    fn callee_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for remark in self {
            if let Some(callee) = remark.args.callee.as_deref() {
                *counts.entry(callee).or_default() += 1;
            }
            if let Some(info) = &remark.kernel_info {
                for callee in &info.callees {
                    *counts.entry(callee.as_str()).or_default() += 1;
                }
            }
        }
        counts
    }

    fn memory_access_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for access in self
            .iter()
            .filter_map(|r| r.kernel_info.as_ref())
            .flat_map(|info| info.memory_accesses.iter())
        {
            *counts.entry(access.address_space.as_str()).or_default() += 1;
        }
        counts
    }
}
