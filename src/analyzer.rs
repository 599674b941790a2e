//! Build performance analyzer
//!
//! Derives efficiency ratios, a memory profile, phase overhead estimates,
//! optimization counts, bottlenecks and recommendations from a completed
//! [`BuildRecord`]. Pure and infallible: zero hardware totals degrade to zero
//! ratios instead of failing.

use crate::build::BuildRecord;
use crate::remark::RemarkStatus;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Memory utilization (peak / total) above which memory is a bottleneck
pub const MEMORY_UTILIZATION_THRESHOLD: f64 = 0.9;
/// Compile time in seconds above which compilation is a bottleneck
pub const COMPILE_TIME_THRESHOLD_SECS: f64 = 60.0;
/// Missed optimization count above which optimization is a bottleneck
pub const MISSED_OPTIMIZATION_THRESHOLD: usize = 10;

// Fixed estimated shares of total compile time
const PARSING_SHARE: f64 = 0.2;
const CODEGEN_SHARE: f64 = 0.4;

/// Bottleneck categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BottleneckType {
    /// Peak memory close to installed memory
    Memory,
    /// Long compile time
    Compilation,
    /// Many missed optimizations
    Optimization,
}

impl fmt::Display for BottleneckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Compilation => write!(f, "compilation"),
            Self::Optimization => write!(f, "optimization"),
        }
    }
}

/// Bottleneck severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Minor
    Low,
    /// Noticeable
    Medium,
    /// Severe
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// A detected performance bottleneck
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bottleneck {
    /// Category
    #[serde(rename = "type")]
    pub kind: BottleneckType,
    /// Severity
    pub severity: Severity,
    /// Human-readable description
    pub description: String,
    /// Measured value that triggered the bottleneck
    pub impact: f64,
}

/// A suggested action for a bottleneck category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Category title
    pub category: String,
    /// Suggested action
    pub action: String,
    /// Expected impact
    pub impact: String,
    /// Explanation
    pub details: String,
}

impl Recommendation {
    /// Fixed recommendation for a bottleneck category
    #[must_use]
    pub fn for_bottleneck(kind: BottleneckType) -> Self {
        let (category, action, impact, details) = match kind {
            BottleneckType::Memory => (
                "Memory Usage",
                "Consider reducing static allocations",
                "High",
                "Large static allocations detected. Consider using dynamic allocation or reducing buffer sizes.",
            ),
            BottleneckType::Compilation => (
                "Build Performance",
                "Enable parallel compilation",
                "Medium",
                "Long compilation time detected. Consider using -j flag or distributed compilation.",
            ),
            BottleneckType::Optimization => (
                "Optimization",
                "Review missed optimization opportunities",
                "Medium",
                "Multiple optimization opportunities were missed. Consider reviewing the code structure.",
            ),
        };

        Self {
            category: category.to_string(),
            action: action.to_string(),
            impact: impact.to_string(),
            details: details.to_string(),
        }
    }
}

/// Memory usage profile in bytes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryUsageProfile {
    /// Recorded peak memory
    pub peak: u64,
    /// Approximation: half of peak
    pub average: u64,
    /// Same as peak
    pub allocated: u64,
    /// Sum of numeric string arguments of alloca remarks
    pub wasted: i64,
}

/// Estimated time per compilation phase in seconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompilationOverhead {
    /// 20% of compile time
    pub parsing: f64,
    /// Recorded optimize time
    pub optimization: f64,
    /// 40% of compile time
    pub codegen: f64,
    /// Recorded link time
    pub linking: f64,
}

/// Remark counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizationMetrics {
    /// Passed remarks
    pub successful_optimizations: usize,
    /// Missed remarks
    pub missed_optimizations: usize,
    /// Analysis remarks
    pub analysis_remarks: usize,
}

/// Complete analysis of one build
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Mean of CPU and memory utilization ratios
    pub resource_efficiency: f64,
    /// Memory profile
    pub memory_usage_profile: MemoryUsageProfile,
    /// Phase estimates
    pub compilation_overhead: CompilationOverhead,
    /// Remark counts
    pub optimization_metrics: OptimizationMetrics,
    /// Detected bottlenecks
    pub bottlenecks: Vec<Bottleneck>,
    /// One recommendation per bottleneck type present
    pub recommendations: Vec<Recommendation>,
}

impl AnalysisResult {
    /// Check for a bottleneck category
    #[must_use]
    pub fn has_bottleneck(&self, kind: BottleneckType) -> bool {
        self.bottlenecks.iter().any(|b| b.kind == kind)
    }
}

/// `numerator / denominator`, zero when the denominator is zero
fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        (numerator / denominator).max(0.0)
    } else {
        0.0
    }
}

/// Performance analyzer for build records
#[derive(Debug, Default, Clone, Copy)]
pub struct PerformanceAnalyzer;

impl PerformanceAnalyzer {
    /// Create a new analyzer
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Analyze a completed build
    #[must_use]
    pub fn analyze(&self, build: &BuildRecord) -> AnalysisResult {
        let optimization_metrics = self.optimization_metrics(build);
        let bottlenecks = self.identify_bottlenecks(build, &optimization_metrics);
        let recommendations = self.recommendations(&bottlenecks);

        AnalysisResult {
            resource_efficiency: self.resource_efficiency(build),
            memory_usage_profile: self.memory_usage(build),
            compilation_overhead: self.compilation_overhead(build),
            optimization_metrics,
            bottlenecks,
            recommendations,
        }
    }

    fn memory_utilization(&self, build: &BuildRecord) -> f64 {
        ratio(
            build.resource_usage.max_memory as f64,
            build.hardware.memory.total as f64,
        )
    }

    /// Mean of thread utilization and memory utilization
    #[must_use]
    pub fn resource_efficiency(&self, build: &BuildRecord) -> f64 {
        let cpu = ratio(
            f64::from(build.resource_usage.threads),
            f64::from(build.hardware.cpu.cores),
        );
        let memory = self.memory_utilization(build);
        (cpu + memory) / 2.0
    }

    fn memory_usage(&self, build: &BuildRecord) -> MemoryUsageProfile {
        let peak = build.resource_usage.max_memory;
        let wasted = build
            .remarks
            .iter()
            .filter(|r| r.message.contains("alloca"))
            .flat_map(|r| r.args.numeric_strings())
            .fold(0i64, i64::saturating_add);

        MemoryUsageProfile {
            peak,
            average: peak / 2,
            allocated: peak,
            wasted,
        }
    }

    fn compilation_overhead(&self, build: &BuildRecord) -> CompilationOverhead {
        let perf = &build.performance;
        CompilationOverhead {
            parsing: perf.compile_time * PARSING_SHARE,
            optimization: perf.optimize_time,
            codegen: perf.compile_time * CODEGEN_SHARE,
            linking: perf.link_time,
        }
    }

    fn optimization_metrics(&self, build: &BuildRecord) -> OptimizationMetrics {
        let mut metrics = OptimizationMetrics::default();
        for remark in &build.remarks {
            match remark.status {
                RemarkStatus::Passed => metrics.successful_optimizations += 1,
                RemarkStatus::Missed => metrics.missed_optimizations += 1,
                RemarkStatus::Analysis => metrics.analysis_remarks += 1,
            }
        }
        metrics
    }

    fn identify_bottlenecks(
        &self,
        build: &BuildRecord,
        metrics: &OptimizationMetrics,
    ) -> Vec<Bottleneck> {
        let mut bottlenecks = Vec::new();

        let utilization = self.memory_utilization(build);
        if utilization > MEMORY_UTILIZATION_THRESHOLD {
            bottlenecks.push(Bottleneck {
                kind: BottleneckType::Memory,
                severity: Severity::High,
                description: "High memory utilization".to_string(),
                impact: utilization,
            });
        }

        let compile_time = build.performance.compile_time;
        if compile_time > COMPILE_TIME_THRESHOLD_SECS {
            bottlenecks.push(Bottleneck {
                kind: BottleneckType::Compilation,
                severity: Severity::Medium,
                description: "Long compilation time".to_string(),
                impact: compile_time,
            });
        }

        if metrics.missed_optimizations > MISSED_OPTIMIZATION_THRESHOLD {
            bottlenecks.push(Bottleneck {
                kind: BottleneckType::Optimization,
                severity: Severity::Low,
                description: "High number of missed optimizations".to_string(),
                impact: metrics.missed_optimizations as f64,
            });
        }

        bottlenecks
    }

    fn recommendations(&self, bottlenecks: &[Bottleneck]) -> Vec<Recommendation> {
        let mut seen = Vec::new();
        for bottleneck in bottlenecks {
            if !seen.contains(&bottleneck.kind) {
                seen.push(bottleneck.kind);
            }
        }
        seen.into_iter().map(Recommendation::for_bottleneck).collect()
    }
}

/// Analyze a completed build with the default analyzer
#[must_use]
pub fn analyze(build: &BuildRecord) -> AnalysisResult {
    PerformanceAnalyzer::new().analyze(build)
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::build::{Cpu, Hardware, MemoryInfo, ResourceUsage};
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_efficiency_finite_and_non_negative(
            cores in 0u32..256,
            total in 0u64..(1u64 << 40),
            threads in 0u32..512,
            peak in 0u64..(1u64 << 40),
        ) {
            let build = BuildRecord {
                hardware: Hardware {
                    cpu: Cpu { cores, ..Default::default() },
                    memory: MemoryInfo { total, ..Default::default() },
                    ..Default::default()
                },
                resource_usage: ResourceUsage { threads, max_memory: peak, ..Default::default() },
                ..Default::default()
            };
            let result = analyze(&build);
            prop_assert!(result.resource_efficiency.is_finite());
            prop_assert!(result.resource_efficiency >= 0.0);
            prop_assert!(result.recommendations.len() <= result.bottlenecks.len());
        }
    }
}
