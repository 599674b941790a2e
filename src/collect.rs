//! Collection pipeline
//!
//! Runs the enabled front-ends over the output of one compiler invocation
//! and hands the results to the build record and analyzer.

use crate::analyzer::{AnalysisResult, PerformanceAnalyzer};
use crate::build::BuildRecord;
use crate::config::CollectionConfig;
use crate::error::Result;
use crate::kernel::KernelInfoParser;
use crate::parser::RemarkParser;
use crate::remark::Remark;
use crate::remarks::{RecordStreamParser, TextRemarkParser};
use tracing::debug;

/// Drives the text, kernel-info and record-stream parsers for one build
#[derive(Debug, Default, Clone)]
pub struct RemarkCollector {
    config: CollectionConfig,
    text: TextRemarkParser,
    kernel: KernelInfoParser,
    records: RecordStreamParser,
    analyzer: PerformanceAnalyzer,
}

impl RemarkCollector {
    /// Create a collector with the given switches
    #[must_use]
    pub fn new(config: CollectionConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    /// Parse everything one compiler invocation produced.
    ///
    /// `args` are the compiler arguments, `stderr` the captured diagnostic
    /// output and `records` the optimization record stream, if one was
    /// written. Remarks come back as text remarks, then kernel remarks, then
    /// record remarks, each in input order.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Io` if `stderr` is not readable as lines, or
    /// `ParseError::RecordStream` if the record stream is malformed.
    pub fn collect<S: AsRef<str>>(
        &self,
        args: &[S],
        stderr: &[u8],
        records: Option<&[u8]>,
    ) -> Result<Vec<Remark>> {
        let mut remarks = Vec::new();

        if self.config.collect_text_remarks {
            let parsed = self.text.parse(stderr)?;
            debug!(grammar = self.text.grammar_name(), count = parsed.len(), "collected remarks");
            remarks.extend(parsed);
        }

        if self.config.kernel_info_enabled(args) {
            let parsed = self.kernel.parse(stderr)?;
            debug!(grammar = self.kernel.grammar_name(), count = parsed.len(), "collected remarks");
            remarks.extend(parsed);
        }

        if let Some(stream) = records.filter(|_| self.config.collect_optimization_records) {
            let parsed = self.records.parse(stream)?;
            debug!(grammar = self.records.grammar_name(), count = parsed.len(), "collected remarks");
            remarks.extend(parsed);
        }

        Ok(remarks)
    }

    /// Collect and attach the remarks to `build`, assigning ids
    ///
    /// # Errors
    ///
    /// Same as [`RemarkCollector::collect`]; `build` is left untouched on error.
    pub fn attach<S: AsRef<str>>(
        &self,
        build: &mut BuildRecord,
        args: &[S],
        stderr: &[u8],
        records: Option<&[u8]>,
    ) -> Result<usize> {
        let remarks = self.collect(args, stderr, records)?;
        let count = remarks.len();
        build.attach_remarks(remarks);
        Ok(count)
    }

    /// Analyze a finished build, or `None` when analysis is switched off
    #[must_use]
    pub fn analyze(&self, build: &BuildRecord) -> Option<AnalysisResult> {
        self.config
            .analyze_performance
            .then(|| self.analyzer.analyze(build))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remark::{PassType, RemarkKind};

    const STDERR: &str = "\
clang: warning: argument unused during compilation
remark: a.cpp:3:7: 'f' inlined into 'main' with (cost=-15, threshold=225): always inline at callsite a.cpp:9:3; [-Rpass=inline]
remark: k.c:1:0: in artificial function 'kern', AllocasCount = 3
";

    const RECORDS: &str = "\
--- !Missed
Pass: inline
Name: NoDefinition
Function: main
Args:
  - Callee: ext
  - String: ' will not be inlined into '
  - Caller: main
...
";

    const KERNEL_ARGS: [&str; 2] = ["-O2", "-Rpass=kernel-info"];

    #[test]
    fn test_collect_order() {
        let collector = RemarkCollector::default();
        let remarks = collector
            .collect(&KERNEL_ARGS, STDERR.as_bytes(), Some(RECORDS.as_bytes()))
            .unwrap();

        assert_eq!(remarks[0].pass, PassType::Inlining);
        assert_eq!(remarks.last().unwrap().metadata_str("name"), Some("NoDefinition"));
        assert_eq!(remarks.iter().filter(|r| r.kind == RemarkKind::Kernel).count(), 1);
    }

    #[test]
    fn test_kernel_scan_ignores_other_passes() {
        let stderr = "\
remark: a.cpp:3:7: 'f' inlined into 'main' with (cost=-15, threshold=225): always inline at callsite a.cpp:9:3; [-Rpass=inline]
remark: loop.c:4:3: loop not vectorized: call instruction cannot be vectorized [-Rpass-missed=loop-vectorize]
remark: k.c:1:0: in artificial function 'kern', AllocasCount = 3
";
        let collector = RemarkCollector::default();
        let remarks = collector.collect(&KERNEL_ARGS, stderr.as_bytes(), None).unwrap();

        let kernel: Vec<_> = remarks.iter().filter(|r| r.kind == RemarkKind::Kernel).collect();
        assert_eq!(kernel.len(), 1);
        assert_eq!(kernel[0].function, "kern");
        assert_eq!(kernel[0].location.as_ref().unwrap().function.as_deref(), Some("kern"));

        // 2 text remarks, 1 kernel line, 1 synthetic AllocasCount metric
        assert_eq!(remarks.len(), 4);
    }

    #[test]
    fn test_kernel_info_needs_flag() {
        let collector = RemarkCollector::default();
        let remarks = collector.collect(&["-O2"], STDERR.as_bytes(), None).unwrap();

        assert_eq!(remarks.len(), 1);
        assert!(remarks.iter().all(|r| r.pass != PassType::KernelInfo));
    }

    #[test]
    fn test_disabled_front_ends() {
        let collector = RemarkCollector::new(CollectionConfig {
            collect_text_remarks: false,
            collect_optimization_records: false,
            collect_kernel_info: false,
            analyze_performance: false,
        });
        let remarks = collector
            .collect(&KERNEL_ARGS, STDERR.as_bytes(), Some(RECORDS.as_bytes()))
            .unwrap();
        assert!(remarks.is_empty());
        assert!(collector.analyze(&BuildRecord::default()).is_none());
    }

    #[test]
    fn test_attach_assigns_ids() {
        let collector = RemarkCollector::default();
        let mut build = BuildRecord::new("b1");
        let count = collector
            .attach(&mut build, &["-O2"], STDERR.as_bytes(), Some(RECORDS.as_bytes()))
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(build.remarks[0].id, "b1-1");
        assert_eq!(build.remarks[1].id, "b1-2");
    }

    #[test]
    fn test_malformed_records_leave_build_untouched() {
        let collector = RemarkCollector::default();
        let mut build = BuildRecord::new("b2");
        let result = collector.attach(
            &mut build,
            &["-O2"],
            STDERR.as_bytes(),
            Some(&b"--- !Passed\nPass: [inline\nName: broken\n"[..]),
        );

        assert!(result.is_err());
        assert!(build.remarks.is_empty());
    }

    #[test]
    fn test_analyze_enabled_by_default() {
        let collector = RemarkCollector::default();
        let mut build = BuildRecord::new("b3");
        build.performance.compile_time = 65.0;

        let result = collector.analyze(&build).unwrap();
        assert_eq!(result.bottlenecks.len(), 1);
    }
}
