//! Kernel-info remark scanner
//!
//! Line-oriented, stateful: the most recently located artificial kernel
//! function applies to following lines, and every `name = integer` metric is
//! also recorded in a [`MetricAccumulator`] that is flushed as synthetic
//! metric remarks when the stream ends.

use crate::error::Result;
use crate::parser::RemarkParser;
use crate::remark::{
    AccessType, AddressSpace, KernelInfo, Location, MemoryAccess, PassType, Remark, RemarkKind,
    RemarkStatus,
};
use regex::Regex;
use std::collections::BTreeMap;
use std::io::BufRead;
use std::sync::OnceLock;
use tracing::{debug, trace};

const REMARK_PREFIX: &str = "remark: ";
const KERNEL_INFO_TAG: &str = "kernel-info";

fn location_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([^:]+):(\d+):(\d+): in artificial function '([^']+)'").unwrap())
}

fn metric_assignment() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*) = (\d+)\b").unwrap())
}

fn attribute_assignment() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([A-Za-z_][\w.-]*) = '([^']*)'").unwrap())
}

fn indirect_call() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bindirect call(?:, callee is '([^']+)')?").unwrap())
}

fn direct_call() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bdirect call, callee is '([^']+)'").unwrap())
}

fn pass_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*\[([^\]]+)\]$").unwrap())
}

/// Split a trailing ` [<pass-tag>]` off a remark body
fn split_pass_tag(body: &str) -> (&str, Option<&str>) {
    match pass_tag().captures(body) {
        Some(caps) => {
            let tag = caps.get(1).map(|m| m.as_str());
            (&body[..caps.get(0).map_or(body.len(), |m| m.start())], tag)
        }
        None => (body, None),
    }
}

fn memory_access() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"'([^']+)' (instruction|call) \('?([^']*?)'?\) accesses memory in ([A-Za-z]+) address space",
        )
        .unwrap()
    })
}

/// Stream-wide `name -> value` metric totals for one parse
///
/// Later assignments overwrite earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricAccumulator {
    metrics: BTreeMap<String, u64>,
}

impl MetricAccumulator {
    /// Create an empty accumulator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a metric value, replacing any earlier one
    pub fn record(&mut self, name: &str, value: u64) {
        self.metrics.insert(name.to_string(), value);
    }

    /// Current value of a metric
    #[must_use]
    pub fn get(&self, name: &str) -> Option<u64> {
        self.metrics.get(name).copied()
    }

    /// Number of distinct metrics
    #[must_use]
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    /// True when nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// One synthetic metric remark per entry, in name order
    #[must_use]
    pub fn into_remarks(self) -> Vec<Remark> {
        self.metrics
            .into_iter()
            .map(|(name, value)| {
                let mut remark = Remark::new(
                    RemarkKind::Metric,
                    PassType::KernelInfo,
                    RemarkStatus::Analysis,
                    name,
                );
                remark.set_metadata("value", value);
                remark
            })
            .collect()
    }
}

/// Per-parse scanner state
///
/// Feed lines with the `remark: ` prefix already stripped, then call
/// [`KernelInfoScanner::finish`].
#[derive(Debug, Default)]
pub struct KernelInfoScanner {
    current_function: Option<String>,
    accumulator: MetricAccumulator,
    remarks: Vec<Remark>,
}

impl KernelInfoScanner {
    /// Create a scanner with an empty accumulator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scanner that continues from an existing accumulator
    #[must_use]
    pub fn with_accumulator(accumulator: MetricAccumulator) -> Self {
        Self {
            accumulator,
            ..Self::default()
        }
    }

    /// Most recently located artificial kernel function
    #[must_use]
    pub fn current_function(&self) -> Option<&str> {
        self.current_function.as_deref()
    }

    /// Metric totals so far
    #[must_use]
    pub fn accumulator(&self) -> &MetricAccumulator {
        &self.accumulator
    }

    /// Scan one line. Every line produces a kernel remark; a trailing
    /// `[<pass-tag>]` is not part of the message.
    pub fn feed(&mut self, line: &str) {
        let (line, _) = split_pass_tag(line);
        let mut remark = Remark::new(
            RemarkKind::Kernel,
            PassType::KernelInfo,
            RemarkStatus::Analysis,
            String::new(),
        );

        let mut rest = line;
        if let Some(caps) = location_prefix().captures(line) {
            let function = caps[4].to_string();
            remark.location = Some(Location {
                file: Some(caps[1].to_string()),
                line: caps[2].parse().ok(),
                column: caps[3].parse().ok(),
                function: Some(function.clone()),
                region: None,
            });
            self.current_function = Some(function);
            rest = &line[caps[0].len()..];
        } else if let Some(function) = &self.current_function {
            remark.location = Some(Location::in_function(function.clone()));
        }

        if let Some(function) = &self.current_function {
            remark.function.clone_from(function);
        }

        let rest = rest.trim_start_matches(|c: char| c == ',' || c == ':').trim();
        remark.message = rest.to_string();

        let mut info = KernelInfo::default();
        self.scan_body(rest, &mut info);
        if !info.is_empty() {
            remark.kernel_info = Some(info);
        }

        self.remarks.push(remark);
    }

    fn scan_body(&mut self, text: &str, info: &mut KernelInfo) {
        if let Some(caps) = metric_assignment().captures(text) {
            if let Ok(value) = caps[2].parse::<u64>() {
                info.apply_metric(&caps[1], value);
                self.accumulator.record(&caps[1], value);
                return;
            }
        }

        if let Some(caps) = attribute_assignment().captures(text) {
            info.apply_attribute(&caps[1], &caps[2]);
            return;
        }

        if let Some(caps) = indirect_call().captures(text) {
            info.indirect_calls += 1;
            if let Some(callee) = caps.get(1) {
                info.attributes
                    .insert("indirect_callee".to_string(), callee.as_str().to_string());
            }
            return;
        }

        if let Some(caps) = direct_call().captures(text) {
            info.direct_calls += 1;
            info.callees.push(caps[1].to_string());
            return;
        }

        if let Some(caps) = memory_access().captures(text) {
            info.flat_address_space_accesses += 1;

            let via_call = &caps[2] == "call";
            let (Some(access_type), Some(address_space)) = (
                AccessType::classify(&caps[1], via_call),
                AddressSpace::parse(&caps[4]),
            ) else {
                trace!(line = %text, "unclassified memory access sentence");
                info.attributes
                    .insert("access_instruction".to_string(), caps[1].to_string());
                info.attributes
                    .insert("access_address_space".to_string(), caps[4].to_string());
                return;
            };

            let variable = caps[3].trim();
            info.memory_accesses.push(MemoryAccess {
                access_type,
                address_space,
                instruction: Some(caps[1].to_string()),
                variable: (!variable.is_empty()).then(|| variable.to_string()),
                access_pattern: None,
                location: None,
            });
        }
    }

    /// Flush the accumulator as trailing synthetic metric remarks
    #[must_use]
    pub fn finish(self) -> Vec<Remark> {
        let mut remarks = self.remarks;
        let synthetic = self.accumulator.len();
        remarks.extend(self.accumulator.into_remarks());
        debug!(
            kernel_lines = remarks.len() - synthetic,
            synthetic, "finished kernel-info scan"
        );
        remarks
    }
}

/// Parser for `-Rpass=kernel-info` stderr output
#[derive(Debug, Default, Clone, Copy)]
pub struct KernelInfoParser;

impl KernelInfoParser {
    /// Create a new kernel-info parser
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl RemarkParser for KernelInfoParser {
    fn grammar_name(&self) -> &str {
        "kernel-info"
    }

    fn parse<R: BufRead>(&self, reader: R) -> Result<Vec<Remark>> {
        let mut scanner = KernelInfoScanner::new();

        for line in reader.lines() {
            let line = line?;
            let Some(body) = line.strip_prefix(REMARK_PREFIX) else {
                continue;
            };
            // Remarks of other passes share the stream
            if let (_, Some(tag)) = split_pass_tag(body) {
                if !tag.contains(KERNEL_INFO_TAG) {
                    trace!(tag, "skipping remark of another pass");
                    continue;
                }
            }
            scanner.feed(body);
        }

        Ok(scanner.finish())
    }
}
