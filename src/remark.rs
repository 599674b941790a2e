//! Normalized compiler remark model
//!
//! All front-ends (textual remarks, optimization record streams, kernel info)
//! write into these types. Classifications are closed enums; grammar-specific
//! extras that have no named slot go into `Remark::metadata` or
//! `RemarkArgs::values`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

/// Coarse category of a remark
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemarkKind {
    /// Optimization decision (inlining, vectorization)
    Optimization,
    /// Accelerator kernel descriptor line
    Kernel,
    /// Analysis output of a pass
    Analysis,
    /// Numeric metric (size info, accumulated kernel counters)
    Metric,
    /// Anything purely informational
    Info,
}

impl RemarkKind {
    /// Lowercase name used in serialized output
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Optimization => "optimization",
            Self::Kernel => "kernel",
            Self::Analysis => "analysis",
            Self::Metric => "metric",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for RemarkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compiler pass that produced a remark
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PassType {
    /// Loop and SLP vectorizers
    Vectorization,
    /// Inliner
    Inlining,
    /// Offload kernel-info pass
    KernelInfo,
    /// Size-info pass
    SizeInfo,
    /// Any analysis pass (also the fallback for unrecognized pass names)
    Analysis,
}

impl PassType {
    /// Lowercase name used in serialized output
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vectorization => "vectorization",
            Self::Inlining => "inlining",
            Self::KernelInfo => "kernel-info",
            Self::SizeInfo => "size-info",
            Self::Analysis => "analysis",
        }
    }

    /// Map a raw compiler pass name (`inline`, `loop-vectorize`, `slp-vectorizer`, ...)
    /// onto the closed pass classification.
    #[must_use]
    pub fn from_pass_name(name: &str) -> Self {
        let name = name.to_ascii_lowercase();
        if name.contains("inline") {
            Self::Inlining
        } else if name.contains("vectoriz") || name.contains("slp") {
            Self::Vectorization
        } else if name.contains("kernel-info") {
            Self::KernelInfo
        } else if name.contains("size-info") {
            Self::SizeInfo
        } else {
            Self::Analysis
        }
    }
}

impl fmt::Display for PassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the pass decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemarkStatus {
    /// Transformation applied
    Passed,
    /// Transformation rejected
    Missed,
    /// Pure analysis, no decision
    Analysis,
}

impl RemarkStatus {
    /// Lowercase name used in serialized output
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Missed => "missed",
            Self::Analysis => "analysis",
        }
    }

    /// Decode an optimization record tag (`Passed`, `!Missed`, `AnalysisFPCommute`, ...).
    ///
    /// Matching is case-insensitive. Returns `None` for tags outside the
    /// passed/missed/analysis families (e.g. `Failure`).
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.trim().trim_start_matches('!').to_ascii_lowercase();
        match tag.as_str() {
            "passed" => Some(Self::Passed),
            "missed" => Some(Self::Missed),
            t if t.starts_with("analysis") => Some(Self::Analysis),
            _ => None,
        }
    }
}

impl fmt::Display for RemarkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source location; every field is independently optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Source file
    pub file: Option<String>,
    /// 1-based line
    pub line: Option<u32>,
    /// 1-based column
    pub column: Option<u32>,
    /// Enclosing function
    pub function: Option<String>,
    /// Code region name
    pub region: Option<String>,
}

impl Location {
    /// Location with file, line and column set
    #[must_use]
    pub fn at(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: Some(file.into()),
            line: Some(line),
            column: Some(column),
            ..Default::default()
        }
    }

    /// Location carrying only a function name
    #[must_use]
    pub fn in_function(function: impl Into<String>) -> Self {
        Self {
            function: Some(function.into()),
            ..Default::default()
        }
    }

    /// Parse `file:line:col` (the callsite form used in inlining remarks)
    #[must_use]
    pub fn parse_triple(text: &str) -> Option<Self> {
        let mut parts = text.trim().rsplitn(3, ':');
        let column = parts.next()?.parse().ok()?;
        let line = parts.next()?.parse().ok()?;
        let file = parts.next().filter(|f| !f.is_empty())?;
        Some(Self::at(file, line, column))
    }

    /// True when no field is reported
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Memory access referenced by an argument (`OtherAccess`, `ClobberedBy`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemarkAccess {
    /// Access kind as reported (`load`, `store`, ...)
    #[serde(rename = "type")]
    pub access_type: Option<String>,
    /// Location of the other access
    pub debug_loc: Option<Location>,
}

/// Variant argument payload of a remark
///
/// Which fields are populated depends on the grammar that produced the
/// remark. Merge rule when several argument entries contribute: scalar
/// fields are later-wins, `strings` is append-only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemarkArgs {
    /// Plain string fragments, in input order
    pub strings: Vec<String>,
    /// Inlined/called function
    pub callee: Option<String>,
    /// Function the callee was inlined into
    pub caller: Option<String>,
    /// Typed value (`Type:` argument)
    #[serde(rename = "type")]
    pub value_type: Option<String>,
    /// Line argument, kept verbatim
    pub line: Option<String>,
    /// Column argument, kept verbatim
    pub column: Option<String>,
    /// Cost estimate
    pub cost: Option<String>,
    /// Reason given for the decision
    pub reason: Option<String>,
    /// Location attached to an argument (callsite, callee definition)
    pub debug_loc: Option<Location>,
    /// Access that prevented an optimization
    pub other_access: Option<RemarkAccess>,
    /// Access that clobbered a value
    pub clobbered_by: Option<RemarkAccess>,
    /// Named arguments without a dedicated slot (`NumInstructions`, `Threshold`, ...)
    pub values: BTreeMap<String, String>,
}

impl RemarkArgs {
    /// True when no argument was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Plain string arguments that parse as integers
    pub fn numeric_strings(&self) -> impl Iterator<Item = i64> + '_ {
        self.strings.iter().filter_map(|s| s.trim().parse::<i64>().ok())
    }
}

/// Kind of memory operation in a kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    /// Load instruction
    Load,
    /// Store instruction
    Store,
    /// `atomicrmw` / `cmpxchg`
    Atomic,
    /// Call that touches memory
    Call,
}

impl AccessType {
    /// Classify the quoted instruction of a kernel-info memory sentence.
    ///
    /// `via_call` is true when the sentence used the `call` form.
    #[must_use]
    pub fn classify(instruction: &str, via_call: bool) -> Option<Self> {
        if via_call {
            return Some(Self::Call);
        }
        match instruction.to_ascii_lowercase().as_str() {
            "load" => Some(Self::Load),
            "store" => Some(Self::Store),
            "atomicrmw" | "cmpxchg" | "atomic" => Some(Self::Atomic),
            "call" | "invoke" => Some(Self::Call),
            _ => None,
        }
    }
}

/// Address space of a kernel memory access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressSpace {
    /// Generic (flat) address space
    Flat,
    /// Workgroup-shared memory
    Shared,
    /// Device global memory
    Global,
}

impl AddressSpace {
    /// Parse an address space name as printed by the kernel-info pass
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "flat" | "generic" => Some(Self::Flat),
            "shared" | "local" => Some(Self::Shared),
            "global" => Some(Self::Global),
            _ => None,
        }
    }

    /// Lowercase name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Shared => "shared",
            Self::Global => "global",
        }
    }
}

impl fmt::Display for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observed memory operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryAccess {
    /// Operation kind
    #[serde(rename = "type")]
    pub access_type: AccessType,
    /// Address space accessed
    pub address_space: AddressSpace,
    /// Quoted instruction name
    pub instruction: Option<String>,
    /// Accessed value / variable
    pub variable: Option<String>,
    /// Access pattern description
    pub access_pattern: Option<String>,
    /// Source location
    pub location: Option<Location>,
}

/// Basic block summary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicBlock {
    /// Block label
    pub name: String,
    /// Instruction count
    pub instructions: u32,
    /// Source location
    pub location: Option<Location>,
}

/// Accumulated per-kernel descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelInfo {
    /// Thread limit of the target region
    pub thread_limit: u32,
    /// Max threads per block, x dimension
    pub max_threads_x: u32,
    /// Max threads per block, y dimension
    pub max_threads_y: u32,
    /// Max threads per block, z dimension
    pub max_threads_z: u32,
    /// Static shared memory in bytes
    pub shared_memory: u64,
    /// Offload target triple
    pub target: Option<String>,
    /// Direct call sites
    pub direct_calls: u32,
    /// Indirect call sites
    pub indirect_calls: u32,
    /// Direct callees in input order (duplicates kept)
    pub callees: Vec<String>,
    /// Number of allocas
    pub allocas_count: u32,
    /// Total static alloca size in bytes
    pub allocas_static_size: u64,
    /// Number of dynamically sized allocas
    pub allocas_dynamic_count: u32,
    /// Accesses through the flat address space
    pub flat_address_space_accesses: u32,
    /// Inline assembly call sites
    pub inline_assembly_calls: u32,
    /// Stack usage in bytes
    pub num_stack_bytes: u64,
    /// Instruction count
    pub num_instructions: u32,
    /// Observed memory operations
    pub memory_accesses: Vec<MemoryAccess>,
    /// Basic block summaries
    pub basic_blocks: Vec<BasicBlock>,
    /// Every `name = integer` assignment seen
    pub metrics: BTreeMap<String, u64>,
    /// Every `name = 'text'` assignment seen
    pub attributes: BTreeMap<String, String>,
}

fn saturate(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

impl KernelInfo {
    /// True when no kernel-info line contributed anything
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Record a `name = value` metric and route well-known names to their fields.
    pub fn apply_metric(&mut self, name: &str, value: u64) {
        self.metrics.insert(name.to_string(), value);

        match name {
            "DirectCalls" => self.direct_calls = saturate(value),
            "IndirectCalls" => self.indirect_calls = saturate(value),
            "FlatAddressSpaceAccesses" => self.flat_address_space_accesses = saturate(value),
            "AllocasCount" => self.allocas_count = saturate(value),
            "AllocasStaticSize" => self.allocas_static_size = value,
            "AllocasDynamicCount" => self.allocas_dynamic_count = saturate(value),
            "InlineAssemblyCalls" => self.inline_assembly_calls = saturate(value),
            "NumStackBytes" => self.num_stack_bytes = value,
            "NumInstructions" => self.num_instructions = saturate(value),
            "SharedMemory" => self.shared_memory = value,
            "ThreadLimit" | "omp_target_thread_limit" => self.thread_limit = saturate(value),
            "maxntidx" | "MaxThreadsX" => self.max_threads_x = saturate(value),
            "maxntidy" | "MaxThreadsY" => self.max_threads_y = saturate(value),
            "maxntidz" | "MaxThreadsZ" => self.max_threads_z = saturate(value),
            _ => {}
        }
    }

    /// Record a `name = 'text'` attribute
    pub fn apply_attribute(&mut self, name: &str, value: &str) {
        if name.eq_ignore_ascii_case("target") {
            self.target = Some(value.to_string());
        }
        self.attributes.insert(name.to_string(), value.to_string());
    }

    /// Fold a later per-line descriptor into this one.
    ///
    /// Explicit metric assignments overwrite (replayed in name order); call and
    /// memory-access sentences add to the counters; lists are concatenated in
    /// input order.
    pub fn merge(&mut self, other: &KernelInfo) {
        for (name, value) in &other.metrics {
            self.apply_metric(name, *value);
        }
        for (name, value) in &other.attributes {
            self.apply_attribute(name, value);
        }

        if !other.metrics.contains_key("DirectCalls") {
            self.direct_calls = self.direct_calls.saturating_add(other.direct_calls);
        }
        if !other.metrics.contains_key("IndirectCalls") {
            self.indirect_calls = self.indirect_calls.saturating_add(other.indirect_calls);
        }
        if !other.metrics.contains_key("FlatAddressSpaceAccesses") {
            self.flat_address_space_accesses = self
                .flat_address_space_accesses
                .saturating_add(other.flat_address_space_accesses);
        }

        self.callees.extend(other.callees.iter().cloned());
        self.memory_accesses.extend(other.memory_accesses.iter().cloned());
        self.basic_blocks.extend(other.basic_blocks.iter().cloned());
    }
}

/// One diagnostic emitted by the compiler during one build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Remark {
    /// Identifier assigned by the build, empty until attached
    pub id: String,
    /// Coarse category
    pub kind: RemarkKind,
    /// Producing pass
    pub pass: PassType,
    /// Decision outcome
    pub status: RemarkStatus,
    /// Human-readable text
    pub message: String,
    /// Enclosing function, empty if unknown
    pub function: String,
    /// Source location, if the grammar reports one
    pub location: Option<Location>,
    /// Variant argument payload
    pub args: RemarkArgs,
    /// Kernel descriptor (kernel-info remarks only)
    pub kernel_info: Option<KernelInfo>,
    /// Grammar-specific extras
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Profile weight
    pub hotness: Option<i64>,
    /// Wall-clock ingestion time
    pub timestamp: SystemTime,
}

impl Remark {
    /// Create a remark with the given classification; everything else empty.
    #[must_use]
    pub fn new(
        kind: RemarkKind,
        pass: PassType,
        status: RemarkStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            kind,
            pass,
            status,
            message: message.into(),
            function: String::new(),
            location: None,
            args: RemarkArgs::default(),
            kernel_info: None,
            metadata: BTreeMap::new(),
            hotness: None,
            timestamp: SystemTime::now(),
        }
    }

    /// Insert a metadata entry
    pub fn set_metadata(&mut self, key: &str, value: impl Into<serde_json::Value>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    /// Metadata entry rendered as text
    #[must_use]
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(serde_json::Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_tag() {
        assert_eq!(RemarkStatus::from_tag("Passed"), Some(RemarkStatus::Passed));
        assert_eq!(RemarkStatus::from_tag("!missed"), Some(RemarkStatus::Missed));
        assert_eq!(
            RemarkStatus::from_tag("AnalysisFPCommute"),
            Some(RemarkStatus::Analysis)
        );
        assert_eq!(RemarkStatus::from_tag("Failure"), None);
        assert_eq!(RemarkStatus::from_tag(""), None);
    }

    #[test]
    fn test_pass_from_name() {
        assert_eq!(PassType::from_pass_name("inline"), PassType::Inlining);
        assert_eq!(PassType::from_pass_name("loop-vectorize"), PassType::Vectorization);
        assert_eq!(PassType::from_pass_name("slp-vectorizer"), PassType::Vectorization);
        assert_eq!(PassType::from_pass_name("kernel-info"), PassType::KernelInfo);
        assert_eq!(PassType::from_pass_name("licm"), PassType::Analysis);
    }

    #[test]
    fn test_location_parse_triple() {
        let loc = Location::parse_triple("foo.c:12:1").unwrap();
        assert_eq!(loc.file.as_deref(), Some("foo.c"));
        assert_eq!(loc.line, Some(12));
        assert_eq!(loc.column, Some(1));

        assert!(Location::parse_triple("foo.c").is_none());
        assert!(Location::parse_triple(":1:2").is_none());
        assert!(Location::parse_triple("foo.c:x:2").is_none());
    }

    #[test]
    fn test_apply_metric_routes_known_names() {
        let mut info = KernelInfo::default();
        info.apply_metric("DirectCalls", 3);
        info.apply_metric("AllocasStaticSize", 4096);
        info.apply_metric("omp_target_thread_limit", 256);
        info.apply_metric("CustomCounter", 7);

        assert_eq!(info.direct_calls, 3);
        assert_eq!(info.allocas_static_size, 4096);
        assert_eq!(info.thread_limit, 256);
        assert_eq!(info.metrics.get("CustomCounter"), Some(&7));
        assert_eq!(info.metrics.len(), 4);
    }

    #[test]
    fn test_apply_metric_saturates() {
        let mut info = KernelInfo::default();
        info.apply_metric("DirectCalls", u64::MAX);
        assert_eq!(info.direct_calls, u32::MAX);
    }

    #[test]
    fn test_kernel_info_merge() {
        let mut total = KernelInfo::default();

        let mut call = KernelInfo::default();
        call.direct_calls = 1;
        call.callees.push("foo".to_string());
        total.merge(&call);
        total.merge(&call);
        assert_eq!(total.direct_calls, 2);
        assert_eq!(total.callees, vec!["foo", "foo"]);

        let mut explicit = KernelInfo::default();
        explicit.apply_metric("DirectCalls", 5);
        total.merge(&explicit);
        assert_eq!(total.direct_calls, 5);
        assert_eq!(total.callees.len(), 2);
    }

    #[test]
    fn test_kernel_info_empty() {
        assert!(KernelInfo::default().is_empty());
        let mut info = KernelInfo::default();
        info.apply_attribute("target", "nvptx64-nvidia-cuda");
        assert!(!info.is_empty());
        assert_eq!(info.target.as_deref(), Some("nvptx64-nvidia-cuda"));
    }

    #[test]
    fn test_access_classification() {
        assert_eq!(AccessType::classify("load", false), Some(AccessType::Load));
        assert_eq!(AccessType::classify("atomicrmw", false), Some(AccessType::Atomic));
        assert_eq!(AccessType::classify("llvm.memcpy", true), Some(AccessType::Call));
        assert_eq!(AccessType::classify("getelementptr", false), None);
        assert_eq!(AddressSpace::parse("Flat"), Some(AddressSpace::Flat));
        assert_eq!(AddressSpace::parse("private"), None);
    }

    #[test]
    fn test_numeric_strings() {
        let args = RemarkArgs {
            strings: vec!["alloca of ".into(), "64".into(), " bytes".into(), "-8".into()],
            ..Default::default()
        };
        assert_eq!(args.numeric_strings().collect::<Vec<_>>(), vec![64, -8]);
    }

    #[test]
    fn test_remark_serialization() {
        let mut remark = Remark::new(
            RemarkKind::Kernel,
            PassType::KernelInfo,
            RemarkStatus::Analysis,
            "DirectCalls = 2",
        );
        remark.set_metadata("value", 2);

        let json = serde_json::to_string(&remark).unwrap();
        assert!(json.contains("\"kernel-info\""));
        assert!(json.contains("\"kernel\""));

        let parsed: Remark = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, remark);
    }
}
