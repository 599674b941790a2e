//! buildscope: compiler diagnostics ingestion and build analysis
//!
//! Turns the diagnostic output of a compiler invocation into one normalized
//! remark model and derives a performance analysis of the whole build.
//!
//! # Features
//!
//! - `-Rpass`, `-Rpass-missed` and `-Rpass-analysis` text remarks
//! - YAML optimization record streams (`-fsave-optimization-record`)
//! - Offload kernel-info descriptors with per-kernel accumulation
//! - Bottleneck detection and recommendations for finished builds
//!
//! # Example
//!
//! ```rust
//! use buildscope::{BuildRecord, RemarkCollector};
//!
//! let stderr = "remark: foo.c:10:5: 'bar' inlined into 'baz' with (cost=5): good reason at callsite foo.c:12:1;\n";
//!
//! let collector = RemarkCollector::default();
//! let mut build = BuildRecord::new("build-1");
//! build.performance.compile_time = 65.0;
//! collector
//!     .attach(&mut build, &["-O2"], stderr.as_bytes(), None)
//!     .unwrap();
//!
//! assert_eq!(build.remarks[0].args.callee.as_deref(), Some("bar"));
//! assert_eq!(build.remarks[0].id, "build-1-1");
//!
//! let analysis = collector.analyze(&build).unwrap();
//! assert_eq!(analysis.recommendations[0].category, "Build Performance");
//! ```

#![allow(clippy::cast_precision_loss)] // Byte and remark counts fit f64 ratios
#![allow(clippy::cast_possible_truncation)] // Metric values saturate explicitly
#![allow(clippy::unwrap_used)] // Safe for compile-time constant regex
#![allow(clippy::unused_self)] // Analyzer methods keep a receiver for future state
#![allow(clippy::module_name_repetitions)]

pub mod analyzer;
pub mod build;
pub mod collect;
pub mod config;
pub mod error;
pub mod kernel;
pub mod parser;
pub mod query;
pub mod remark;
pub mod remarks;

pub use analyzer::{analyze, AnalysisResult, PerformanceAnalyzer};
pub use build::BuildRecord;
pub use collect::RemarkCollector;
pub use config::CollectionConfig;
pub use error::{ParseError, Result};
pub use kernel::{KernelInfoParser, KernelInfoScanner};
pub use parser::RemarkParser;
pub use query::RemarkQuery;
pub use remark::{KernelInfo, Location, PassType, Remark, RemarkKind, RemarkStatus};
pub use remarks::{RecordStreamParser, TextRemarkParser};
