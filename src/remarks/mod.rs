//! Optimization remark front-ends
//!
//! Two independent grammars feed the same [`Remark`](crate::remark::Remark) model:
//! - `text`: `-Rpass*` lines printed on stderr
//! - `records`: YAML optimization records (`-fsave-optimization-record`)

mod records;
mod text;

pub use records::RecordStreamParser;
pub use text::TextRemarkParser;
