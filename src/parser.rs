//! Shared front-end trait
//!
//! Every diagnostic grammar implements [`RemarkParser`]; callers pick the
//! front-end and hand it a stream. Each `parse` call owns its own state, so a
//! single parser value can serve concurrent callers.

use crate::error::Result;
use crate::remark::Remark;
use std::io::BufRead;

/// A compiler diagnostic grammar
pub trait RemarkParser {
    /// Name of the grammar (e.g. "text-remarks", "optimization-records")
    fn grammar_name(&self) -> &str;

    /// Consume the whole stream and return remarks in input order
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Io` when the stream cannot be read. Grammars that
    /// frame their input as documents also fail with `ParseError::RecordStream`.
    fn parse<R: BufRead>(&self, reader: R) -> Result<Vec<Remark>>;

    /// Convenience wrapper over [`RemarkParser::parse`] for in-memory text
    ///
    /// # Errors
    ///
    /// Same as [`RemarkParser::parse`].
    fn parse_str(&self, text: &str) -> Result<Vec<Remark>> {
        self.parse(text.as_bytes())
    }
}
