//! Textual remark parser
//!
//! Recognizes `remark: <file>:<line>:<col>: <message> [<pass-tag>]` lines and
//! classifies them by pass tag. Noise and malformed lines are skipped; only
//! stream read errors reach the caller.

use crate::error::Result;
use crate::parser::RemarkParser;
use crate::remark::{Location, PassType, Remark, RemarkKind, RemarkStatus};
use regex::Regex;
use std::io::BufRead;
use std::sync::OnceLock;
use tracing::{debug, trace};

const REMARK_PREFIX: &str = "remark: ";

fn remark_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^remark: ([^:]+):(\d+):(\d+): (.+?)(?: \[([^\]]+)\])?$").unwrap()
    })
}

fn inline_sentence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"'([^']+)' (inlined into) '([^']+)' with \(([^)]+)\):(.*?) at callsite ([^;]+);")
            .unwrap()
    })
}

/// Parser for `-Rpass`, `-Rpass-missed` and `-Rpass-analysis` stderr output
#[derive(Debug, Default, Clone, Copy)]
pub struct TextRemarkParser;

impl TextRemarkParser {
    /// Create a new textual remark parser
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Parse one line. Returns `None` for lines that are not remarks or fail
    /// the grammar of their pass.
    #[must_use]
    pub fn parse_line(&self, line: &str) -> Option<Remark> {
        if !line.starts_with(REMARK_PREFIX) {
            return None;
        }

        let caps = remark_line().captures(line)?;
        let file = &caps[1];
        let line_no = caps[2].parse().ok()?;
        let column = caps[3].parse().ok()?;
        let message = &caps[4];
        let tag = caps.get(5).map(|m| m.as_str());

        let mut remark = match tag {
            Some(tag) if tag.contains("inline") => inline_remark(message)?,
            Some(tag) if tag.contains("missed") => {
                let mut remark = Remark::new(
                    RemarkKind::Optimization,
                    PassType::Vectorization,
                    RemarkStatus::Missed,
                    message,
                );
                let (subject, reason) = split_subject(message)?;
                remark.args.reason = Some(reason.to_string());
                remark.set_metadata("optimization", subject);
                remark.set_metadata("reason", reason);
                remark
            }
            Some(tag) if tag.contains("analysis") => {
                let mut remark = Remark::new(
                    RemarkKind::Analysis,
                    PassType::Analysis,
                    RemarkStatus::Analysis,
                    message,
                );
                let (subject, result) = split_subject(message)?;
                remark.args.strings = vec![subject.to_string(), result.to_string()];
                remark.set_metadata("analysis", subject);
                remark.set_metadata("result", result);
                remark
            }
            Some(tag) if tag.contains("size-info") => Remark::new(
                RemarkKind::Metric,
                PassType::SizeInfo,
                RemarkStatus::Analysis,
                message,
            ),
            Some(tag) => {
                trace!(tag, "unclassified remark tag");
                return None;
            }
            // Untagged lines only qualify through the inlining sentence
            None => inline_remark(message)?,
        };

        remark.location = Some(Location::at(file, line_no, column));
        if let Some(tag) = tag {
            remark.set_metadata("tag", tag);
        }
        Some(remark)
    }
}

/// Build an inlining remark from `'<callee>' inlined into '<caller>' with (<params>): <reason> at callsite <loc>;`
fn inline_remark(message: &str) -> Option<Remark> {
    let caps = inline_sentence().captures(message)?;
    let mut remark = Remark::new(
        RemarkKind::Optimization,
        PassType::Inlining,
        RemarkStatus::Passed,
        message,
    );

    let params = caps[4].trim();
    let callsite = caps[6].trim();
    let args = &mut remark.args;
    args.callee = Some(caps[1].to_string());
    args.caller = Some(caps[3].to_string());
    args.reason = Some(caps[5].trim().to_string());
    args.debug_loc = Location::parse_triple(callsite);

    for param in params.split(',') {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        if key == "cost" {
            args.cost = Some(value.to_string());
        } else if !key.is_empty() {
            args.values.insert(key.to_string(), value.to_string());
        }
    }

    remark.set_metadata("action", &caps[2]);
    remark.set_metadata("params", params);
    remark.set_metadata("callsite", callsite);
    Some(remark)
}

/// Split `<subject>: <reason>` on the first `": "`
fn split_subject(message: &str) -> Option<(&str, &str)> {
    let (subject, reason) = message.split_once(": ")?;
    let (subject, reason) = (subject.trim(), reason.trim());
    if subject.is_empty() || reason.is_empty() {
        None
    } else {
        Some((subject, reason))
    }
}

impl RemarkParser for TextRemarkParser {
    fn grammar_name(&self) -> &str {
        "text-remarks"
    }

    fn parse<R: BufRead>(&self, reader: R) -> Result<Vec<Remark>> {
        let mut remarks = Vec::new();
        let mut skipped = 0usize;

        for line in reader.lines() {
            let line = line?;
            if !line.starts_with(REMARK_PREFIX) {
                continue;
            }
            match self.parse_line(&line) {
                Some(remark) => remarks.push(remark),
                None => {
                    skipped += 1;
                    trace!(line = %line, "skipping malformed remark");
                }
            }
        }

        debug!(parsed = remarks.len(), skipped, "parsed textual remarks");
        Ok(remarks)
    }
}
