//! Optimization record stream parser
//!
//! Decodes the YAML document stream written by `-fsave-optimization-record`:
//!
//! ```yaml
//! --- !Missed
//! Pass:            inline
//! Name:            NoDefinition
//! DebugLoc:        { File: foo.c, Line: 4, Column: 10 }
//! Function:        main
//! Args:
//!   - Callee:          bar
//!   - String:          ' will not be inlined into '
//!   - Caller:          main
//! ...
//! ```
//!
//! A record whose tag or body cannot be decoded is skipped. A stream that
//! cannot be framed as YAML fails the whole parse.

use crate::error::{ParseError, Result};
use crate::parser::RemarkParser;
use crate::remark::{Location, PassType, Remark, RemarkAccess, RemarkArgs, RemarkKind, RemarkStatus};
use serde::Deserialize;
use serde_yml::{Mapping, Value};
use std::io::{BufRead, Read};
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawRecord {
    pass: String,
    name: String,
    #[serde(default)]
    function: Option<String>,
    #[serde(default)]
    debug_loc: Option<RawDebugLoc>,
    #[serde(default)]
    hotness: Option<i64>,
    #[serde(default)]
    args: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawDebugLoc {
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    line: Option<u32>,
    #[serde(default)]
    column: Option<u32>,
    #[serde(default)]
    function: Option<String>,
    #[serde(default)]
    region: Option<String>,
}

impl From<RawDebugLoc> for Location {
    fn from(raw: RawDebugLoc) -> Self {
        Self {
            file: raw.file,
            line: raw.line,
            column: raw.column,
            function: raw.function,
            region: raw.region,
        }
    }
}

/// Parser for YAML optimization record streams
#[derive(Debug, Default, Clone, Copy)]
pub struct RecordStreamParser;

impl RecordStreamParser {
    /// Create a new record stream parser
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Decode every record in an in-memory stream
    ///
    /// # Errors
    ///
    /// Returns `ParseError::RecordStream` if the text is not a readable YAML
    /// document stream.
    pub fn parse_documents(&self, text: &str) -> Result<Vec<Remark>> {
        let mut remarks = Vec::new();
        let mut skipped = 0usize;

        for document in serde_yml::Deserializer::from_str(text) {
            let value =
                Value::deserialize(document).map_err(|e| ParseError::RecordStream(e.to_string()))?;

            match decode_record(value) {
                Ok(remark) => remarks.push(remark),
                Err(reason) => {
                    skipped += 1;
                    debug!(%reason, "skipping optimization record");
                }
            }
        }

        debug!(parsed = remarks.len(), skipped, "parsed optimization records");
        Ok(remarks)
    }
}

impl RemarkParser for RecordStreamParser {
    fn grammar_name(&self) -> &str {
        "optimization-records"
    }

    fn parse<R: BufRead>(&self, mut reader: R) -> Result<Vec<Remark>> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        self.parse_documents(&text)
    }
}

/// Decode one tagged document into a remark; `Err` carries the skip reason.
fn decode_record(value: Value) -> std::result::Result<Remark, String> {
    let Value::Tagged(tagged) = value else {
        return Err("record has no type tag".to_string());
    };
    let tag = tagged.tag.to_string();
    let status = RemarkStatus::from_tag(&tag).ok_or_else(|| format!("unknown record tag {tag}"))?;
    let raw: RawRecord = serde_yml::from_value(tagged.value).map_err(|e| e.to_string())?;

    let pass = PassType::from_pass_name(&raw.pass);
    let kind = match (pass, status) {
        (PassType::KernelInfo, _) => RemarkKind::Kernel,
        (PassType::SizeInfo, _) => RemarkKind::Metric,
        (_, RemarkStatus::Analysis) => RemarkKind::Analysis,
        _ => RemarkKind::Optimization,
    };

    let mut args = RemarkArgs::default();
    for entry in &raw.args {
        if let Value::Mapping(entry) = entry {
            merge_arg(&mut args, entry);
        }
    }

    let message = render_message(&raw.pass, &raw.name, &raw.args);
    let mut remark = Remark::new(kind, pass, status, message);
    remark.function = raw.function.clone().unwrap_or_default();
    remark.location = raw.debug_loc.map(|loc| {
        let mut loc = Location::from(loc);
        if loc.function.is_none() {
            loc.function.clone_from(&raw.function);
        }
        loc
    });
    remark.hotness = raw.hotness;
    remark.args = args;
    remark.set_metadata("pass", raw.pass);
    remark.set_metadata("name", raw.name);
    Ok(remark)
}

/// Fold one argument entry into the accumulated payload.
///
/// Scalars are later-wins, `String` entries append. A `DebugLoc` sitting next
/// to `OtherAccess`/`ClobberedBy` belongs to that access.
fn merge_arg(args: &mut RemarkArgs, entry: &Mapping) {
    let sibling_loc = entry.get("DebugLoc").and_then(decode_location);
    let mut loc_taken = false;

    for (key, value) in entry {
        let Some(key) = key.as_str() else {
            continue;
        };
        match key {
            "String" => {
                if let Some(text) = scalar_text(value) {
                    args.strings.push(text);
                }
            }
            "Callee" => set_scalar(&mut args.callee, value),
            "Caller" => set_scalar(&mut args.caller, value),
            "Type" => set_scalar(&mut args.value_type, value),
            "Line" => set_scalar(&mut args.line, value),
            "Column" => set_scalar(&mut args.column, value),
            "Cost" => set_scalar(&mut args.cost, value),
            "Reason" => set_scalar(&mut args.reason, value),
            "OtherAccess" => {
                args.other_access = Some(decode_access(value, sibling_loc.clone()));
                loc_taken = true;
            }
            "ClobberedBy" => {
                args.clobbered_by = Some(decode_access(value, sibling_loc.clone()));
                loc_taken = true;
            }
            "DebugLoc" => {}
            other => {
                if let Some(text) = scalar_text(value) {
                    args.values.insert(other.to_string(), text);
                }
            }
        }
    }

    if !loc_taken {
        if let Some(loc) = sibling_loc {
            args.debug_loc = Some(loc);
        }
    }
}

fn set_scalar(slot: &mut Option<String>, value: &Value) {
    if let Some(text) = scalar_text(value) {
        *slot = Some(text);
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_text(&tagged.value),
        _ => None,
    }
}

fn decode_location(value: &Value) -> Option<Location> {
    serde_yml::from_value::<RawDebugLoc>(value.clone())
        .ok()
        .map(Location::from)
}

fn decode_access(value: &Value, sibling_loc: Option<Location>) -> RemarkAccess {
    match value {
        Value::Mapping(map) => RemarkAccess {
            access_type: map
                .get("Type")
                .or_else(|| map.get("type"))
                .and_then(scalar_text),
            debug_loc: map.get("DebugLoc").and_then(decode_location).or(sibling_loc),
        },
        other => RemarkAccess {
            access_type: scalar_text(other),
            debug_loc: sibling_loc,
        },
    }
}

/// `"<pass>: <name>"` followed by the argument entries rendered in record order.
///
/// `String` values are appended verbatim. A callee/caller pair renders as
/// `<callee> -> <caller>` once both halves have been seen; a lone half renders
/// nothing. `Type` renders as `type: <value>`.
fn render_message(pass: &str, name: &str, entries: &[Value]) -> String {
    let mut message = format!("{pass}: {name}");
    let mut callee: Option<String> = None;
    let mut caller: Option<String> = None;

    for (key, value) in entries
        .iter()
        .filter_map(Value::as_mapping)
        .flat_map(|entry| entry.iter())
    {
        let Some(text) = scalar_text(value) else {
            continue;
        };
        match key.as_str() {
            Some("String") => message.push_str(&text),
            Some("Callee") => callee = Some(text),
            Some("Caller") => caller = Some(text),
            Some("Type") => push_token(&mut message, &format!("type: {text}")),
            _ => {}
        }

        if let (Some(from), Some(into)) = (&callee, &caller) {
            push_token(&mut message, &format!("{from} -> {into}"));
            callee = None;
            caller = None;
        }
    }

    message
}

/// Append a rendered field, separated by a space unless one is already there
fn push_token(message: &mut String, token: &str) {
    if !message.ends_with(char::is_whitespace) {
        message.push(' ');
    }
    message.push_str(token);
}

#[cfg(test)]
mod tests {
    use super::*;

    const INLINE_MISSED: &str = r"--- !Missed
Pass:            inline
Name:            NoDefinition
DebugLoc:        { File: foo.c, Line: 4, Column: 10 }
Function:        main
Hotness:         30
Args:
  - Callee:          bar
  - String:          ' will not be inlined into '
  - Caller:          main
    DebugLoc:        { File: foo.c, Line: 2, Column: 0 }
  - String:          ' because its definition is unavailable'
...
";

    const STREAM: &str = r"--- !Passed
Pass:            inline
Name:            Inlined
DebugLoc:        { File: main.c, Line: 12, Column: 3 }
Function:        main
Args:
  - Callee:          square
    DebugLoc:        { File: main.c, Line: 3, Column: 0 }
  - String:          ' inlined into '
  - Caller:          main
  - String:          ' with '
  - String:          '(cost='
  - Cost:            '-30'
  - String:          ', threshold='
  - Threshold:       '225'
  - String:          ')'
...
--- !Analysis
Pass:            loop-vectorize
Name:            CantVectorizeLibcall
Function:        compute
Args:
  - String:          'loop not vectorized: '
  - String:          'call instruction cannot be vectorized'
...
--- !Missed
Pass:            licm
Name:            LoadWithLoopInvariantAddressInvalidated
DebugLoc:        { File: loop.c, Line: 8, Column: 14 }
Function:        compute
Args:
  - String:          failed to move load with loop-invariant address because the loop may invalidate its value
  - ClobberedBy:     store
    DebugLoc:        { File: loop.c, Line: 9, Column: 12 }
...
";

    #[test]
    fn test_missed_inline_record() {
        let remarks = RecordStreamParser::new().parse_str(INLINE_MISSED).unwrap();
        assert_eq!(remarks.len(), 1);

        let remark = &remarks[0];
        assert_eq!(remark.status, RemarkStatus::Missed);
        assert_eq!(remark.pass, PassType::Inlining);
        assert_eq!(remark.kind, RemarkKind::Optimization);
        assert_eq!(remark.function, "main");
        assert_eq!(remark.hotness, Some(30));

        let loc = remark.location.as_ref().unwrap();
        assert_eq!(loc.file.as_deref(), Some("foo.c"));
        assert_eq!(loc.line, Some(4));
        assert_eq!(loc.function.as_deref(), Some("main"));

        assert_eq!(remark.args.callee.as_deref(), Some("bar"));
        assert_eq!(remark.args.caller.as_deref(), Some("main"));
        assert_eq!(remark.args.strings.len(), 2);
        assert_eq!(remark.args.debug_loc, Some(Location::at("foo.c", 2, 0)));

        assert_eq!(
            remark.message,
            "inline: NoDefinition will not be inlined into bar -> main because its definition is unavailable"
        );
    }

    #[test]
    fn test_stream_with_multiple_records() {
        let remarks = RecordStreamParser::new().parse_str(STREAM).unwrap();
        assert_eq!(remarks.len(), 3);

        assert_eq!(remarks[0].status, RemarkStatus::Passed);
        assert_eq!(remarks[0].args.cost.as_deref(), Some("-30"));
        assert_eq!(
            remarks[0].args.values.get("Threshold").map(String::as_str),
            Some("225")
        );

        assert_eq!(remarks[1].status, RemarkStatus::Analysis);
        assert_eq!(remarks[1].kind, RemarkKind::Analysis);
        assert_eq!(remarks[1].pass, PassType::Vectorization);
        assert!(remarks[1].location.is_none());

        let clobber = remarks[2].args.clobbered_by.as_ref().unwrap();
        assert_eq!(clobber.access_type.as_deref(), Some("store"));
        assert_eq!(clobber.debug_loc, Some(Location::at("loop.c", 9, 12)));
        assert!(remarks[2].args.debug_loc.is_none());
        assert_eq!(remarks[2].metadata_str("pass"), Some("licm"));
    }

    #[test]
    fn test_scalar_fields_later_wins_strings_accumulate() {
        let stream = r"--- !Passed
Pass: inline
Name: Inlined
Args:
  - Callee: first
  - String: 'a'
  - Callee: second
  - String: 'b'
  - Line: 3
  - Line: '7'
...
";
        let remarks = RecordStreamParser::new().parse_str(stream).unwrap();
        let args = &remarks[0].args;
        assert_eq!(args.callee.as_deref(), Some("second"));
        assert_eq!(args.strings, vec!["a", "b"]);
        assert_eq!(args.line.as_deref(), Some("7"));
    }

    #[test]
    fn test_message_keeps_strings_verbatim() {
        let stream = r"--- !Missed
Pass: inline
Name: TooCostly
Args:
  - Callee: heavy
  - String: ' not inlined: '
  - String: 'cost too high'
...
";
        let remarks = RecordStreamParser::new().parse_str(stream).unwrap();
        assert_eq!(remarks[0].message, "inline: TooCostly not inlined: cost too high");
        assert_eq!(remarks[0].args.callee.as_deref(), Some("heavy"));
    }

    #[test]
    fn test_typed_value_rendering() {
        let stream = r"--- !Analysis
Pass: size-info
Name: FunctionSize
Args:
  - Type: i32
...
";
        let remarks = RecordStreamParser::new().parse_str(stream).unwrap();
        assert_eq!(remarks[0].kind, RemarkKind::Metric);
        assert_eq!(remarks[0].message, "size-info: FunctionSize type: i32");
    }

    #[test]
    fn test_tagless_record_skipped() {
        let stream = r"--- !Passed
Pass: inline
Name: Inlined
Function: main
...
---
Pass: inline
Name: Inlined
Function: other
...
";
        let remarks = RecordStreamParser::new().parse_str(stream).unwrap();
        assert_eq!(remarks.len(), 1);
        assert_eq!(remarks[0].function, "main");
    }

    #[test]
    fn test_unknown_tag_and_bad_body_skipped() {
        let stream = r"--- !Failure
Pass: inline
Name: Whatever
...
--- !Passed
Name: MissingPass
...
--- !passed
Pass: gvn
Name: LoadElim
...
";
        let remarks = RecordStreamParser::new().parse_str(stream).unwrap();
        assert_eq!(remarks.len(), 1);
        assert_eq!(remarks[0].pass, PassType::Analysis);
        assert_eq!(remarks[0].status, RemarkStatus::Passed);
    }

    #[test]
    fn test_malformed_stream_is_error() {
        let stream = "--- !Passed\nPass: [inline\nName: broken\n";
        let result = RecordStreamParser::new().parse_str(stream);
        assert!(matches!(result, Err(ParseError::RecordStream(_))));
    }

    #[test]
    fn test_empty_stream() {
        let remarks = RecordStreamParser::new().parse_str("").unwrap();
        assert!(remarks.is_empty());
    }
}
