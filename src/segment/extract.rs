//! Recovery of a JSON object from free-form model output.
//!
//! Stages run in a fixed order and the first one that yields a JSON object wins:
//!
//! 1. [`ExtractStage::Direct`] parses the trimmed text as-is.
//! 2. [`ExtractStage::FenceStripped`] removes markdown code fences, then parses.
//! 3. [`ExtractStage::BraceSlice`] parses the span from the first `{` to the last `}`.
//! 4. [`ExtractStage::PatternScan`] tries every brace-delimited candidate found by three
//!    patterns of increasing looseness.
//! 5. [`ExtractStage::PrintableOnly`] drops non-printable characters, then brace-slices.
//! 6. [`ExtractStage::QuoteRepair`] straightens smart quotes and single-quoted keys and
//!    values, then brace-slices.
//!
//! Stages 2-6 work on the fence-stripped text. Each stage is a pure function and can
//! be run on its own through [`StructuredExtractor::run_stage`].

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::SegmentRecord;
use crate::error::{RelayError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractStage {
    Direct,
    FenceStripped,
    BraceSlice,
    PatternScan,
    PrintableOnly,
    QuoteRepair,
}

impl ExtractStage {
    pub const ALL: [ExtractStage; 6] = [
        ExtractStage::Direct,
        ExtractStage::FenceStripped,
        ExtractStage::BraceSlice,
        ExtractStage::PatternScan,
        ExtractStage::PrintableOnly,
        ExtractStage::QuoteRepair,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ExtractStage::Direct => "direct",
            ExtractStage::FenceStripped => "fence_stripped",
            ExtractStage::BraceSlice => "brace_slice",
            ExtractStage::PatternScan => "pattern_scan",
            ExtractStage::PrintableOnly => "printable_only",
            ExtractStage::QuoteRepair => "quote_repair",
        }
    }
}

impl std::fmt::Display for ExtractStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Successful extraction and the stage that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub record: SegmentRecord,
    pub stage: ExtractStage,
}

pub struct StructuredExtractor {
    fence: Regex,
    candidates: [Regex; 3],
    single_quoted_key: Regex,
    single_quoted_value: Regex,
}

impl StructuredExtractor {
    pub fn new() -> Self {
        Self {
            fence: compile(r"```json\n?|\n?```"),
            candidates: [
                // One level of nesting.
                compile(r"\{[^{}]*(?:\{[^{}]*\}[^{}]*)*\}"),
                compile(r"(?s)\{.*?\}"),
                compile(r"\{[^}]*\}"),
            ],
            single_quoted_key: compile(r"'([^']+)'\s*:"),
            single_quoted_value: compile(r#":\s*'([^'"]*)'"#),
        }
    }

    /// Shared instance; patterns are compiled once.
    pub fn global() -> &'static StructuredExtractor {
        static INSTANCE: OnceLock<StructuredExtractor> = OnceLock::new();
        INSTANCE.get_or_init(StructuredExtractor::new)
    }

    /// Run the stages in order and build a record from the first object recovered.
    ///
    /// Fails with [`RelayError::ParseExhausted`] carrying `raw` when no stage succeeds.
    pub fn extract(&self, raw: &str) -> Result<Extracted> {
        for stage in ExtractStage::ALL {
            match self.run_stage(stage, raw) {
                Ok(object) => {
                    debug!(stage = stage.name(), "structured output recovered");
                    return Ok(Extracted {
                        record: SegmentRecord::from_object(&object),
                        stage,
                    });
                }
                Err(reason) => debug!(stage = stage.name(), %reason, "extraction stage failed"),
            }
        }
        warn!(raw_len = raw.len(), "all extraction stages failed");
        Err(RelayError::ParseExhausted {
            raw: raw.to_string(),
        })
    }

    /// Run a single stage in isolation.
    pub fn run_stage(
        &self,
        stage: ExtractStage,
        raw: &str,
    ) -> std::result::Result<Map<String, Value>, String> {
        match stage {
            ExtractStage::Direct => parse_object(raw.trim()),
            ExtractStage::FenceStripped => parse_object(&self.strip_fences(raw)),
            ExtractStage::BraceSlice => parse_brace_slice(&self.strip_fences(raw)),
            ExtractStage::PatternScan => self.scan_candidates(&self.strip_fences(raw)),
            ExtractStage::PrintableOnly => {
                let printable: String = self
                    .strip_fences(raw)
                    .chars()
                    .filter(|&c| c == '\n' || c == '\t' || is_printable(c))
                    .collect();
                parse_brace_slice(&printable)
            }
            ExtractStage::QuoteRepair => {
                parse_brace_slice(&self.repair_quotes(&self.strip_fences(raw)))
            }
        }
    }

    fn strip_fences(&self, raw: &str) -> String {
        self.fence.replace_all(raw, "").trim().to_string()
    }

    fn scan_candidates(&self, text: &str) -> std::result::Result<Map<String, Value>, String> {
        let mut tried = 0usize;
        for pattern in &self.candidates {
            for m in pattern.find_iter(text) {
                tried += 1;
                if let Ok(object) = parse_object(m.as_str()) {
                    return Ok(object);
                }
            }
        }
        Err(format!("none of {tried} candidate blocks parsed"))
    }

    fn repair_quotes(&self, text: &str) -> String {
        let straightened: String = text
            .chars()
            .map(|c| match c {
                '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' => '"',
                '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' => '\'',
                other => other,
            })
            .collect();
        let keys = self
            .single_quoted_key
            .replace_all(&straightened, "\"${1}\":");
        self.single_quoted_value
            .replace_all(&keys, ": \"${1}\"")
            .into_owned()
    }
}

impl Default for StructuredExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("extraction patterns are static")
}

fn parse_object(text: &str) -> std::result::Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(other) => Err(format!("parsed a JSON {} instead of an object", json_kind(&other))),
        Err(e) => Err(e.to_string()),
    }
}

fn parse_brace_slice(text: &str) -> std::result::Result<Map<String, Value>, String> {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => parse_object(&text[start..=end]),
        _ => Err("no brace-delimited span".into()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Printable in the sense of "renders as visible text or a plain space": control
/// characters, invisible format characters and non-space separators are excluded.
fn is_printable(c: char) -> bool {
    if c == ' ' {
        return true;
    }
    if c.is_control() || c.is_whitespace() {
        return false;
    }
    !matches!(
        c,
        '\u{00AD}'
            | '\u{061C}'
            | '\u{180E}'
            | '\u{200B}'..='\u{200F}'
            | '\u{202A}'..='\u{202E}'
            | '\u{2060}'..='\u{2064}'
            | '\u{2066}'..='\u{206F}'
            | '\u{FEFF}'
            | '\u{FFF9}'..='\u{FFFB}'
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ex() -> &'static StructuredExtractor {
        StructuredExtractor::global()
    }

    #[test]
    fn direct_json_wins_first() {
        let out = ex().extract(r#"  {"jobTitle": "Cook", "location": "Austin, TX"} "#).unwrap();
        assert_eq!(out.stage, ExtractStage::Direct);
        assert_eq!(out.record.job_title.as_deref(), Some("Cook"));
        assert_eq!(out.record.location.as_deref(), Some("Austin, TX"));
    }

    #[test]
    fn fenced_object_matches_unwrapped_parse() {
        let body = r#"{"jobTitle": "Sous Chef", "companyName": "The Grandview Restaurant"}"#;
        let fenced = format!("```json\n{body}\n```");

        assert!(ex().run_stage(ExtractStage::Direct, &fenced).is_err());
        let via_fence = ex().run_stage(ExtractStage::FenceStripped, &fenced).unwrap();
        let direct = ex().run_stage(ExtractStage::Direct, body).unwrap();
        assert_eq!(via_fence, direct);
        assert_eq!(ex().extract(&fenced).unwrap().stage, ExtractStage::FenceStripped);
    }

    #[test]
    fn bare_fence_without_language_tag() {
        let out = ex().extract("```\n{\"jobTitle\": \"Barista\"}\n```").unwrap();
        assert_eq!(out.stage, ExtractStage::FenceStripped);
        assert_eq!(out.record.job_title.as_deref(), Some("Barista"));
    }

    #[test]
    fn preamble_and_trailing_notes_use_brace_slice() {
        let out = ex()
            .extract(r#"Some preamble {"jobTitle": "Cook"} trailing notes"#)
            .unwrap();
        assert_eq!(out.stage, ExtractStage::BraceSlice);
        assert_eq!(
            out.record,
            SegmentRecord {
                job_title: Some("Cook".into()),
                ..Default::default()
            }
        );
    }

    #[test]
    fn pattern_scan_picks_first_valid_block() {
        let raw = r#"Draft: {not json} Final: {"jobTitle": "Server", "salaryRange": "$18/hr"} done"#;
        assert!(ex().run_stage(ExtractStage::BraceSlice, raw).is_err());
        let out = ex().extract(raw).unwrap();
        assert_eq!(out.stage, ExtractStage::PatternScan);
        assert_eq!(out.record.salary_range.as_deref(), Some("$18/hr"));
    }

    #[test]
    fn pattern_scan_handles_one_level_of_nesting() {
        let raw = r#"x {"jobTitle": "Host", "meta": {"k": 1}} y {broken"#;
        let object = ex().run_stage(ExtractStage::PatternScan, raw).unwrap();
        assert_eq!(object["jobTitle"], "Host");
    }

    #[test]
    fn invisible_characters_are_dropped() {
        let raw = "{\"jobTitle\":\u{200B} \"Dishwasher\",\u{0007} \"location\": \"Reno, NV\"}";
        assert!(ex().run_stage(ExtractStage::PatternScan, raw).is_err());
        let out = ex().extract(raw).unwrap();
        assert_eq!(out.stage, ExtractStage::PrintableOnly);
        assert_eq!(out.record.job_title.as_deref(), Some("Dishwasher"));
    }

    #[test]
    fn smart_and_single_quotes_are_repaired() {
        let raw = "Result: {\u{201C}jobTitle\u{201D}: \u{201C}Baker\u{201D}, 'companyName': 'the rise'}";
        let out = ex().extract(raw).unwrap();
        assert_eq!(out.stage, ExtractStage::QuoteRepair);
        assert_eq!(out.record.job_title.as_deref(), Some("Baker"));
        assert_eq!(out.record.company_name.as_deref(), Some("the rise"));
    }

    #[test]
    fn arrays_and_scalars_are_not_objects() {
        assert!(ex().run_stage(ExtractStage::Direct, "[1, 2]").is_err());
        assert!(ex().run_stage(ExtractStage::Direct, "\"text\"").is_err());
    }

    #[test]
    fn exhaustion_carries_raw_text() {
        let raw = "I could not find any job details, sorry.";
        match ex().extract(raw) {
            Err(RelayError::ParseExhausted { raw: kept }) => assert_eq!(kept, raw),
            other => panic!("expected ParseExhausted, got {other:?}"),
        }
    }

    #[test]
    fn empty_object_is_a_valid_sparse_record() {
        let out = ex().extract("{}").unwrap();
        assert_eq!(out.record, SegmentRecord::default());
    }

    #[test]
    fn printable_filter_keeps_text_and_layout() {
        assert!(is_printable('a'));
        assert!(is_printable(' '));
        assert!(is_printable('é'));
        assert!(!is_printable('\u{FEFF}'));
        assert!(!is_printable('\u{00A0}'));
        assert!(!is_printable('\r'));
    }
}
