//! Canonical in-memory model of one linter diagnostic.
//!
//! The analysis tool is known to emit literal duplicates in its JSON output,
//! so every record carries a deduplication key; records that should land in
//! the same tracked issue share a grouping key (path + rule id).

use crate::blame::BlameInfo;
use serde::Deserialize;

/// One diagnostic as emitted by the analysis tool's JSON output mode.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDiagnostic {
    pub path: String,
    pub line: u32,
    pub column: u32,
    pub symbol: String,
    pub message: String,
    #[serde(rename = "message-id")]
    pub message_id: String,
    #[serde(rename = "type")]
    pub category: String,
}

/// The fixed severity enumeration the counters recognize. Categories outside
/// this set still produce records, they are just invisible to the counters
/// (forward compatibility with tool output changes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
    Fatal,
    Convention,
    Information,
    Refactor,
}

impl Severity {
    pub const ALL: [Severity; 6] = [
        Severity::Warning,
        Severity::Error,
        Severity::Fatal,
        Severity::Convention,
        Severity::Information,
        Severity::Refactor,
    ];

    pub fn parse(category: &str) -> Option<Severity> {
        match category {
            "warning" => Some(Severity::Warning),
            "error" => Some(Severity::Error),
            "fatal" => Some(Severity::Fatal),
            "convention" => Some(Severity::Convention),
            "information" => Some(Severity::Information),
            "refactor" => Some(Severity::Refactor),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
            Severity::Convention => "convention",
            Severity::Information => "information",
            Severity::Refactor => "refactor",
        }
    }

    /// Console banner for the per-file summary.
    pub fn banner(self) -> &'static str {
        match self {
            Severity::Warning => "⚠️ Warnings",
            Severity::Error => "🛑 Errors",
            Severity::Fatal => "🚨 Fatal Errors",
            Severity::Convention => "👎 Conventions",
            Severity::Information => "💁‍♀️ Information",
            Severity::Refactor => "🔧 Refactor",
        }
    }
}

/// Immutable, normalized diagnostic with its blame attribution attached.
#[derive(Debug, Clone)]
pub struct DiagnosticRecord {
    pub path: String,
    pub line: u32,
    pub column: u32,
    pub symbol: String,
    pub message: String,
    pub message_id: String,
    pub category: String,
    pub blame: BlameInfo,
    /// Message split into display lines with continuation indentation
    /// stripped. Never empty for a non-empty message.
    pub message_lines: Vec<String>,
}

impl DiagnosticRecord {
    pub fn new(raw: RawDiagnostic, blame: BlameInfo) -> Self {
        let message_lines = normalize_message(&raw.message);
        Self {
            path: raw.path,
            line: raw.line,
            column: raw.column,
            symbol: raw.symbol,
            message: raw.message,
            message_id: raw.message_id,
            category: raw.category,
            blame,
            message_lines,
        }
    }

    /// Identity used to drop literally repeated emissions. Collisions are the
    /// same diagnostic.
    pub fn dedup_key(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.line, self.column, self.category, self.symbol, self.message
        )
    }

    /// Identity used to merge diagnostics into one tracked issue.
    pub fn group_key(&self) -> String {
        format!("{}:{}", self.path, self.message_id)
    }
}

/// Split a possibly multi-line message into display lines. The indentation
/// width observed on the second line is stripped from every continuation
/// line so the console renderer can apply its own alignment.
fn normalize_message(message: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut chop = 0usize;

    for (index, line) in message.split('\n').filter(|l| !l.is_empty()).enumerate() {
        if index == 1 {
            chop = line.len() - line.trim_start().len();
        }
        let line = if index >= 1 && chop != 0 {
            line.get(chop..).unwrap_or("")
        } else {
            line
        };
        lines.push(line.to_string());
    }

    lines
}

/// New-vs-preexisting counter, where "new" means the blamed revision lies
/// inside the commit range under review.
#[derive(Debug, Clone, Copy, Default)]
pub struct Counter {
    pub new: u32,
    pub old: u32,
}

impl Counter {
    pub fn increment(&mut self, is_new: bool) {
        if is_new {
            self.new += 1;
        } else {
            self.old += 1;
        }
    }

    pub fn merge(&mut self, other: &Counter) {
        self.new += other.new;
        self.old += other.old;
    }

    pub fn total(&self) -> u32 {
        self.new + self.old
    }
}

/// Per-severity counters plus a running total.
#[derive(Debug, Clone, Default)]
pub struct CategoryCounts {
    counts: [Counter; 6],
    pub totals: Counter,
}

impl CategoryCounts {
    /// Unknown categories are silently ignored.
    pub fn record(&mut self, category: &str, is_new: bool) {
        let Some(severity) = Severity::parse(category) else {
            return;
        };
        self.counts[severity as usize].increment(is_new);
        self.totals.increment(is_new);
    }

    pub fn get(&self, severity: Severity) -> &Counter {
        &self.counts[severity as usize]
    }

    pub fn merge(&mut self, other: &CategoryCounts) {
        for (mine, theirs) in self.counts.iter_mut().zip(other.counts.iter()) {
            mine.merge(theirs);
        }
        self.totals.merge(&other.totals);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Severity, &Counter)> + '_ {
        Severity::ALL
            .iter()
            .map(move |&severity| (severity, &self.counts[severity as usize]))
    }
}

/// Widest values seen so far, used for console column alignment.
#[derive(Debug, Clone, Copy, Default)]
pub struct Maximums {
    pub line: usize,
    pub column: usize,
    pub message_id: usize,
}

impl Maximums {
    pub fn width_of(number: u32) -> usize {
        (number.max(1).ilog10() + 1) as usize
    }

    pub fn update(&mut self, record: &DiagnosticRecord) {
        self.line = self.line.max(Self::width_of(record.line));
        self.column = self.column.max(Self::width_of(record.column));
        self.message_id = self.message_id.max(record.message_id.len());
    }

    pub fn merge(&mut self, other: &Maximums) {
        self.line = self.line.max(other.line);
        self.column = self.column.max(other.column);
        self.message_id = self.message_id.max(other.message_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blame::BlameInfo;

    fn blame(is_new: bool) -> BlameInfo {
        BlameInfo {
            sha: "abc123".into(),
            author: "alice".into(),
            committer: "alice".into(),
            summary: "add module".into(),
            is_new,
        }
    }

    fn raw(line: u32, message: &str) -> RawDiagnostic {
        RawDiagnostic {
            path: "a.py".into(),
            line,
            column: 4,
            symbol: "no-member".into(),
            message: message.into(),
            message_id: "E1101".into(),
            category: "error".into(),
        }
    }

    #[test]
    fn test_severity_parse_round_trip() {
        for severity in Severity::ALL {
            assert_eq!(Severity::parse(severity.as_str()), Some(severity));
        }
        assert_eq!(Severity::parse("nonsense"), None);
    }

    #[test]
    fn test_dedup_key_covers_position_and_text() {
        let a = DiagnosticRecord::new(raw(10, "bad"), blame(true));
        let b = DiagnosticRecord::new(raw(10, "bad"), blame(false));
        let c = DiagnosticRecord::new(raw(11, "bad"), blame(true));
        assert_eq!(a.dedup_key(), b.dedup_key());
        assert_ne!(a.dedup_key(), c.dedup_key());
    }

    #[test]
    fn test_group_key_is_path_and_rule() {
        let a = DiagnosticRecord::new(raw(10, "bad"), blame(true));
        let b = DiagnosticRecord::new(raw(99, "other text"), blame(true));
        assert_eq!(a.group_key(), "a.py:E1101");
        assert_eq!(a.group_key(), b.group_key());
    }

    #[test]
    fn test_normalize_single_line_message() {
        assert_eq!(normalize_message("simple"), vec!["simple"]);
    }

    #[test]
    fn test_normalize_strips_continuation_indent() {
        let msg = "header line\n    detail one\n    detail two\n        nested";
        assert_eq!(
            normalize_message(msg),
            vec!["header line", "detail one", "detail two", "    nested"]
        );
    }

    #[test]
    fn test_normalize_drops_empty_lines() {
        let msg = "header\n\n  body\n";
        assert_eq!(normalize_message(msg), vec!["header", "body"]);
    }

    #[test]
    fn test_normalize_unindented_second_line_untouched() {
        let msg = "header\nflush\n  indented";
        assert_eq!(normalize_message(msg), vec!["header", "flush", "  indented"]);
    }

    #[test]
    fn test_counts_ignore_unknown_category() {
        let mut counts = CategoryCounts::default();
        counts.record("warning", true);
        counts.record("mystery", true);
        assert_eq!(counts.totals.total(), 1);
        assert_eq!(counts.get(Severity::Warning).new, 1);
    }

    #[test]
    fn test_counts_split_new_and_old() {
        let mut counts = CategoryCounts::default();
        counts.record("error", true);
        counts.record("error", false);
        counts.record("error", false);
        let errors = counts.get(Severity::Error);
        assert_eq!(errors.new, 1);
        assert_eq!(errors.old, 2);
        assert_eq!(counts.totals.total(), 3);
    }

    #[test]
    fn test_maximums_widths() {
        assert_eq!(Maximums::width_of(0), 1);
        assert_eq!(Maximums::width_of(9), 1);
        assert_eq!(Maximums::width_of(10), 2);
        assert_eq!(Maximums::width_of(1234), 4);

        let mut max = Maximums::default();
        max.update(&DiagnosticRecord::new(raw(120, "x"), blame(true)));
        assert_eq!(max.line, 3);
        assert_eq!(max.column, 1);
        assert_eq!(max.message_id, 5);
    }
}
