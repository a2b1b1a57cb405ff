//! Candidate tracked issues.
//!
//! One diagnostic group (path + rule) becomes one candidate issue. The title
//! is the sole identity key during reconciliation, so it must be byte-stable
//! across runs for unchanged input, and it encodes the branch so issue
//! lifecycles stay independent per branch.

use std::collections::{BTreeSet, HashSet};

use crate::config::Config;
use crate::diagnostic::DiagnosticRecord;

/// Marker label identifying issues owned by this tool.
pub const MARKER_LABEL: &str = "autolint";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Local,
    Remote,
}

/// Either a locally synthesized issue for the current run or an open issue
/// fetched from the tracker, compared by title identity.
#[derive(Debug, Clone)]
pub struct CandidateIssue {
    /// Present only for remote-origin issues.
    pub number: Option<u64>,
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
    pub origin: Origin,
    pub branch: String,
}

impl CandidateIssue {
    /// Equality for update-skipping: title, body, label set and assignee set
    /// (the latter two order-independent).
    pub fn same_content(&self, other: &CandidateIssue) -> bool {
        let labels_a: HashSet<&str> = self.labels.iter().map(String::as_str).collect();
        let labels_b: HashSet<&str> = other.labels.iter().map(String::as_str).collect();
        let assignees_a: HashSet<&str> = self.assignees.iter().map(String::as_str).collect();
        let assignees_b: HashSet<&str> = other.assignees.iter().map(String::as_str).collect();

        self.title == other.title
            && self.body == other.body
            && labels_a == labels_b
            && assignees_a == assignees_b
    }
}

/// Branch-class label, derived by comparing the branch name against the known
/// mainline names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchClass {
    Mainline,
    Integration,
    Feature,
}

const INTEGRATION_BRANCHES: [&str; 4] = ["develop", "dev", "staging", "release"];

impl BranchClass {
    pub fn classify(branch: &str, mainline: &[String]) -> BranchClass {
        if mainline.iter().any(|name| name == branch) {
            BranchClass::Mainline
        } else if INTEGRATION_BRANCHES.contains(&branch) {
            BranchClass::Integration
        } else {
            BranchClass::Feature
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BranchClass::Mainline => "mainline",
            BranchClass::Integration => "integration",
            BranchClass::Feature => "feature",
        }
    }
}

/// Builds the candidate issue for one grouping key's diagnostic sequence.
/// The sequence must be non-empty; its first record is the representative
/// for title and label synthesis.
pub fn synthesize(
    records: &[DiagnosticRecord],
    config: &Config,
    collaborators: &HashSet<String>,
) -> CandidateIssue {
    let first = &records[0];

    let title = format!(
        "[{}][{}] {} {} in {}",
        first.message_id,
        config.branch,
        humanize_symbol(&first.symbol),
        first.category,
        first.path
    );

    let mut body = String::new();
    if let Some(note) = remediation_note(&first.message_id) {
        body.push_str(">**Note:**\r\n>");
        body.push_str(note);
        body.push_str("\r\n\r\n");
    }
    for record in records {
        body.push_str(&format!(
            "{}\r\nhttps://github.com/{}/blob/{}/{}#L{}\r\n",
            record.message, config.repo_slug, config.after, record.path, record.line
        ));
    }

    let class = BranchClass::classify(&config.branch, &config.mainline_branches);
    let labels = vec![
        MARKER_LABEL.to_string(),
        first.category.clone(),
        class.label().to_string(),
    ];

    // Distinct blame authors, restricted to valid collaborator logins so a
    // departed author or an unlisted bot is never assigned.
    let assignees: Vec<String> = records
        .iter()
        .map(|record| record.blame.author.clone())
        .collect::<BTreeSet<String>>()
        .into_iter()
        .filter(|author| collaborators.contains(author))
        .collect();

    CandidateIssue {
        number: None,
        title,
        body,
        labels,
        assignees,
        origin: Origin::Local,
        branch: config.branch.clone(),
    }
}

/// Hyphens become spaces, first letter upper-cased.
pub fn humanize_symbol(symbol: &str) -> String {
    let spaced = symbol.replace('-', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => spaced,
    }
}

/// Recovers the branch a title was synthesized for: the second bracket group
/// of `[<message_id>][<branch>] ...`.
pub fn encoded_branch(title: &str) -> Option<&str> {
    let rest = title.strip_prefix('[')?;
    let (_, rest) = rest.split_once(']')?;
    let rest = rest.strip_prefix('[')?;
    let (branch, _) = rest.split_once(']')?;
    Some(branch)
}

/// Static remediation notes for rules with a well-known common cause.
pub fn remediation_note(message_id: &str) -> Option<&'static str> {
    match message_id {
        "E0611" => Some(
            "This issue is often flagged when an imported package and a local \
             python file share the same name. You can disable the check in this \
             file by adding the line `# pylint: disable=E0611` above the import.",
        ),
        _ => None,
    }
}
