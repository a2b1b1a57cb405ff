//! GitHub tracker client: remote issue index plus create/update/close.
//!
//! All calls are authenticated JSON over the v3 REST API and are issued
//! strictly one at a time; list endpoints paginate fully before returning.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::issue::{encoded_branch, CandidateIssue, Origin, MARKER_LABEL};

const API_ROOT: &str = "https://api.github.com";
const API_TIMEOUT_SECS: u64 = 60;
const PAGE_SIZE: usize = 100;
const USER_AGENT: &str = "lintwarden";

/// Maximum length for error body content in error messages
const MAX_ERROR_BODY_LEN: usize = 200;

/// Sanitize an API error body to prevent credential leakage.
/// Truncates long responses and redacts potential secrets.
fn sanitize_error_body(body: &str) -> String {
    const SECRET_PATTERNS: &[&str] = &[
        "token",
        "secret",
        "password",
        "credential",
        "bearer",
        "ghp_",
        "gho_",
        "ghu_",
        "github_pat_",
    ];

    let truncated = if body.len() > MAX_ERROR_BODY_LEN {
        // Back off to a char boundary so multi-byte text cannot panic.
        let mut end = MAX_ERROR_BODY_LEN;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated)", &body[..end])
    } else {
        body.to_string()
    };

    let lower = truncated.to_lowercase();
    for pattern in SECRET_PATTERNS {
        if lower.contains(pattern) {
            return "(error details redacted - may contain sensitive data)".to_string();
        }
    }

    truncated
}

#[derive(Deserialize)]
struct LabelDto {
    name: String,
}

#[derive(Deserialize)]
struct AssigneeDto {
    login: String,
}

#[derive(Deserialize)]
struct IssueDto {
    number: u64,
    title: String,
    #[serde(default)]
    body: Option<String>,
    state: String,
    #[serde(default)]
    labels: Vec<LabelDto>,
    #[serde(default)]
    assignees: Vec<AssigneeDto>,
    /// Present on pull requests, which share the issues endpoint.
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct CollaboratorDto {
    login: String,
}

#[derive(Serialize)]
struct CreateIssueRequest<'a> {
    title: &'a str,
    body: &'a str,
    labels: &'a [String],
    assignees: &'a [String],
}

#[derive(Serialize)]
struct UpdateIssueRequest<'a> {
    title: &'a str,
    body: &'a str,
    labels: &'a [String],
    assignees: &'a [String],
    state: &'a str,
}

#[derive(Serialize)]
struct CloseIssueRequest<'a> {
    state: &'a str,
}

#[derive(Deserialize)]
struct ApiErrorResponse {
    message: String,
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

/// A tracker issue becomes a remote candidate only when it is an open,
/// non-PR issue carrying the marker label.
fn to_candidate(dto: IssueDto) -> Option<CandidateIssue> {
    if dto.pull_request.is_some() || dto.state != "open" {
        return None;
    }

    let labels: Vec<String> = dto.labels.into_iter().map(|l| l.name).collect();
    if !labels.iter().any(|l| l == MARKER_LABEL) {
        return None;
    }

    let branch = encoded_branch(&dto.title).unwrap_or_default().to_string();

    Some(CandidateIssue {
        number: Some(dto.number),
        title: dto.title,
        body: dto.body.unwrap_or_default(),
        labels,
        assignees: dto.assignees.into_iter().map(|a| a.login).collect(),
        origin: Origin::Remote,
        branch,
    })
}

/// Tracker mutations used by reconciliation, kept behind a trait so the
/// apply step can be exercised against test doubles without HTTP.
pub trait IssueTracker {
    async fn create_issue(&self, issue: &CandidateIssue) -> Result<()>;
    async fn update_issue(&self, number: u64, issue: &CandidateIssue) -> Result<()>;
    async fn close_issue(&self, number: u64) -> Result<()>;
}

pub struct GithubClient {
    client: reqwest::Client,
    repo: String,
    token: String,
}

impl GithubClient {
    pub fn new(repo: &str, token: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(API_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            repo: repo.to_string(),
            token: token.to_string(),
        })
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Accept", "application/vnd.github+json")
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", USER_AGENT)
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    async fn checked(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let error_body = resp.text().await.unwrap_or_default();
        if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&error_body) {
            let detail = api_error
                .errors
                .first()
                .and_then(|e| e.message.clone())
                .unwrap_or_default();
            let msg = if detail.is_empty() {
                api_error.message
            } else {
                format!("{}: {}", api_error.message, detail)
            };
            return Err(anyhow!("GitHub API error during {}: {}", what, msg));
        }

        Err(anyhow!(
            "GitHub API error ({}) during {}: {}",
            status,
            what,
            sanitize_error_body(&error_body)
        ))
    }

    /// All currently open issues in this tool's namespace whose title encodes
    /// the given branch. Paginates fully; an empty result is fine.
    pub async fn open_issues(&self, branch: &str) -> Result<Vec<CandidateIssue>> {
        let mut issues = Vec::new();
        let mut page = 1usize;

        loop {
            let url = format!(
                "{}/repos/{}/issues?per_page={}&state=open&page={}",
                API_ROOT, self.repo, PAGE_SIZE, page
            );
            let resp = self
                .request(reqwest::Method::GET, &url)
                .send()
                .await
                .context("Failed to fetch tracker issues")?;
            let resp = Self::checked(resp, "issue listing").await?;
            let dtos: Vec<IssueDto> = resp
                .json()
                .await
                .context("Failed to parse tracker issue listing")?;

            let page_len = dtos.len();
            issues.extend(
                dtos.into_iter()
                    .filter_map(to_candidate)
                    .filter(|candidate| candidate.branch == branch),
            );

            if page_len < PAGE_SIZE {
                return Ok(issues);
            }
            page += 1;
        }
    }

    /// Logins allowed as assignees. Paginates fully.
    pub async fn collaborators(&self) -> Result<HashSet<String>> {
        let mut logins = HashSet::new();
        let mut page = 1usize;

        loop {
            let url = format!(
                "{}/repos/{}/collaborators?per_page={}&page={}",
                API_ROOT, self.repo, PAGE_SIZE, page
            );
            let resp = self
                .request(reqwest::Method::GET, &url)
                .send()
                .await
                .context("Failed to fetch collaborators")?;
            let resp = Self::checked(resp, "collaborator listing").await?;
            let dtos: Vec<CollaboratorDto> = resp
                .json()
                .await
                .context("Failed to parse collaborator listing")?;

            let page_len = dtos.len();
            logins.extend(dtos.into_iter().map(|dto| dto.login));

            if page_len < PAGE_SIZE {
                return Ok(logins);
            }
            page += 1;
        }
    }
}

impl IssueTracker for GithubClient {
    async fn create_issue(&self, issue: &CandidateIssue) -> Result<()> {
        let url = format!("{}/repos/{}/issues", API_ROOT, self.repo);
        let request = CreateIssueRequest {
            title: &issue.title,
            body: &issue.body,
            labels: &issue.labels,
            assignees: &issue.assignees,
        };

        let resp = self
            .request(reqwest::Method::POST, &url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to create issue '{}'", issue.title))?;
        Self::checked(resp, "issue creation").await?;
        Ok(())
    }

    /// Carries the local candidate's fields and forces state back to open,
    /// guarding against a manual close of an issue still detected.
    async fn update_issue(&self, number: u64, issue: &CandidateIssue) -> Result<()> {
        let url = format!("{}/repos/{}/issues/{}", API_ROOT, self.repo, number);
        let request = UpdateIssueRequest {
            title: &issue.title,
            body: &issue.body,
            labels: &issue.labels,
            assignees: &issue.assignees,
            state: "open",
        };

        let resp = self
            .request(reqwest::Method::PATCH, &url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to update issue #{}", number))?;
        Self::checked(resp, "issue update").await?;
        Ok(())
    }

    async fn close_issue(&self, number: u64) -> Result<()> {
        let url = format!("{}/repos/{}/issues/{}", API_ROOT, self.repo, number);
        let request = CloseIssueRequest { state: "closed" };

        let resp = self
            .request(reqwest::Method::PATCH, &url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to close issue #{}", number))?;
        Self::checked(resp, "issue close").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue_json(title: &str, labels: &[&str], state: &str, pr: bool) -> String {
        let labels: Vec<String> = labels.iter().map(|l| format!(r#"{{"name":"{}"}}"#, l)).collect();
        let pr_field = if pr { r#","pull_request":{}"# } else { "" };
        format!(
            r#"{{"number":7,"title":"{}","body":"b","state":"{}","labels":[{}],"assignees":[{{"login":"alice"}}]{}}}"#,
            title,
            state,
            labels.join(","),
            pr_field
        )
    }

    #[test]
    fn test_to_candidate_accepts_marked_open_issue() {
        let json = issue_json("[E1101][main] No member error in a.py", &["autolint", "error"], "open", false);
        let dto: IssueDto = serde_json::from_str(&json).unwrap();
        let candidate = to_candidate(dto).unwrap();
        assert_eq!(candidate.number, Some(7));
        assert_eq!(candidate.branch, "main");
        assert_eq!(candidate.origin, Origin::Remote);
        assert_eq!(candidate.assignees, ["alice"]);
    }

    #[test]
    fn test_to_candidate_rejects_pull_requests() {
        let json = issue_json("[E1101][main] t", &["autolint"], "open", true);
        let dto: IssueDto = serde_json::from_str(&json).unwrap();
        assert!(to_candidate(dto).is_none());
    }

    #[test]
    fn test_to_candidate_rejects_closed_issues() {
        let json = issue_json("[E1101][main] t", &["autolint"], "closed", false);
        let dto: IssueDto = serde_json::from_str(&json).unwrap();
        assert!(to_candidate(dto).is_none());
    }

    #[test]
    fn test_to_candidate_rejects_unmarked_issues() {
        let json = issue_json("[E1101][main] t", &["bug"], "open", false);
        let dto: IssueDto = serde_json::from_str(&json).unwrap();
        assert!(to_candidate(dto).is_none());
    }

    #[test]
    fn test_to_candidate_handles_null_body_and_foreign_title() {
        let json = r#"{"number":3,"title":"hand-filed","body":null,"state":"open","labels":[{"name":"autolint"}],"assignees":[]}"#;
        let dto: IssueDto = serde_json::from_str(json).unwrap();
        let candidate = to_candidate(dto).unwrap();
        assert_eq!(candidate.body, "");
        assert_eq!(candidate.branch, "", "unencoded titles match no branch");
    }

    #[test]
    fn test_create_request_serialization() {
        let labels = vec!["autolint".to_string(), "error".to_string()];
        let assignees = vec!["alice".to_string()];
        let request = CreateIssueRequest {
            title: "t",
            body: "b",
            labels: &labels,
            assignees: &assignees,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""title":"t""#));
        assert!(json.contains(r#""labels":["autolint","error"]"#));
        assert!(json.contains(r#""assignees":["alice"]"#));
        assert!(!json.contains("state"));
    }

    #[test]
    fn test_update_request_forces_open() {
        let request = UpdateIssueRequest {
            title: "t",
            body: "b",
            labels: &[],
            assignees: &[],
            state: "open",
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""state":"open""#));
    }

    #[test]
    fn test_parse_api_error_response() {
        let json = r#"{"message": "Validation Failed", "errors": [{"message": "label too long"}]}"#;
        let parsed: ApiErrorResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.message, "Validation Failed");
        assert_eq!(parsed.errors[0].message, Some("label too long".to_string()));
    }

    #[test]
    fn test_sanitize_error_body_truncates() {
        let long = "x".repeat(500);
        let sanitized = sanitize_error_body(&long);
        assert!(sanitized.len() < 500);
        assert!(sanitized.ends_with("(truncated)"));
    }

    #[test]
    fn test_sanitize_error_body_truncates_multibyte_on_char_boundary() {
        // A multi-byte character straddling the truncation index must not
        // panic the error path.
        let body = format!("{}€ and then some", "x".repeat(199));
        let sanitized = sanitize_error_body(&body);
        assert!(sanitized.ends_with("(truncated)"));
        assert!(sanitized.starts_with(&"x".repeat(199)));
        assert!(!sanitized.contains('€'));
    }

    #[test]
    fn test_sanitize_error_body_redacts_secrets() {
        let sanitized = sanitize_error_body("bad credentials for ghp_abcdef");
        assert!(!sanitized.contains("ghp_"));
    }
}
