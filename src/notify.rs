//! Chat notification for runs that changed the tracker.

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::time::Duration;

use crate::diagnostic::CategoryCounts;

const WEBHOOK_TIMEOUT_SECS: u64 = 30;

#[derive(Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
}

/// Human-readable summary for the chat channel.
pub fn summary_message(repo: &str, branch: &str, changes: usize, counts: &CategoryCounts) -> String {
    format!(
        "lintwarden: {} issue(s) created or updated on {} ({}) | {} finding(s), {} introduced by this change | {}",
        changes,
        repo,
        branch,
        counts.totals.total(),
        counts.totals.new,
        chrono::Utc::now().format("%Y-%m-%d %H:%M UTC")
    )
}

/// Posts the message as JSON to the configured webhook.
pub async fn notify(webhook_url: &str, message: &str) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(WEBHOOK_TIMEOUT_SECS))
        .build()
        .context("Failed to create HTTP client")?;

    let resp = client
        .post(webhook_url)
        .json(&WebhookPayload { text: message })
        .send()
        .await
        .context("Failed to post notification")?;

    if !resp.status().is_success() {
        return Err(anyhow!("Notification webhook returned {}", resp.status()));
    }
    Ok(())
}
