//! Three-way reconciliation between this run's candidate issues and the
//! tracker's open-issue state.
//!
//! Planning is pure; applying is a sequence of independent API calls with no
//! rollback. A failed mutation is logged and skipped, and the next run
//! self-heals because the equality short-circuit re-detects the mismatch.

use std::collections::BTreeMap;

use crate::github::IssueTracker;
use crate::issue::CandidateIssue;

/// Decisions keyed by identity title, in deterministic title order.
#[derive(Debug, Default)]
pub struct ReconcilePlan {
    pub creates: Vec<CandidateIssue>,
    pub updates: Vec<(u64, CandidateIssue)>,
    pub closes: Vec<(u64, String)>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty() && self.closes.is_empty()
    }
}

/// Classifies every title present in either set:
/// local-only → create; remote-only → close, but only for the active branch;
/// both → update only when content differs.
pub fn plan(
    local: Vec<CandidateIssue>,
    remote: Vec<CandidateIssue>,
    branch: &str,
) -> ReconcilePlan {
    let mut pairs: BTreeMap<String, (Option<CandidateIssue>, Option<CandidateIssue>)> =
        BTreeMap::new();

    // Identity collisions among local candidates are last-write-wins.
    for candidate in local {
        let title = candidate.title.clone();
        pairs.entry(title).or_default().0 = Some(candidate);
    }
    for candidate in remote {
        let title = candidate.title.clone();
        pairs.entry(title).or_default().1 = Some(candidate);
    }

    let mut plan = ReconcilePlan::default();
    for (_, pair) in pairs {
        match pair {
            (Some(local), None) => plan.creates.push(local),
            (None, Some(remote)) => {
                // Another branch's issue is never closed by this run.
                if remote.branch == branch {
                    if let Some(number) = remote.number {
                        plan.closes.push((number, remote.title));
                    }
                }
            }
            (Some(local), Some(remote)) => {
                if !local.same_content(&remote) {
                    if let Some(number) = remote.number {
                        plan.updates.push((number, local));
                    }
                }
            }
            (None, None) => {}
        }
    }

    plan
}

/// Applies the plan one call at a time. Returns the count of successful
/// creates + updates; closes are performed but never counted.
pub async fn apply<T: IssueTracker>(plan: &ReconcilePlan, tracker: &T) -> usize {
    let mut changes = 0usize;

    for issue in &plan.creates {
        match tracker.create_issue(issue).await {
            Ok(()) => {
                eprintln!("  + created '{}'", issue.title);
                changes += 1;
            }
            Err(err) => eprintln!("  ! create failed for '{}': {:#}", issue.title, err),
        }
    }

    for (number, issue) in &plan.updates {
        match tracker.update_issue(*number, issue).await {
            Ok(()) => {
                eprintln!("  ~ updated #{} '{}'", number, issue.title);
                changes += 1;
            }
            Err(err) => eprintln!("  ! update failed for #{}: {:#}", number, err),
        }
    }

    for (number, title) in &plan.closes {
        match tracker.close_issue(*number).await {
            Ok(()) => eprintln!("  - closed #{} '{}'", number, title),
            Err(err) => eprintln!("  ! close failed for #{}: {:#}", number, err),
        }
    }

    changes
}
