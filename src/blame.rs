//! Per-line authorship attribution from git history.
//!
//! Blame is fetched once per path (`git blame --line-porcelain`) and sliced
//! into per-line blocks. A line is "new" when its revision falls inside the
//! commit range under review.

use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;

use crate::util::CommandRunner;

/// Ownership metadata for one source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlameInfo {
    pub sha: String,
    pub author: String,
    pub committer: String,
    pub summary: String,
    pub is_new: bool,
}

/// Maps (file, line) pairs to [`BlameInfo`] for the commit range under review.
pub struct BlameAttributor<'a> {
    runner: &'a dyn CommandRunner,
    /// Revisions from `after` back to (exclusive) `before`, newest first.
    focus: Vec<String>,
}

impl<'a> BlameAttributor<'a> {
    /// Computes the in-focus revision list once up front. Fails when either
    /// end of the commit range is unknown to the repository.
    pub fn new(runner: &'a dyn CommandRunner, before: &str, after: &str) -> Result<Self> {
        let log = runner
            .run("git", &["log", "--format=format:%H"])
            .context("Failed to list repository revisions")?;
        let shas: Vec<&str> = log.lines().collect();

        let start = shas
            .iter()
            .position(|sha| *sha == after)
            .ok_or_else(|| anyhow!("Revision '{}' not found in history", after))?;
        let end = shas
            .iter()
            .position(|sha| *sha == before)
            .ok_or_else(|| anyhow!("Revision '{}' not found in history", before))?;

        if end < start {
            return Err(anyhow!(
                "Commit range is inverted: '{}' is newer than '{}'",
                before,
                after
            ));
        }

        let focus = shas[start..end].iter().map(|s| s.to_string()).collect();
        Ok(Self { runner, focus })
    }

    pub fn focus(&self) -> &[String] {
        &self.focus
    }

    /// One [`BlameInfo`] per line, in line order. One external invocation per
    /// path; malformed output or a path unknown to history is fatal for that
    /// file's processing.
    pub fn blame(&self, path: &str) -> Result<Vec<BlameInfo>> {
        let porcelain = self
            .runner
            .run("git", &["blame", "--line-porcelain", "--", path])
            .with_context(|| format!("Failed to blame {}", path))?;

        parse_porcelain(&porcelain, &self.focus)
            .with_context(|| format!("Malformed blame output for {}", path))
    }
}

/// Slices line-porcelain output by its `filename ` boundary markers. Each
/// block is a header line, `key value` metadata lines, then the literal
/// source line.
fn parse_porcelain(porcelain: &str, focus: &[String]) -> Result<Vec<BlameInfo>> {
    let lines: Vec<&str> = porcelain.lines().collect();

    let endpoints: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.starts_with("filename "))
        .map(|(index, _)| index + 2)
        .collect();

    let mut infos = Vec::with_capacity(endpoints.len());
    let mut start = 0;
    for end in endpoints {
        if end > lines.len() {
            return Err(anyhow!("Blame block truncated before source line"));
        }
        infos.push(parse_block(&lines[start..end], focus)?);
        start = end;
    }

    Ok(infos)
}

fn parse_block(block: &[&str], focus: &[String]) -> Result<BlameInfo> {
    let (header, rest) = block
        .split_first()
        .ok_or_else(|| anyhow!("Empty blame block"))?;

    // Header: `<sha> <line-before> <line-after> [<group-count>]`
    let fields: Vec<&str> = header.split(' ').collect();
    if fields.len() != 3 && fields.len() != 4 {
        return Err(anyhow!("Unparsable blame header: '{}'", header));
    }
    let sha = fields[0].to_string();

    // Last line is the literal source line; everything between is metadata.
    let (_, metadata) = rest
        .split_last()
        .ok_or_else(|| anyhow!("Blame block for {} has no source line", sha))?;

    let lookup: HashMap<&str, &str> = metadata
        .iter()
        .map(|line| line.split_once(' ').unwrap_or((*line, "")))
        .collect();

    let field = |key: &str| -> Result<String> {
        lookup
            .get(key)
            .map(|value| value.to_string())
            .ok_or_else(|| anyhow!("Blame block for {} is missing '{}'", sha, key))
    };

    let is_new = focus.iter().any(|f| f == &sha);

    Ok(BlameInfo {
        author: field("author")?,
        committer: field("committer")?,
        summary: field("summary")?,
        sha,
        is_new,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct FakeRunner {
        log: String,
        blame: String,
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, _program: &str, args: &[&str]) -> Result<String> {
            match args.first() {
                Some(&"log") => Ok(self.log.clone()),
                Some(&"blame") => {
                    if self.blame.is_empty() {
                        Err(anyhow!("fatal: no such path"))
                    } else {
                        Ok(self.blame.clone())
                    }
                }
                other => Err(anyhow!("unexpected git invocation: {:?}", other)),
            }
        }
    }

    fn porcelain_block(sha: &str, line: u32, author: &str, code: &str) -> String {
        format!(
            "{sha} {line} {line} 1\n\
             author {author}\n\
             author-mail <{author}@example.com>\n\
             committer {author}\n\
             summary touch things\n\
             boundary\n\
             filename a.py\n\
             \t{code}\n"
        )
    }

    fn fake() -> FakeRunner {
        let log = "ccc\nbbb\naaa".to_string();
        let blame = format!(
            "{}{}",
            porcelain_block("ccc", 1, "alice", "import os"),
            porcelain_block("aaa", 2, "bob", "import sys"),
        );
        FakeRunner { log, blame }
    }

    #[test]
    fn test_focus_excludes_before_revision() {
        let runner = fake();
        let attributor = BlameAttributor::new(&runner, "aaa", "ccc").unwrap();
        assert_eq!(attributor.focus(), ["ccc".to_string(), "bbb".to_string()]);
    }

    #[test]
    fn test_unknown_revision_is_an_error() {
        let runner = fake();
        let err = BlameAttributor::new(&runner, "aaa", "zzz")
            .map(|_| ())
            .unwrap_err();
        assert!(err.to_string().contains("zzz"));
    }

    #[test]
    fn test_inverted_range_is_an_error() {
        let runner = fake();
        assert!(BlameAttributor::new(&runner, "ccc", "aaa").is_err());
    }

    #[test]
    fn test_blame_yields_one_info_per_line_in_order() {
        let runner = fake();
        let attributor = BlameAttributor::new(&runner, "aaa", "ccc").unwrap();
        let infos = attributor.blame("a.py").unwrap();

        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].author, "alice");
        assert_eq!(infos[0].sha, "ccc");
        assert!(infos[0].is_new);
        assert_eq!(infos[1].author, "bob");
        assert!(!infos[1].is_new, "revision before the range is not new");
    }

    #[test]
    fn test_blame_parses_committer_and_summary() {
        let runner = fake();
        let attributor = BlameAttributor::new(&runner, "aaa", "ccc").unwrap();
        let infos = attributor.blame("a.py").unwrap();
        assert_eq!(infos[0].committer, "alice");
        assert_eq!(infos[0].summary, "touch things");
    }

    #[test]
    fn test_missing_required_metadata_is_an_error() {
        let porcelain = "ccc 1 1 1\nauthor alice\nfilename a.py\n\tcode";
        let err = parse_porcelain(porcelain, &[]).unwrap_err();
        assert!(err.to_string().contains("committer"));
    }

    #[test]
    fn test_unparsable_header_is_an_error() {
        let porcelain = "garbage\nauthor alice\ncommitter alice\nsummary s\nfilename a.py\n\tcode";
        assert!(parse_porcelain(porcelain, &[]).is_err());
    }

    #[test]
    fn test_blame_failure_propagates() {
        let runner = FakeRunner {
            log: "ccc\naaa".into(),
            blame: String::new(),
        };
        let attributor = BlameAttributor::new(&runner, "aaa", "ccc").unwrap();
        assert!(attributor.blame("missing.py").is_err());
    }

    #[test]
    fn test_empty_blame_output_yields_no_lines() {
        let infos = parse_porcelain("", &[]).unwrap();
        assert!(infos.is_empty());
    }
}
