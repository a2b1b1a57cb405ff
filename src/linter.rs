//! Invokes the analysis tool and aggregates its output into a [`RunReport`].
//!
//! One external pylint invocation per run, one blame invocation per path, one
//! forward pass over the path-sorted diagnostic stream.

use anyhow::{anyhow, Context, Result};
use std::path::Path;
use walkdir::WalkDir;

use crate::blame::{BlameAttributor, BlameInfo};
use crate::diagnostic::{DiagnosticRecord, RawDiagnostic};
use crate::report::{FileReport, RunReport};
use crate::util::CommandRunner;

pub struct Linter {
    rcfile: Option<String>,
}

impl Linter {
    pub fn new(rcfile: Option<String>) -> Self {
        Self { rcfile }
    }

    /// Python sources under `root`, relative paths, sorted for a stable
    /// invocation order.
    pub fn discover_files(root: &Path) -> Vec<String> {
        let mut files: Vec<String> = WalkDir::new(root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "py"))
            .filter_map(|entry| {
                entry
                    .path()
                    .strip_prefix(root)
                    .ok()
                    .map(|p| p.to_string_lossy().into_owned())
            })
            .collect();
        files.sort();
        files
    }

    fn arguments(&self, files: &[String]) -> Vec<String> {
        let mut args = vec![
            "--output-format=json".to_string(),
            "--jobs=0".to_string(),
            "--persistent=n".to_string(),
            "--exit-zero".to_string(),
        ];
        if let Some(rcfile) = &self.rcfile {
            args.push(format!("--rcfile={}", rcfile));
        }
        args.extend(files.iter().cloned());
        args
    }

    /// Runs the tool over the given files and aggregates the diagnostics,
    /// attaching blame per line. Malformed tool or blame output aborts the
    /// run: a silently missing file's contribution would make reconciliation
    /// close issues that are still valid.
    pub fn run(
        &self,
        runner: &dyn CommandRunner,
        attributor: &BlameAttributor,
        files: &[String],
    ) -> Result<RunReport> {
        let mut run = RunReport::new();
        if files.is_empty() {
            return Ok(run);
        }

        let args = self.arguments(files);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = runner
            .run("pylint", &arg_refs)
            .context("Failed to run the analysis tool")?;

        let mut raw: Vec<RawDiagnostic> = serde_json::from_str(output.trim())
            .context("Analysis tool output was not the expected JSON record stream")?;
        // The tool already groups by path; a stable sort keeps its intra-file
        // order while guaranteeing the single-pass grouping below.
        raw.sort_by(|a, b| a.path.cmp(&b.path));

        let mut current: Option<FileReport> = None;
        let mut blame_lines: Vec<BlameInfo> = Vec::new();

        for diagnostic in raw {
            let switch = current
                .as_ref()
                .map_or(true, |file| file.path != diagnostic.path);
            if switch {
                if let Some(file) = current.take() {
                    finish_file(&mut run, file);
                }
                blame_lines = attributor.blame(&diagnostic.path)?;
                current = Some(FileReport::new(diagnostic.path.clone()));
            }

            let index = (diagnostic.line as usize)
                .checked_sub(1)
                .ok_or_else(|| anyhow!("Diagnostic with line 0 in {}", diagnostic.path))?;
            let info = blame_lines.get(index).cloned().ok_or_else(|| {
                anyhow!(
                    "Diagnostic line {} is outside the blamed range of {}",
                    diagnostic.line,
                    diagnostic.path
                )
            })?;

            if let Some(file) = current.as_mut() {
                file.push(DiagnosticRecord::new(diagnostic, info));
            }
        }

        if let Some(file) = current.take() {
            finish_file(&mut run, file);
        }

        for path in files {
            if !run.contains(path) {
                eprintln!("  ✓ {} (no issues found)", path);
            }
        }

        Ok(run)
    }
}

fn finish_file(run: &mut RunReport, file: FileReport) {
    eprintln!(
        "  × {} ({} issue(s) found)",
        file.path,
        file.counts.totals.total()
    );
    run.insert(file);
}
