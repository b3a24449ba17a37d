//! Check/fix transcript parsing.
//!
//! `Missing file '<path>'.` reports span two lines: the classification
//! (recoverable or not) arrives on the line after. A pre-pass merges each
//! pair into one logical record so the main scan stays single-line.
//! Error totals come from the summary line when present; multi-line error
//! blocks make counting individual ERROR records unreliable.

use regex::Regex;
use std::collections::HashSet;

use crate::core::models::{CheckFileInfo, CheckReport, CheckStatus};

enum LogicalLine<'a> {
    Missing { path: &'a str, recoverable: bool },
    Plain(&'a str),
}

/// Merge `Missing file` reports with their trailing classification line.
fn merge_missing_lines<'a>(text: &'a str, missing_re: &Regex) -> Vec<LogicalLine<'a>> {
    let lines: Vec<&str> = text.lines().collect();
    let mut logical = Vec::with_capacity(lines.len());

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        if let Some(caps) = missing_re.captures(line) {
            let path = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            let next = lines.get(i + 1).copied().unwrap_or("");
            let lower = next.to_lowercase();
            if lower.contains("recoverable") {
                logical.push(LogicalLine::Missing {
                    path,
                    recoverable: !lower.contains("unrecoverable"),
                });
                // classification line is consumed with its report
                i += 2;
                continue;
            }
            logical.push(LogicalLine::Missing {
                path,
                recoverable: false,
            });
        } else {
            logical.push(LogicalLine::Plain(line));
        }
        i += 1;
    }

    logical
}

pub fn parse(text: &str) -> CheckReport {
    let missing_re = Regex::new(r"Missing file '([^']+)'").unwrap();
    let rehash_re = Regex::new(r"(?i)rehash\s+(.+)$").unwrap();
    let quoted_re = Regex::new(r"'([^']+)'").unwrap();
    let errors_summary_re = Regex::new(r"^\s*(\d+)\s+errors\b").unwrap();
    let files_summary_re = Regex::new(r"^\s*(\d+)\s+files\b").unwrap();

    let mut report = CheckReport {
        raw_output: text.to_string(),
        ..Default::default()
    };

    let mut seen: HashSet<String> = HashSet::new();
    let mut summary_errors: Option<u64> = None;
    let mut summary_files: Option<u64> = None;

    let mut push_unique = |report: &mut CheckReport, info: CheckFileInfo| {
        // first occurrence wins
        if seen.insert(info.file_path.clone()) {
            report.files.push(info);
        }
    };

    for logical in merge_missing_lines(text, &missing_re) {
        match logical {
            LogicalLine::Missing { path, recoverable } => {
                push_unique(
                    &mut report,
                    CheckFileInfo {
                        file_path: path.to_string(),
                        status: CheckStatus::Error,
                        recoverable: Some(recoverable),
                    },
                );
            }
            LogicalLine::Plain(line) => {
                if let Some(caps) = errors_summary_re.captures(line) {
                    summary_errors = caps[1].parse().ok();
                    continue;
                }
                if let Some(caps) = files_summary_re.captures(line) {
                    summary_files = caps[1].parse().ok();
                    continue;
                }

                let lower = line.to_lowercase();
                if lower.contains("rehash") {
                    let path = rehash_re
                        .captures(line)
                        .and_then(|c| c.get(1))
                        .map(|m| m.as_str().trim())
                        .unwrap_or_else(|| line.trim());
                    push_unique(
                        &mut report,
                        CheckFileInfo {
                            file_path: path.to_string(),
                            status: CheckStatus::Rehash,
                            recoverable: None,
                        },
                    );
                    continue;
                }

                // "errors" is the summary-line plural; skip it here to avoid
                // double counting.
                if lower.contains("error") && !lower.contains("errors") {
                    let path = quoted_re
                        .captures(line)
                        .and_then(|c| c.get(1))
                        .map(|m| m.as_str())
                        .unwrap_or_else(|| line.trim());
                    push_unique(
                        &mut report,
                        CheckFileInfo {
                            file_path: path.to_string(),
                            status: CheckStatus::Error,
                            recoverable: None,
                        },
                    );
                }
            }
        }
    }

    report.rehash_count = report
        .files
        .iter()
        .filter(|f| f.status == CheckStatus::Rehash)
        .count() as u64;

    // The summary is authoritative when present; the line scan can both
    // under- and over-count multi-line error blocks.
    report.error_count = summary_errors.unwrap_or_else(|| {
        report
            .files
            .iter()
            .filter(|f| f.status == CheckStatus::Error)
            .count() as u64
    });

    let parsed_total = summary_files.unwrap_or(report.files.len() as u64);
    report.ok_count = parsed_total.saturating_sub(report.error_count + report.rehash_count);
    report.total_files = report.error_count + report.rehash_count + report.ok_count;

    report
}
