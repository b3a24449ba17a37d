//! Status/diff transcript parsing.
//!
//! SnapRAID has shipped two status output dialects: the legacy
//! column-aligned report (disk table, prose sentences, ASCII scrub chart)
//! and the newer `key:value` form where every fact is a `summary:` or
//! `scrub_history:` keyed line. Both reduce to the same [`SnapRaidStatus`]
//! shape. The dialect is detected from the transcript itself; the two
//! marker sets do not overlap.

use regex::Regex;
use std::collections::BTreeMap;

use super::{bytes_to_gb, count_token, gb_token, percent_token};
use crate::core::models::{DiskStatusInfo, ScrubHistoryPoint, SnapRaidStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Legacy,
    Structured,
}

/// Any `summary:`-keyed line selects the structured strategy.
pub fn detect_dialect(text: &str) -> Dialect {
    if text
        .lines()
        .any(|l| l.trim_start().starts_with("summary:"))
    {
        Dialect::Structured
    } else {
        Dialect::Legacy
    }
}

/// Parse a `status` or `diff` transcript, whichever dialect it is in.
pub fn parse(text: &str) -> SnapRaidStatus {
    match detect_dialect(text) {
        Dialect::Structured => parse_structured(text),
        Dialect::Legacy => parse_legacy(text),
    }
}

/// Disk table walk: header row opens the table, the dashed separator ends
/// it, and the first row after the separator is the totals row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableState {
    Outside,
    InTable,
    AfterSeparator,
    Done,
}

pub(crate) fn parse_legacy(text: &str) -> SnapRaidStatus {
    let mut status = SnapRaidStatus {
        raw_output: text.to_string(),
        ..Default::default()
    };

    let diff_re = Regex::new(r"^\s*(\d+)\s+(equal|added|removed|updated|moved|copied|restored)\b")
        .unwrap();
    let scrub_age_re = Regex::new(
        r"oldest block was scrubbed (\d+) days? ago, the median (\d+), the newest (\d+)",
    )
    .unwrap();
    let scrub_pct_re = Regex::new(r"(\d+)%\s+of the array is (not )?scrubbed").unwrap();

    let mut table = TableState::Outside;

    for line in text.lines() {
        match table {
            TableState::Outside => {
                if line.contains("Files") && line.contains("Fragmented") && line.contains("Wasted")
                {
                    table = TableState::InTable;
                    continue;
                }
            }
            TableState::InTable => {
                if is_separator(line) {
                    table = TableState::AfterSeparator;
                    continue;
                }
                if let Some(disk) = parse_disk_row(line) {
                    status.disks.push(disk);
                    continue;
                }
            }
            TableState::AfterSeparator => {
                if line.trim().is_empty() {
                    continue;
                }
                if let Some(totals) = parse_totals_row(line) {
                    status.total_files = Some(totals.files);
                    status.fragmented_files = Some(totals.fragmented_files);
                    status.wasted_gb = Some(totals.wasted_gb);
                    status.total_used_gb = Some(totals.used_gb);
                    status.total_free_gb = Some(totals.free_gb);
                    status.free_space_gb = Some(totals.free_gb);
                }
                table = TableState::Done;
                continue;
            }
            TableState::Done => {}
        }

        if let Some(caps) = diff_re.captures(line) {
            let count: u64 = caps[1].parse().unwrap_or(0);
            match &caps[2] {
                "equal" => status.equal_files = Some(count),
                "added" => status.new_files = count,
                "removed" => status.deleted_files = count,
                "updated" => status.modified_files = count,
                "moved" => status.moved_files = Some(count),
                "copied" => status.copied_files = Some(count),
                "restored" => status.restored_files = Some(count),
                _ => {}
            }
        }
    }

    if let Some(caps) = scrub_age_re.captures(text) {
        status.oldest_scrub_days = caps[1].parse().ok();
        status.median_scrub_days = caps[2].parse().ok();
        status.newest_scrub_days = caps[3].parse().ok();
    }

    if let Some(caps) = scrub_pct_re.captures(text) {
        if let Ok(pct) = caps[1].parse::<u8>() {
            let pct = pct.min(100);
            status.scrub_percentage = Some(if caps.get(2).is_some() { 100 - pct } else { pct });
        }
    }

    status.scrub_history = parse_scrub_chart(
        text,
        status.oldest_scrub_days.unwrap_or(0),
        status.newest_scrub_days.unwrap_or(0),
    );

    status.sync_in_progress = sync_in_progress(text);
    status.has_errors = has_error_keywords(text);
    status.parity_up_to_date = legacy_parity_up_to_date(&status, text);

    status
}

fn is_separator(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= 5 && trimmed.chars().all(|c| c == '-')
}

/// A disk row is seven numeric columns (counts, GB, use%) and a trailing
/// name that may itself contain spaces. The continuation header line fails
/// the numeric checks and falls through.
fn parse_disk_row(line: &str) -> Option<DiskStatusInfo> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 8 {
        return None;
    }

    Some(DiskStatusInfo {
        files: count_token(tokens[0])?,
        fragmented_files: count_token(tokens[1])?,
        excess_fragments: count_token(tokens[2])?,
        wasted_gb: gb_token(tokens[3])?,
        used_gb: gb_token(tokens[4])?,
        free_gb: gb_token(tokens[5])?,
        use_percent: percent_token(tokens[6])?,
        name: tokens[7..].join(" "),
    })
}

fn parse_totals_row(line: &str) -> Option<DiskStatusInfo> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 7 {
        return None;
    }

    Some(DiskStatusInfo {
        files: count_token(tokens[0])?,
        fragmented_files: count_token(tokens[1])?,
        excess_fragments: count_token(tokens[2])?,
        wasted_gb: gb_token(tokens[3])?,
        used_gb: gb_token(tokens[4])?,
        free_gb: gb_token(tokens[5])?,
        use_percent: percent_token(tokens[6])?,
        name: String::new(),
    })
}

/// Scrub chart rows are `<marks> | <pct>%`: `o` marks left of the pivot,
/// the percentage label right of it. Mark position interpolates linearly
/// between the oldest (leftmost) and newest scrub day.
fn parse_scrub_chart(text: &str, oldest_days: u32, newest_days: u32) -> Vec<ScrubHistoryPoint> {
    let row_re = Regex::new(r"^([ o]*o[ o]*)\|\s*(\d+)%").unwrap();
    let mut points = Vec::new();

    for line in text.lines() {
        let Some(caps) = row_re.captures(line) else {
            continue;
        };
        let marks = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let Ok(percentage) = caps[2].parse::<u32>() else {
            continue;
        };

        let span = marks.len().saturating_sub(1).max(1) as f64;
        for (pos, ch) in marks.chars().enumerate() {
            if ch != 'o' {
                continue;
            }
            let rel = pos as f64 / span;
            let days_ago =
                ((1.0 - rel) * oldest_days as f64 + rel * newest_days as f64).round() as u32;
            points.push(ScrubHistoryPoint {
                days_ago,
                percentage,
            });
        }
    }

    points
}

fn sync_in_progress(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("sync is in progress") && !lower.contains("no sync is in progress")
}

fn has_error_keywords(text: &str) -> bool {
    text.lines().any(|line| {
        let lower = line.to_lowercase();
        if lower.contains("no error detected") {
            return false;
        }
        lower.contains("error") || lower.contains("warning") || lower.contains("bad blocks")
    })
}

const PARITY_OK_PHRASES: &[&str] = &[
    "no error detected",
    "everything is up to date",
    "no differences",
    "nothing to do",
    "the array is fully synced",
];

fn legacy_parity_up_to_date(status: &SnapRaidStatus, text: &str) -> bool {
    let delta = status.new_files
        + status.modified_files
        + status.deleted_files
        + status.moved_files.unwrap_or(0)
        + status.copied_files.unwrap_or(0)
        + status.restored_files.unwrap_or(0);
    if delta > 0 {
        return false;
    }

    let lower = text.to_lowercase();
    PARITY_OK_PHRASES.iter().any(|p| lower.contains(p))
}

/// Known per-disk property prefixes of `summary:disk_<prop>_<name>` keys,
/// longest first so disk names may contain underscores.
const DISK_PROPS: &[&str] = &[
    "fragmented_file_count_",
    "excess_fragment_count_",
    "file_count_",
    "space_wasted_",
    "use_percent_",
    "used_",
    "free_",
];

pub(crate) fn parse_structured(text: &str) -> SnapRaidStatus {
    let mut status = SnapRaidStatus {
        raw_output: text.to_string(),
        ..Default::default()
    };

    let mut disks: Vec<DiskStatusInfo> = Vec::new();
    let mut history: BTreeMap<u32, f64> = BTreeMap::new();
    let mut has_bad: Option<String> = None;
    let mut has_unsynced: Option<String> = None;
    let mut sync_flag = false;

    for line in text.lines() {
        let line = line.trim();

        // has_bad values contain colons themselves, so the last-colon rule
        // cannot split them; match the key as a prefix instead.
        if let Some(rest) = line.strip_prefix("summary:has_bad:") {
            has_bad = Some(rest.trim().to_string());
            continue;
        }

        // Value is everything after the last colon; keys carry colons.
        let Some((key, value)) = line.rsplit_once(':') else {
            continue;
        };
        let value = value.trim();

        if let Some(day) = key.strip_prefix("scrub_history:") {
            // Sub-day buckets collapse into integer days; same-day samples sum.
            let (Ok(day), Ok(pct)) = (day.parse::<f64>(), value.parse::<f64>()) else {
                continue;
            };
            if day < 0.0 || !day.is_finite() {
                continue;
            }
            *history.entry(day.round() as u32).or_insert(0.0) += pct;
            continue;
        }

        let Some(prop) = key.strip_prefix("summary:") else {
            continue;
        };

        if let Some(disk_prop) = prop.strip_prefix("disk_") {
            apply_disk_prop(&mut disks, disk_prop, value);
            continue;
        }

        match prop {
            "file_count" => status.total_files = value.parse().ok(),
            "fragmented_file_count" => status.fragmented_files = value.parse().ok(),
            "space_wasted" => {
                status.wasted_gb = value.parse::<f64>().ok().map(bytes_to_gb);
            }
            "used" => {
                status.total_used_gb = value.parse::<f64>().ok().map(bytes_to_gb);
            }
            "free" => {
                let gb = value.parse::<f64>().ok().map(bytes_to_gb);
                status.total_free_gb = gb;
                status.free_space_gb = gb;
            }
            "has_unsynced" => has_unsynced = Some(value.to_string()),
            "sync_in_progress" => sync_flag = value != "0",
            _ => {}
        }
    }

    status.disks = disks;

    if !history.is_empty() {
        let days: Vec<u32> = history.keys().copied().collect();
        status.newest_scrub_days = days.first().copied();
        status.oldest_scrub_days = days.last().copied();
        status.median_scrub_days = Some(days[days.len() / 2]);

        let total: f64 = history.values().sum();
        status.scrub_percentage = Some(total.round().clamp(0.0, 100.0) as u8);

        status.scrub_history = history
            .into_iter()
            .map(|(days_ago, pct)| ScrubHistoryPoint {
                days_ago,
                percentage: pct.round() as u32,
            })
            .collect();
    }

    status.sync_in_progress = sync_flag || sync_in_progress(text);
    status.has_errors = has_bad.map(|v| v != "0:0:0").unwrap_or(false);
    status.parity_up_to_date =
        has_unsynced.as_deref() == Some("0") && !status.sync_in_progress;

    status
}

fn apply_disk_prop(disks: &mut Vec<DiskStatusInfo>, disk_prop: &str, value: &str) {
    for prefix in DISK_PROPS {
        let Some(name) = disk_prop.strip_prefix(prefix) else {
            continue;
        };
        if name.is_empty() {
            return;
        }

        let disk = match disks.iter_mut().find(|d| d.name == name) {
            Some(d) => d,
            None => {
                disks.push(DiskStatusInfo {
                    name: name.to_string(),
                    ..Default::default()
                });
                disks.last_mut().expect("just pushed")
            }
        };

        match *prefix {
            "file_count_" => disk.files = value.parse().unwrap_or(0),
            "fragmented_file_count_" => disk.fragmented_files = value.parse().unwrap_or(0),
            "excess_fragment_count_" => disk.excess_fragments = value.parse().unwrap_or(0),
            "space_wasted_" => {
                disk.wasted_gb = value.parse::<f64>().map(bytes_to_gb).unwrap_or(0.0)
            }
            "used_" => disk.used_gb = value.parse::<f64>().map(bytes_to_gb).unwrap_or(0.0),
            "free_" => disk.free_gb = value.parse::<f64>().map(bytes_to_gb).unwrap_or(0.0),
            "use_percent_" => disk.use_percent = value.parse().unwrap_or(0),
            _ => {}
        }
        return;
    }
}
