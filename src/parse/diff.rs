//! Diff transcript parsing: per-file change lines plus the category
//! summary counts. Verb abbreviations vary across releases and are
//! normalized to the full category names.

use regex::Regex;

use crate::core::models::{DiffFileInfo, DiffReport, DiffStatus};

fn verb_status(verb: &str) -> Option<DiffStatus> {
    match verb {
        "add" | "added" => Some(DiffStatus::Added),
        "rem" | "remove" | "removed" => Some(DiffStatus::Removed),
        "upd" | "update" | "updated" => Some(DiffStatus::Updated),
        "move" | "moved" => Some(DiffStatus::Moved),
        "copy" | "copied" => Some(DiffStatus::Copied),
        "restore" | "restored" => Some(DiffStatus::Restored),
        "equal" => Some(DiffStatus::Equal),
        _ => None,
    }
}

pub fn parse(text: &str) -> DiffReport {
    let summary_re =
        Regex::new(r"^\s*(\d+)\s+(equal|added|removed|updated|moved|copied|restored)\b").unwrap();

    let mut report = DiffReport {
        raw_output: text.to_string(),
        ..Default::default()
    };

    for line in text.lines() {
        if let Some(caps) = summary_re.captures(line) {
            let count: u64 = caps[1].parse().unwrap_or(0);
            match &caps[2] {
                "equal" => report.equal_files = count,
                "added" => report.added_files = count,
                "removed" => report.removed_files = count,
                "updated" => report.updated_files = count,
                "moved" => report.moved_files = count,
                "copied" => report.copied_files = count,
                "restored" => report.restored_files = count,
                _ => {}
            }
            continue;
        }

        // File lines are `<verb> <path>`; anything else is noise.
        let Some((verb, path)) = line.split_once(char::is_whitespace) else {
            continue;
        };
        let path = path.trim();
        if path.is_empty() {
            continue;
        }
        if let Some(status) = verb_status(verb) {
            report.files.push(DiffFileInfo {
                file_path: path.to_string(),
                status,
            });
        }
    }

    report.total_files = report.equal_files
        + report.added_files
        + report.removed_files
        + report.updated_files
        + report.moved_files
        + report.copied_files
        + report.restored_files;

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIFF_OUTPUT: &str = "\
Loading state from /var/snapraid/snapraid.content...
Comparing...
add d1/photos/2024/img_0001.jpg
upd d1/notes.txt
rem d2/old/backup.tar
move d2/movies/film.mkv

      96 equal
       1 added
       1 removed
       1 updated
       1 moved
       0 copied
       0 restored
There are differences!
";

    #[test]
    fn file_verbs_are_normalized() {
        let report = parse(DIFF_OUTPUT);
        assert_eq!(report.files.len(), 4);
        assert_eq!(report.files[0].status, DiffStatus::Added);
        assert_eq!(report.files[0].file_path, "d1/photos/2024/img_0001.jpg");
        assert_eq!(report.files[1].status, DiffStatus::Updated);
        assert_eq!(report.files[2].status, DiffStatus::Removed);
        assert_eq!(report.files[3].status, DiffStatus::Moved);
    }

    #[test]
    fn total_is_sum_of_all_seven_categories() {
        let report = parse(DIFF_OUTPUT);
        assert_eq!(report.equal_files, 96);
        assert_eq!(report.added_files, 1);
        assert_eq!(
            report.total_files,
            report.equal_files
                + report.added_files
                + report.removed_files
                + report.updated_files
                + report.moved_files
                + report.copied_files
                + report.restored_files
        );
        assert_eq!(report.total_files, 100);
    }

    #[test]
    fn paths_with_spaces_survive() {
        let report = parse("add d1/My Documents/tax return.pdf\n");
        assert_eq!(report.files[0].file_path, "d1/My Documents/tax return.pdf");
    }

    #[test]
    fn totality_on_garbage() {
        for input in ["", "add", "123", "add \n\n\n", "\u{0}"] {
            let report = parse(input);
            assert_eq!(report.raw_output, input);
            assert!(report.files.is_empty());
        }
    }
}
