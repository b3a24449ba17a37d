//! List transcript parsing: one row per tracked file plus the trailing
//! file/byte/link summaries.

use regex::Regex;

use crate::core::models::{ListReport, SnapRaidFileInfo};

pub fn parse(text: &str) -> ListReport {
    let row_re =
        Regex::new(r"^\s*([\d,]+)\s+(\d{4}/\d{2}/\d{2})\s+(\d{2}:\d{2})\s+(.+)$").unwrap();
    let files_re = Regex::new(r"(\d+)\s+files,\s+for\s+(\d+)\s+bytes").unwrap();
    let links_re = Regex::new(r"(\d+)\s+links").unwrap();

    let mut report = ListReport::default();

    for line in text.lines() {
        if let Some(caps) = row_re.captures(line) {
            let Ok(size) = caps[1].replace(',', "").parse() else {
                continue;
            };
            report.files.push(SnapRaidFileInfo {
                size,
                date: caps[2].to_string(),
                time: caps[3].to_string(),
                name: caps[4].trim().to_string(),
            });
            continue;
        }

        if let Some(caps) = files_re.captures(line) {
            report.total_files = caps[1].parse().ok();
            report.total_bytes = caps[2].parse().ok();
            continue;
        }

        if let Some(caps) = links_re.captures(line) {
            report.link_count = caps[1].parse().ok();
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST_OUTPUT: &str = "\
Self test...
Loading state from /var/snapraid/snapraid.content...
    12345 2024/03/01 09:15 d1/photos/img_0001.jpg
  2097152 2023/12/24 23:59 d1/video/holiday clip.mp4
Listing...
      42 files, for 2109497 bytes
       3 links
";

    #[test]
    fn rows_carry_size_date_time_name() {
        let report = parse(LIST_OUTPUT);
        assert_eq!(report.files.len(), 2);

        let first = &report.files[0];
        assert_eq!(first.size, 12345);
        assert_eq!(first.date, "2024/03/01");
        assert_eq!(first.time, "09:15");
        assert_eq!(first.name, "d1/photos/img_0001.jpg");

        // names keep embedded spaces
        assert_eq!(report.files[1].name, "d1/video/holiday clip.mp4");
    }

    #[test]
    fn summaries_are_read_from_count_lines() {
        let report = parse(LIST_OUTPUT);
        assert_eq!(report.total_files, Some(42));
        assert_eq!(report.total_bytes, Some(2109497));
        assert_eq!(report.link_count, Some(3));
    }

    #[test]
    fn totality_on_garbage() {
        for input in ["", "1 files", "9999 99/99/99 99:99", "\u{0}abc"] {
            let report = parse(input);
            assert!(report.files.is_empty());
        }
    }
}
