//! SMART transcript parsing.
//!
//! The report is block-shaped: a header line (two colon-free tokens, disk
//! name and device) opens a block, a blank line closes it. Attribute lines
//! inside a block are scanned in any order. Disks without SMART data show
//! `-` for the device and no `/dev/` line ever appears, which leaves the
//! status UNKNOWN.

use regex::Regex;

use crate::core::models::{SmartDiskInfo, SmartStatus};

/// Explicit block walk: outside a disk block, or inside one accumulating
/// attributes.
enum BlockState {
    NoDisk,
    InDiskBlock(Block),
}

struct Block {
    info: SmartDiskInfo,
    saw_dev: bool,
    keyword: Option<SmartStatus>,
}

impl Block {
    fn open(name: &str, device: &str) -> Self {
        Self {
            info: SmartDiskInfo {
                name: name.to_string(),
                device: device.to_string(),
                status: SmartStatus::Unknown,
                temperature: None,
                power_on_hours: None,
                fail_probability: None,
                model: None,
                serial: None,
                capacity: None,
            },
            saw_dev: device.contains("/dev/"),
            keyword: None,
        }
    }

    fn close(mut self) -> SmartDiskInfo {
        self.info.status = self.keyword.unwrap_or(if self.saw_dev {
            SmartStatus::Ok
        } else {
            SmartStatus::Unknown
        });
        self.info
    }
}

fn header_tokens(line: &str) -> Option<(&str, &str)> {
    if line.contains(':') {
        return None;
    }
    let mut tokens = line.split_whitespace();
    let name = tokens.next()?;
    let device = tokens.next()?;
    if tokens.next().is_some() {
        return None;
    }
    Some((name, device))
}

fn failure_keyword(line: &str) -> Option<SmartStatus> {
    for token in line.split_whitespace() {
        match token {
            "PREFAIL" => return Some(SmartStatus::Prefail),
            "LOGFAIL" => return Some(SmartStatus::Logfail),
            "LOGERR" => return Some(SmartStatus::Logerr),
            "SELFERR" => return Some(SmartStatus::Selferr),
            "FAIL" => return Some(SmartStatus::Fail),
            _ => {}
        }
    }
    None
}

pub fn parse(text: &str) -> Vec<SmartDiskInfo> {
    let number_re = Regex::new(r"(-?\d+)").unwrap();
    let percent_re = Regex::new(r"(\d+)%").unwrap();

    let mut disks = Vec::new();
    let mut state = BlockState::NoDisk;

    for line in text.lines() {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            if let BlockState::InDiskBlock(block) = state {
                disks.push(block.close());
            }
            state = BlockState::NoDisk;
            continue;
        }

        if let Some((name, device)) = header_tokens(trimmed) {
            if let BlockState::InDiskBlock(block) = state {
                disks.push(block.close());
            }
            state = BlockState::InDiskBlock(Block::open(name, device));
            continue;
        }

        let BlockState::InDiskBlock(ref mut block) = state else {
            continue;
        };

        if trimmed.contains("/dev/") {
            block.saw_dev = true;
        }
        if block.keyword.is_none() {
            block.keyword = failure_keyword(trimmed);
        }

        let Some((key, value)) = trimmed.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();

        if key.contains("temperature") {
            block.info.temperature = number_re
                .captures(value)
                .and_then(|c| c[1].parse().ok());
        } else if key.contains("power") {
            block.info.power_on_hours = number_re
                .captures(value)
                .and_then(|c| c[1].parse().ok());
        } else if key.contains("probability") {
            block.info.fail_probability = percent_re
                .captures(value)
                .or_else(|| number_re.captures(value))
                .and_then(|c| c[1].parse().ok());
        } else if key.contains("model") {
            block.info.model = Some(value.to_string());
        } else if key.contains("serial") {
            block.info.serial = Some(value.to_string());
        } else if key.contains("capacity") || key.contains("size") {
            block.info.capacity = Some(value.to_string());
        }
    }

    if let BlockState::InDiskBlock(block) = state {
        disks.push(block.close());
    }

    disks
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMART_OUTPUT: &str = "\
d1 /dev/sda
Device Model: WDC WD40EFRX-68N32N0
Serial Number: WD-WCC7K1234567
Temperature: 33 C
Power On Hours: 11873
Fail Probability: 4%
Capacity: 4.0 TB

d2 /dev/sdb
Temperature: 41 C
Fail Probability: 97%
smartctl status: FAIL

parity -
no smart data available
";

    #[test]
    fn attributes_are_collected_per_block() {
        let disks = parse(SMART_OUTPUT);
        assert_eq!(disks.len(), 3);

        let d1 = &disks[0];
        assert_eq!(d1.name, "d1");
        assert_eq!(d1.device, "/dev/sda");
        assert_eq!(d1.status, SmartStatus::Ok);
        assert_eq!(d1.temperature, Some(33));
        assert_eq!(d1.power_on_hours, Some(11873));
        assert_eq!(d1.fail_probability, Some(4));
        assert_eq!(d1.model.as_deref(), Some("WDC WD40EFRX-68N32N0"));
        assert_eq!(d1.serial.as_deref(), Some("WD-WCC7K1234567"));
        assert_eq!(d1.capacity.as_deref(), Some("4.0 TB"));
    }

    #[test]
    fn failure_keyword_overrides_ok() {
        let disks = parse(SMART_OUTPUT);
        assert_eq!(disks[1].status, SmartStatus::Fail);
    }

    #[test]
    fn no_dev_line_means_unknown() {
        let disks = parse(SMART_OUTPUT);
        assert_eq!(disks[2].name, "parity");
        assert_eq!(disks[2].status, SmartStatus::Unknown);
    }

    #[test]
    fn prefail_is_not_mistaken_for_fail() {
        let disks = parse("d1 /dev/sda\nstatus word: PREFAIL\n");
        assert_eq!(disks[0].status, SmartStatus::Prefail);
    }

    #[test]
    fn attribute_order_does_not_matter() {
        let forward = parse("d1 /dev/sda\nTemperature: 30\nSerial Number: X1\n");
        let reversed = parse("d1 /dev/sda\nSerial Number: X1\nTemperature: 30\n");
        assert_eq!(forward, reversed);
    }

    #[test]
    fn totality_on_garbage() {
        for input in ["", "::::", "a b c d e f", "\u{0}"] {
            let _ = parse(input);
        }
    }
}
