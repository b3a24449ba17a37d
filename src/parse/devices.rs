//! Devices transcript parsing. Rows are whitespace-split with at least
//! five fields; the disk name is last and may contain spaces, so it
//! consumes every remaining token.

use crate::core::models::DeviceInfo;

pub fn parse(text: &str) -> Vec<DeviceInfo> {
    let mut devices = Vec::new();

    for line in text.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 5 {
            continue;
        }
        // device numbers are `major:minor` pairs
        if !tokens[0].contains(':') || !tokens[2].contains(':') {
            continue;
        }

        devices.push(DeviceInfo {
            major_minor: tokens[0].to_string(),
            device: tokens[1].to_string(),
            part_major_minor: tokens[2].to_string(),
            partition: tokens[3].to_string(),
            disk_name: tokens[4..].join(" "),
        });
    }

    devices
}
