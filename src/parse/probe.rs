//! Probe transcript parsing: one `<name> <device> <state>` row per disk,
//! state matched case-insensitively.

use crate::core::models::{PowerState, ProbeDiskInfo};

pub fn parse(text: &str) -> Vec<ProbeDiskInfo> {
    let mut disks = Vec::new();

    for line in text.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let &[name, device, state] = tokens.as_slice() else {
            continue;
        };
        let Some(status) = PowerState::from_str(state) else {
            continue;
        };
        disks.push(ProbeDiskInfo {
            name: name.to_string(),
            device: device.to_string(),
            status,
        });
    }

    disks
}
