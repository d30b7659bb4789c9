pub mod address;
pub mod claim;
pub mod info;
pub mod keygen;
pub mod scan;
pub mod send;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use stealthflow::StealthAnnouncement;

/// Read a JSON array of announcements; a missing file is an empty list
pub fn load_announcements(path: &Path) -> Result<Vec<StealthAnnouncement>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read announcements from {}", path.display()))?;
    serde_json::from_str(&json).context("Failed to parse announcements file")
}

pub fn save_announcements(path: &Path, announcements: &[StealthAnnouncement]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, serde_json::to_string_pretty(announcements)?)
        .with_context(|| format!("Failed to write announcements to {}", path.display()))
}
