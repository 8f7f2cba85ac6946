//! Boot Payload Store (§4.9): archives of the kernel/initramfs files a
//! bootloader entry points at, so that an entry created for an old
//! snapshot still boots after the live `/boot` files have moved on.
use crate::command::Context;
use crate::commands::{CommandCopyFile, CommandDiffFiles, CommandRemoveRecursive};
use crate::error::Result;
use chrono::NaiveDateTime;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[cfg(test)]
mod tests;

/// A single archived copy of the designated boot files, named by the
/// timestamp it was taken at (`YYYY-MM-DD_HH-MM-SS`, no period tags —
/// payloads are not subject to per-period retention themselves).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootPayloadSnapshot {
    pub path: PathBuf,
    pub name: String,
    pub timestamp: NaiveDateTime,
}

impl BootPayloadSnapshot {
    /// The path a bootloader entry should reference this payload's files
    /// under, relative to the ESP root (e.g. `/snapshots/2024-06-01_10-00-00`).
    pub fn bootloader_relative_path(&self) -> String {
        format!("/snapshots/{}", self.name)
    }
}

fn payload_name_regex() -> Regex {
    Regex::new(r"^(\d{4})-(\d{2})-(\d{2})_(\d{2})-(\d{2})-(\d{2})$").expect("payload name regex is a compile-time constant")
}

pub fn format_payload_name(timestamp: NaiveDateTime) -> String {
    timestamp.format("%Y-%m-%d_%H-%M-%S").to_string()
}

fn parse_payload_dir(parent: &Path, name: &str) -> Option<BootPayloadSnapshot> {
    let re = payload_name_regex();
    let caps = re.captures(name)?;
    let year: i32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let day: u32 = caps[3].parse().ok()?;
    let hour: u32 = caps[4].parse().ok()?;
    let minute: u32 = caps[5].parse().ok()?;
    let second: u32 = caps[6].parse().ok()?;
    let date = chrono::NaiveDate::from_ymd_opt(year, month, day)?;
    let timestamp = date.and_hms_opt(hour, minute, second)?;
    Some(BootPayloadSnapshot {
        path: parent.join(name),
        name: name.to_string(),
        timestamp,
    })
}

/// The payload that would be live for a snapshot taken at `timestamp`:
/// the most recent payload whose own timestamp doesn't postdate it.
pub fn resolve_for(payloads: &[BootPayloadSnapshot], timestamp: NaiveDateTime) -> Option<&BootPayloadSnapshot> {
    payloads.iter().filter(|p| p.timestamp <= timestamp).max_by_key(|p| p.timestamp)
}

pub struct BootPayloadStore<C> {
    boot_path: PathBuf,
    init_files: Option<Vec<String>>,
    payloads: Vec<BootPayloadSnapshot>,
    commander: C,
    context: Context,
}

impl<C> BootPayloadStore<C>
where
    C: CommandCopyFile + CommandDiffFiles + CommandRemoveRecursive,
{
    pub fn new(boot_path: impl Into<PathBuf>, init_files: Option<Vec<String>>, commander: C, context: Context) -> Self {
        BootPayloadStore {
            boot_path: boot_path.into(),
            init_files,
            payloads: Vec::new(),
            commander,
            context,
        }
    }

    pub fn payloads(&self) -> &[BootPayloadSnapshot] {
        &self.payloads
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.boot_path.join("snapshots")
    }

    /// Scans `<boot>/snapshots/` for existing payload directories (plain
    /// `std::fs`, per the filesystem-access boundary — this is a local
    /// directory listing, not a subvolume operation).
    pub fn list(&mut self) -> Result<()> {
        let dir = self.snapshots_dir();
        let mut payloads = Vec::new();
        if dir.is_dir() {
            for entry in std::fs::read_dir(&dir)? {
                let entry = entry?;
                if let Some(payload) = parse_payload_dir(&dir, &entry.file_name().to_string_lossy()) {
                    payloads.push(payload);
                }
            }
        }
        payloads.sort_by_key(|p| p.timestamp);
        self.payloads = payloads;
        Ok(())
    }

    fn init_file_names(&self) -> Result<Vec<String>> {
        if let Some(list) = &self.init_files {
            return Ok(list.clone());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.boot_path)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Archives the current designated boot files under a new payload
    /// directory stamped `timestamp`.
    pub fn create(&mut self, timestamp: NaiveDateTime) -> Result<BootPayloadSnapshot> {
        let name = format_payload_name(timestamp);
        let dir = self.snapshots_dir().join(&name);
        std::fs::create_dir_all(&dir)?;
        for file in self.init_file_names()? {
            let src = self.boot_path.join(&file).to_string_lossy().to_string();
            let dst = dir.join(&file).to_string_lossy().to_string();
            self.commander.copy_file(&src, &dst, &self.context)?;
        }
        let payload = BootPayloadSnapshot { path: dir, name, timestamp };
        self.payloads.push(payload.clone());
        self.payloads.sort_by_key(|p| p.timestamp);
        Ok(payload)
    }

    /// Archives a new payload only if none exists yet, or if any
    /// designated file now differs from the most recent archived copy.
    pub fn create_if_needed(&mut self, timestamp: NaiveDateTime) -> Result<Option<BootPayloadSnapshot>> {
        let latest = match self.payloads.last().cloned() {
            None => return self.create(timestamp).map(Some),
            Some(latest) => latest,
        };
        for file in self.init_file_names()? {
            let live = self.boot_path.join(&file).to_string_lossy().to_string();
            let archived = latest.path.join(&file).to_string_lossy().to_string();
            if self.commander.files_differ(&live, &archived, &self.context)? {
                return self.create(timestamp).map(Some);
            }
        }
        Ok(None)
    }

    pub fn resolve_for(&self, timestamp: NaiveDateTime) -> Option<&BootPayloadSnapshot> {
        resolve_for(&self.payloads, timestamp)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&BootPayloadSnapshot> {
        self.payloads.iter().find(|p| p.name == name)
    }

    /// Deletes one payload by name (§6 CLI `systemdboot snapshot delete`).
    pub fn delete(&mut self, name: &str) -> Result<BootPayloadSnapshot> {
        let position = self
            .payloads
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| crate::error::ManagerError::SnapshotNotFound(name.to_string()))?;
        let payload = self.payloads[position].clone();
        let path = payload.path.to_string_lossy().to_string();
        self.commander.remove_recursive(&path, &self.context)?;
        self.payloads.remove(position);
        Ok(payload)
    }

    /// Deletes payload directories not resolved for by any snapshot in
    /// `live_snapshot_timestamps`.
    pub fn gc(&mut self, live_snapshot_timestamps: &[NaiveDateTime]) -> Result<Vec<BootPayloadSnapshot>> {
        let referenced: HashSet<String> = live_snapshot_timestamps
            .iter()
            .filter_map(|t| resolve_for(&self.payloads, *t))
            .map(|p| p.name.clone())
            .collect();

        let mut deleted = Vec::new();
        let mut keep = Vec::new();
        for payload in self.payloads.drain(..) {
            if referenced.contains(&payload.name) {
                keep.push(payload);
            } else {
                let path = payload.path.to_string_lossy().to_string();
                self.commander.remove_recursive(&path, &self.context)?;
                deleted.push(payload);
            }
        }
        self.payloads = keep;
        Ok(deleted)
    }
}
