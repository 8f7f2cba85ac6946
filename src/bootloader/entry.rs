//! Bootloader Entry Reconciler (§4.8): derives one loader entry per
//! retained snapshot from a hand-maintained reference entry, rewriting
//! its `title`/`linux`/`initrd`/`options` lines to point at that
//! snapshot (and, if one applies, its boot payload).
use super::payload::{resolve_for, BootPayloadSnapshot};
use crate::error::{ManagerError, Result};
use crate::objects::Snapshot;
use crate::retention::{keep_set, RetentionPolicy};
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};


#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EntryOutcome {
    pub deleted: Vec<PathBuf>,
    pub created: Vec<PathBuf>,
}

fn entry_filename(reference_entry: &str, snapshot_name: &str) -> String {
    format!("snapshot-{}-{}", snapshot_name, reference_entry)
}

/// Recovers the snapshot basename from an entry filename, given the
/// reference entry it was derived from. Returns `None` for anything that
/// doesn't match `snapshot-<snapshot-basename>-<reference-entry>`, so
/// alien files in the entries directory are silently ignored.
fn parse_entry_filename<'a>(reference_entry: &str, filename: &'a str) -> Option<&'a str> {
    let prefix = "snapshot-";
    let suffix = format!("-{}", reference_entry);
    if !filename.starts_with(prefix) || !filename.ends_with(&suffix) {
        return None;
    }
    let candidate = &filename[prefix.len()..filename.len() - suffix.len()];
    crate::snapshot_name::parse_name(candidate).map(|_| candidate)
}

/// Recovers the boot payload an already-written entry points at by
/// reading back its rewritten `linux`/`initrd` line: entry files carry
/// no metadata of their own, so this is the only record of which
/// payload was live when the entry was created.
fn embedded_payload_name(contents: &str) -> Option<String> {
    let re = Regex::new(r"^(?:linux|initrd)\s+/?snapshots/([^/\s]+)/").expect("embedded payload regex is a compile-time constant");
    contents.lines().find_map(|line| re.captures(line.trim_start()).map(|c| c[1].to_string()))
}

/// One entry file found under the entries directory, matched against
/// the reference entry's naming convention (§6 CLI `systemdboot list`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryStatus {
    pub path: PathBuf,
    pub snapshot_name: String,
    pub snapshot_exists: bool,
    pub boot_snapshot_name: Option<String>,
    pub boot_snapshot_exists: bool,
}

fn list_entries(entries_dir: &Path, reference_entry: &str, snapshots: &[Snapshot], payload_names: &HashSet<&str>) -> Result<Vec<EntryStatus>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(entries_dir)? {
        let entry = entry?;
        let filename = entry.file_name().to_string_lossy().to_string();
        let Some(snapshot_name) = parse_entry_filename(reference_entry, &filename) else {
            continue;
        };
        let snapshot_exists = snapshots.iter().any(|s| s.name == snapshot_name);
        let contents = std::fs::read_to_string(entry.path()).unwrap_or_default();
        let boot_snapshot_name = embedded_payload_name(&contents);
        let boot_snapshot_exists = boot_snapshot_name.as_deref().map(|n| payload_names.contains(n)).unwrap_or(true);
        out.push(EntryStatus {
            path: entry.path(),
            snapshot_name: snapshot_name.to_string(),
            snapshot_exists,
            boot_snapshot_name,
            boot_snapshot_exists,
        });
    }
    Ok(out)
}

/// Lists existing bootloader entries derived from `reference_entry`,
/// without reconciling them (§6 CLI `systemdboot list`).
pub fn list(entries_dir: &Path, reference_entry: &str, snapshots: &[Snapshot], payloads: &[BootPayloadSnapshot]) -> Result<Vec<EntryStatus>> {
    let payload_names: HashSet<&str> = payloads.iter().map(|p| p.name.as_str()).collect();
    list_entries(entries_dir, reference_entry, snapshots, &payload_names)
}

fn snapshot_subvol_value(top_level_path: &str, subvol_path: &Path, snapshots_dir: &Path, snapshot_name: &str) -> String {
    let relative = snapshots_dir.strip_prefix(subvol_path).unwrap_or_else(|_| Path::new(".snapshots"));
    let top = top_level_path.trim_end_matches('/');
    format!("{}/{}/{}", top, relative.to_string_lossy(), snapshot_name)
}

fn rewrite_options(value: &str, subvol_value: &str) -> String {
    let mut out = value.to_string();
    for token in value.split_whitespace() {
        if let Some(rest) = token.strip_prefix("rootflags=") {
            let mut flags: Vec<String> = rest.split(',').map(str::to_string).collect();
            for flag in flags.iter_mut() {
                if flag.starts_with("subvol=") {
                    *flag = format!("subvol={}", subvol_value);
                }
            }
            let new_token = format!("rootflags={}", flags.join(","));
            out = out.replacen(token, &new_token, 1);
        }
    }
    out
}

fn rewrite_line(line: &str, snapshot: &Snapshot, boot_payload: Option<&BootPayloadSnapshot>, subvol_value: &str) -> String {
    let re = Regex::new(r"^(\S+)(\s+)(.*)$").expect("entry line regex is a compile-time constant");
    let Some(caps) = re.captures(line) else {
        log::warn!("bootloader entry template line does not parse as a key/value pair: `{}`", line);
        return line.to_string();
    };
    let key = &caps[1];
    let ws = &caps[2];
    let mut value = caps[3].to_string();

    match key {
        "title" => {
            value = format!("Snapshot - {} - {}", snapshot.timestamp.format("%a %d-%b %H:%M:%S"), value);
        }
        "linux" | "initrd" => {
            if let Some(payload) = boot_payload {
                value = format!("{}/{}", payload.bootloader_relative_path(), value.trim_start_matches('/'));
            }
        }
        "options" => {
            value = rewrite_options(&value, subvol_value);
        }
        _ => {}
    }

    format!("{}{}{}", key, ws, value)
}

fn render_entry(reference_contents: &str, snapshot: &Snapshot, boot_payload: Option<&BootPayloadSnapshot>, subvol_value: &str) -> String {
    let mut rendered: Vec<String> = reference_contents
        .lines()
        .map(|line| rewrite_line(line, snapshot, boot_payload, subvol_value))
        .collect();
    rendered.push(String::new());
    rendered.join("\n")
}

fn create_entry(
    entries_dir: &Path,
    reference_entry: &str,
    reference_contents: &str,
    snapshot: &Snapshot,
    boot_payload: Option<&BootPayloadSnapshot>,
    subvol_value: &str,
) -> Result<PathBuf> {
    let path = entries_dir.join(entry_filename(reference_entry, &snapshot.name));
    std::fs::write(&path, render_entry(reference_contents, snapshot, boot_payload, subvol_value))?;
    Ok(path)
}

/// Deletes one bootloader entry by the snapshot name it was derived
/// from (§6 CLI `systemdboot delete`).
pub fn delete(entries_dir: &Path, reference_entry: &str, snapshot_name: &str) -> Result<PathBuf> {
    let path = entries_dir.join(entry_filename(reference_entry, snapshot_name));
    if !path.is_file() {
        return Err(ManagerError::SnapshotNotFound(snapshot_name.to_string()));
    }
    std::fs::remove_file(&path)?;
    Ok(path)
}

/// Reconciles the bootloader entries directory against the desired set
/// for `spec`'s retention policy (§4.4's keep-set computation applied to
/// `snapshots` rather than a backup target): deletes entries whose
/// source snapshot has fallen out of that set or gone missing, deletes
/// entries whose embedded boot payload has been GC'd, then creates an
/// entry for every desired snapshot that doesn't already have one.
pub fn reconcile(
    entries_dir: &Path,
    reference_entry: &str,
    retention: &RetentionPolicy,
    subvol_path: &Path,
    subvol_snapshots_dir: &Path,
    subvol_top_level_path: &str,
    snapshots: &[Snapshot],
    payloads: &[BootPayloadSnapshot],
) -> Result<EntryOutcome> {
    if !entries_dir.is_dir() {
        return Err(ManagerError::TemplateInvalid(format!("bootloader entries directory {} does not exist", entries_dir.display())));
    }
    let reference_path = entries_dir.join(reference_entry);
    let reference_contents = std::fs::read_to_string(&reference_path)
        .map_err(|_| ManagerError::TemplateInvalid(format!("reference entry {} not found", reference_path.display())))?;

    let desired = keep_set(snapshots, retention);
    let desired_names: HashSet<&str> = desired.iter().map(|s| s.name.as_str()).collect();
    let payload_names: HashSet<&str> = payloads.iter().map(|p| p.name.as_str()).collect();

    let existing = list_entries(entries_dir, reference_entry, snapshots, &payload_names)?;

    let mut outcome = EntryOutcome::default();
    let mut surviving_names: HashSet<String> = HashSet::new();

    for entry in &existing {
        let orphaned = !entry.snapshot_exists || !desired_names.contains(entry.snapshot_name.as_str());
        let stale_payload = entry.boot_snapshot_name.is_some() && !entry.boot_snapshot_exists;
        if orphaned || stale_payload {
            std::fs::remove_file(&entry.path)?;
            outcome.deleted.push(entry.path.clone());
        } else {
            surviving_names.insert(entry.snapshot_name.clone());
        }
    }

    for snapshot in desired {
        if surviving_names.contains(snapshot.name.as_str()) {
            continue;
        }
        let boot_payload = resolve_for(payloads, snapshot.timestamp);
        let subvol_value = snapshot_subvol_value(subvol_top_level_path, subvol_path, subvol_snapshots_dir, &snapshot.name);
        let path = create_entry(entries_dir, reference_entry, &reference_contents, snapshot, boot_payload, &subvol_value)?;
        outcome.created.push(path);
    }

    Ok(outcome)
}
