//! Subvolume Store (§4.3): enumerates, creates, and deletes snapshots
//! under a subvolume's snapshot directory.
use crate::command::Context;
use crate::commands::{CommandSubvolumeCreate, CommandSubvolumeDelete, CommandSubvolumeShow, CommandSubvolumeSnapshot};
use crate::error::{ManagerError, Result};
use crate::objects::Snapshot;
use crate::period::Period;
use crate::snapshot_name::PeriodTags;
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

#[cfg(test)]
mod tests;

/// A managed subvolume: its path, its snapshot directory, and the
/// in-memory snapshot list that mirrors it (§3 invariant: the list
/// equals the set of directories in `snapshots_dir` whose basenames
/// parse as SnapshotIds).
pub struct Subvolume<C> {
    path: PathBuf,
    snapshots_dir: PathBuf,
    top_level_path: Option<String>,
    snapshots: Vec<Snapshot>,
    commander: C,
    /// The subprocess context this subvolume's own host runs under.
    /// Subvolume operations are always local (§5): only backup targets
    /// can be remote.
    context: Context,
}

impl<C> Subvolume<C>
where
    C: CommandSubvolumeShow + CommandSubvolumeCreate + CommandSubvolumeSnapshot + CommandSubvolumeDelete,
{
    pub fn new(path: impl Into<PathBuf>, snapshots_dir: Option<PathBuf>, commander: C, context: Context) -> Self {
        let path = path.into();
        let snapshots_dir = snapshots_dir.unwrap_or_else(|| path.join(".snapshots"));
        Subvolume {
            path,
            snapshots_dir,
            top_level_path: None,
            snapshots: Vec::new(),
            commander,
            context,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshots_dir(&self) -> &Path {
        &self.snapshots_dir
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn top_level_path(&self) -> Option<&str> {
        self.top_level_path.as_deref()
    }

    /// `btrfs subvolume show <path>`; caches the first trimmed line of
    /// stdout as the top-level path later used to rewrite mount options
    /// (§4.3, §4.8).
    pub fn verify(&mut self) -> Result<()> {
        let path_str = self.path.to_string_lossy().to_string();
        let output = self.commander.subvolume_show(&path_str, &self.context)?;
        let top_level = output
            .lines()
            .next()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .ok_or_else(|| ManagerError::NotASubvolume(path_str.clone()))?;
        self.top_level_path = Some(top_level.to_string());
        Ok(())
    }

    pub fn has_snapshots_dir(&self) -> bool {
        self.snapshots_dir.is_dir()
    }

    /// Creates the snapshots directory as its own native subvolume.
    /// Fails with `AlreadyInitialised` if one is already present.
    pub fn init_snapshots(&mut self) -> Result<()> {
        if self.has_snapshots_dir() {
            return Err(ManagerError::AlreadyInitialised(
                self.snapshots_dir.to_string_lossy().to_string(),
            ));
        }
        let dir = self.snapshots_dir.to_string_lossy().to_string();
        self.commander.subvolume_create(&dir, &self.context)?;
        Ok(())
    }

    fn require_snapshots_dir(&self) -> Result<()> {
        if !self.has_snapshots_dir() {
            return Err(ManagerError::NotInitialised(self.snapshots_dir.to_string_lossy().to_string()));
        }
        Ok(())
    }

    /// Directory scan, filter by parse, sort by timestamp ascending
    /// (§4.3). Plain local directory I/O goes through `std::fs`
    /// directly rather than the subprocess runner.
    pub fn list(&mut self) -> Result<()> {
        self.require_snapshots_dir()?;

        let mut snapshots = Vec::new();
        for entry in std::fs::read_dir(&self.snapshots_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(snapshot) = Snapshot::from_dir_entry(&self.snapshots_dir, &name) {
                snapshots.push(snapshot);
            }
        }
        snapshots.sort();
        self.snapshots = snapshots;
        Ok(())
    }

    /// Computes a name from `now` and the due period set, snapshots the
    /// subvolume read-only into the snapshots directory, and appends the
    /// result to the in-memory list (§4.3). Boot-payload creation, when a
    /// boot manager is attached, is the caller's responsibility (§4.10
    /// step 1) so this component stays decoupled from C9.
    pub fn create(&mut self, now: NaiveDateTime, periods: PeriodTags) -> Result<Snapshot> {
        self.require_snapshots_dir()?;

        let snapshot = Snapshot::new_at(&self.snapshots_dir, now, periods);
        let subvol = self.path.to_string_lossy().to_string();
        let dest = snapshot.path.to_string_lossy().to_string();
        self.commander.subvolume_snapshot(&subvol, &dest, &self.context)?;

        self.snapshots.push(snapshot.clone());
        self.snapshots.sort();
        Ok(snapshot)
    }

    /// `btrfs subvolume delete --commit-each`, removes the snapshot from
    /// the in-memory list. Cascading to bootloader entries / boot
    /// payload GC is the orchestrator's responsibility (§3 lifecycle).
    pub fn delete(&mut self, name: &str) -> Result<Snapshot> {
        let position = self
            .snapshots
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| ManagerError::SnapshotNotFound(name.to_string()))?;

        let snapshot = self.snapshots[position].clone();
        let path = snapshot.path.to_string_lossy().to_string();
        self.commander.subvolume_delete(&path, &self.context)?;
        self.snapshots.remove(position);
        Ok(snapshot)
    }

    pub fn find(&self, name: &str) -> Option<&Snapshot> {
        self.snapshots.iter().find(|s| s.name == name)
    }

    /// Filters by period intersection. `periods` may contain `None` to
    /// mean "include untagged snapshots" alongside any named periods
    /// (§4.3).
    pub fn search(&self, periods: &[Option<Period>]) -> Vec<&Snapshot> {
        self.snapshots
            .iter()
            .filter(|s| {
                periods.iter().any(|p| match p {
                    Some(period) => s.has_period(*period),
                    None => s.is_untagged(),
                })
            })
            .collect()
    }
}
