//! Backup Reconciler (§4.6): for each target, computes the desired
//! snapshot set, diffs against the target's snapshot set, and issues
//! delete / full-send / delta-send operations.
pub mod transport;

use crate::error::Result;
use crate::objects::Snapshot;
use crate::period::{Period, ALL_PERIODS};
use crate::retention::RetentionPolicy;
use std::path::Path;
use transport::Transport;


/// A configured backup destination (§3). `last_sync_file`, when set, is
/// touched under the *subvolume's* snapshots directory once the target
/// is fully reconciled — not under the target itself (§9 open question,
/// preserved verbatim from the source).
pub struct BackupTarget<C> {
    pub transport: Transport<C>,
    pub retention: RetentionPolicy,
    /// Always retain at least this many of the subvolume's most recent
    /// snapshots on the target, on top of the per-period policy.
    pub minimum: u32,
    pub last_sync_file: Option<String>,
}

impl<C> BackupTarget<C>
where
    C: crate::commands::CommandSubvolumeDelete
        + crate::commands::CommandSendReceive
        + crate::commands::CommandListRemoteDir
        + crate::commands::CommandEnsureRemoteDir
        + crate::commands::CommandRsyncTransfer
        + crate::commands::CommandMovePath
        + crate::commands::CommandRemoveRecursive
        + crate::commands::CommandTouchFile,
{
    /// Step 3: the desired set D. Union, for each configured period p, of
    /// the last `retention[p]` snapshots tagged with p, plus the last
    /// `minimum` snapshots overall, sorted ascending by basename (=
    /// timestamp sort, §4.2).
    pub fn desired_set<'a>(&self, snapshots: &'a [Snapshot]) -> Vec<&'a Snapshot> {
        desired_set(snapshots, &self.retention, self.minimum)
    }

    /// Runs the full state machine in §4.6 against one target. A
    /// failure at any step is returned to the caller (the orchestrator),
    /// which isolates it to this target and proceeds to the next.
    pub fn reconcile(&mut self, snapshots_dir: &Path, snapshots: &[Snapshot]) -> Result<()> {
        let desired = self.desired_set(snapshots);
        let desired_names: Vec<String> = desired.iter().map(|s| s.name.clone()).collect();

        self.transport.ensure_location()?;
        let on_target = self.transport.list_target_snapshots()?;

        for name in &on_target {
            if !desired_names.contains(name) {
                self.transport.delete_target(name)?;
            }
        }

        let mut retained: Vec<String> = on_target.into_iter().filter(|n| desired_names.contains(n)).collect();

        for (i, name) in desired_names.iter().enumerate() {
            if retained.contains(name) {
                continue;
            }
            let predecessor = if i == 0 { None } else { Some(&desired_names[i - 1]) };
            match predecessor {
                Some(parent) if retained.contains(parent) => {
                    self.transport.transfer_delta(parent, name)?;
                }
                _ => {
                    self.transport.transfer_full(name)?;
                }
            }
            retained.push(name.clone());
        }

        if let Some(marker) = self.last_sync_file.clone() {
            self.transport.touch_marker(snapshots_dir, &marker)?;
        }
        Ok(())
    }
}

fn desired_set<'a>(snapshots: &'a [Snapshot], retention: &RetentionPolicy, minimum: u32) -> Vec<&'a Snapshot> {
    use std::collections::HashSet;

    let mut names: HashSet<&str> = HashSet::new();
    let mut desired: Vec<&Snapshot> = Vec::new();

    for period in ALL_PERIODS {
        push_last_n(snapshots, &mut names, &mut desired, retention.limit(period) as usize, Some(period));
    }
    push_last_n(snapshots, &mut names, &mut desired, minimum as usize, None);

    desired.sort();
    desired
}

fn push_last_n<'a>(
    snapshots: &'a [Snapshot],
    seen: &mut std::collections::HashSet<&'a str>,
    out: &mut Vec<&'a Snapshot>,
    n: usize,
    period: Option<Period>,
) {
    if n == 0 {
        return;
    }
    let mut candidates: Vec<&Snapshot> = match period {
        Some(p) => snapshots.iter().filter(|s| s.has_period(p)).collect(),
        None => snapshots.iter().collect(),
    };
    candidates.sort();
    let start = candidates.len().saturating_sub(n);
    for snapshot in &candidates[start..] {
        if seen.insert(snapshot.name.as_str()) {
            out.push(snapshot);
        }
    }
}
