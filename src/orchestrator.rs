//! Orchestrator (§4.10): the top-level pass. For each managed subvolume,
//! in declared order: schedule → create → retention cleanup → backup
//! reconcile → bootloader reconcile. Wiring `Configuration` into live
//! `Subvolume`/`BackupTarget`/`BootPayloadStore` instances is the
//! caller's job (`main`); this module owns the control flow and the
//! cross-subsystem cascade (§3 lifecycle, §4.9 gc).
use crate::backup::BackupTarget;
use crate::bootloader::entry::{self, EntryOutcome};
use crate::bootloader::payload::BootPayloadStore;
use crate::commands::Commands;
use crate::config::BootloaderEntrySpecConfig;
use crate::error::Result;
use crate::objects::Snapshot;
use crate::period::Period;
use crate::retention::{discard_set, RetentionPolicy};
use crate::schedule::due_periods;
use crate::snapshot_name::PeriodTags;
use crate::subvolume::Subvolume;
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

#[cfg(test)]
mod tests;

/// One configured subvolume together with the live components derived
/// from it: its own snapshot store, its backup targets, and the
/// bootloader entry specs that reference it.
pub struct ManagedSubvolume<C> {
    pub subvolume: Subvolume<C>,
    pub configured_periods: Vec<Period>,
    pub retention: RetentionPolicy,
    pub backup_targets: Vec<BackupTarget<C>>,
    pub bootloader_specs: Vec<BootloaderEntrySpecConfig>,
}

/// Outcome of one subvolume's pass, for logging/reporting at the call
/// site. Errors from backup targets and bootloader specs are carried
/// here rather than propagated, per §5/§7's isolation rule: one
/// target's or spec's failure never aborts the rest of the pass.
#[derive(Default)]
pub struct SubvolumeReport {
    pub path: PathBuf,
    pub created: Option<Snapshot>,
    pub discarded: Vec<Snapshot>,
    pub backup_errors: Vec<(usize, crate::error::ManagerError)>,
    pub bootloader_errors: Vec<(String, crate::error::ManagerError)>,
}

/// §4.10 step 1: collects due periods and, if any, takes one snapshot
/// tagged with all of them. Triggers `create_if_needed` on the boot
/// payload store when one is attached.
pub fn create_due<C: Commands>(
    subvolume: &mut Subvolume<C>,
    configured_periods: &[Period],
    now: NaiveDateTime,
    boot_store: Option<&mut BootPayloadStore<C>>,
) -> Result<Option<Snapshot>> {
    let due = due_periods(subvolume.snapshots(), configured_periods, now);
    if due.is_empty() {
        return Ok(None);
    }
    let snapshot = subvolume.create(now, PeriodTags::new(due))?;
    if let Some(store) = boot_store {
        store.create_if_needed(now)?;
    }
    Ok(Some(snapshot))
}

/// §4.10 step 2: deletes everything outside the keep set. Cascading to
/// bootloader entries happens in the bootloader reconcile step (§4.8
/// already deletes entries whose snapshot fell out of the desired set);
/// boot payload GC is the caller's responsibility once every managed
/// subvolume's cleanup for this pass has run (§3 lifecycle).
pub fn cleanup<C: Commands>(subvolume: &mut Subvolume<C>, retention: &RetentionPolicy) -> Result<Vec<Snapshot>> {
    let names: Vec<String> = discard_set(subvolume.snapshots(), retention).into_iter().map(|s| s.name.clone()).collect();

    let mut discarded = Vec::new();
    for name in names {
        discarded.push(subvolume.delete(&name)?);
    }
    Ok(discarded)
}

/// §4.10 step 3: reconciles every backup target, or only the targets
/// named in `ids` (§6 `backup run --id`). A target's failure is logged
/// by the caller and does not stop the remaining targets.
pub fn reconcile_backups<C: Commands>(
    subvolume: &Subvolume<C>,
    targets: &mut [BackupTarget<C>],
    ids: Option<&[usize]>,
) -> Vec<(usize, Result<()>)> {
    let snapshots_dir = subvolume.snapshots_dir().to_path_buf();
    let snapshots: Vec<Snapshot> = subvolume.snapshots().to_vec();

    targets
        .iter_mut()
        .enumerate()
        .filter(|(i, _)| ids.map(|ids| ids.contains(i)).unwrap_or(true))
        .map(|(i, target)| (i, target.reconcile(&snapshots_dir, &snapshots)))
        .collect()
}

/// §4.10 step 4: reconciles every bootloader entry spec for this
/// subvolume. Requires `subvolume.verify()` to have already cached the
/// top-level path used to rewrite `options` lines.
pub fn reconcile_bootloader<C: Commands>(
    subvolume: &Subvolume<C>,
    specs: &[BootloaderEntrySpecConfig],
    entries_dir: &Path,
    payloads: &[crate::bootloader::payload::BootPayloadSnapshot],
) -> Vec<(String, Result<EntryOutcome>)> {
    let top_level_path = subvolume.top_level_path().unwrap_or("");
    specs
        .iter()
        .map(|spec| {
            let outcome = entry::reconcile(
                entries_dir,
                &spec.entry,
                &spec.retention,
                subvolume.path(),
                subvolume.snapshots_dir(),
                top_level_path,
                subvolume.snapshots(),
                payloads,
            );
            (spec.entry.clone(), outcome)
        })
        .collect()
}

/// §3 lifecycle: after any subvolume's cleanup cascade, garbage-collect
/// boot payloads not resolved for by any live snapshot of any currently
/// managed subvolume.
pub fn gc_boot_payloads<C: Commands>(
    store: &mut BootPayloadStore<C>,
    all_live_timestamps: &[NaiveDateTime],
) -> Result<Vec<crate::bootloader::payload::BootPayloadSnapshot>> {
    store.gc(all_live_timestamps)
}

fn live_timestamps<C>(managed: &[ManagedSubvolume<C>]) -> Vec<NaiveDateTime> {
    managed.iter().flat_map(|m| m.subvolume.snapshots().iter().map(|s| s.timestamp)).collect()
}

/// The full top-level pass (§4.10): every managed subvolume, in
/// declared order, restricted to `subvolume_filter` when given (§6
/// `snapshot run [path]`). `boot_store`/`entries_dir` are absent when no
/// `systemd-boot` section is configured at all.
pub fn run_pass<C: Commands>(
    managed: &mut [ManagedSubvolume<C>],
    mut boot_store: Option<&mut BootPayloadStore<C>>,
    entries_dir: Option<&Path>,
    now: NaiveDateTime,
    subvolume_filter: Option<&[PathBuf]>,
) -> Vec<SubvolumeReport> {
    let mut reports = Vec::with_capacity(managed.len());

    for i in 0..managed.len() {
        let path = managed[i].subvolume.path().to_path_buf();
        if let Some(filter) = subvolume_filter {
            if !filter.iter().any(|p| p == &path) {
                continue;
            }
        }

        let mut report = SubvolumeReport {
            path: path.clone(),
            ..Default::default()
        };

        let create_result = create_due(
            &mut managed[i].subvolume,
            &managed[i].configured_periods,
            now,
            boot_store.as_deref_mut(),
        );
        match create_result {
            Ok(created) => report.created = created,
            Err(e) => log::error!("snapshot create failed for {}: {}", path.display(), e),
        }

        match cleanup(&mut managed[i].subvolume, &managed[i].retention) {
            Ok(discarded) => report.discarded = discarded,
            Err(e) => log::error!("retention cleanup failed for {}: {}", path.display(), e),
        }

        if let Some(store) = boot_store.as_deref_mut() {
            let timestamps = live_timestamps(managed);
            if let Err(e) = gc_boot_payloads(store, &timestamps) {
                log::error!("boot payload garbage collection failed: {}", e);
            }
        }

        let backup_errors: Vec<(usize, crate::error::ManagerError)> = reconcile_backups(&managed[i].subvolume, &mut managed[i].backup_targets, None)
            .into_iter()
            .filter_map(|(id, result)| match result {
                Ok(()) => None,
                Err(e) => {
                    log::error!("backup target {} failed for {}: {}", id, path.display(), e);
                    Some((id, e))
                }
            })
            .collect();
        report.backup_errors = backup_errors;

        if let (Some(store), Some(entries_dir)) = (boot_store.as_deref(), entries_dir) {
            let bootloader_errors: Vec<(String, crate::error::ManagerError)> =
                reconcile_bootloader(&managed[i].subvolume, &managed[i].bootloader_specs, entries_dir, store.payloads())
                    .into_iter()
                    .filter_map(|(entry, result)| match result {
                        Ok(_) => None,
                        Err(e) => {
                            log::error!("bootloader entry `{}` reconcile failed for {}: {}", entry, path.display(), e);
                            Some((entry, e))
                        }
                    })
                    .collect();
            report.bootloader_errors = bootloader_errors;
        }

        reports.push(report);
    }

    reports
}
