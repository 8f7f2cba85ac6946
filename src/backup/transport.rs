//! Transport Adapters (§4.7): four concrete transports collapsed into a
//! single struct parameterised by (mechanism, target context), since the
//! btrfs and rsync command shapes are identical across local/remote —
//! they differ only in how the runner wraps them (sudo locally, ssh
//! remotely), which the commands/mod.rs traits already abstract over.
use crate::command::{Context, RetryPolicy};
use crate::commands::{
    CommandEnsureRemoteDir, CommandListRemoteDir, CommandMovePath, CommandRemoveRecursive, CommandRsyncTransfer,
    CommandSendReceive, CommandSubvolumeDelete, CommandTouchFile,
};
use crate::error::{ManagerError, Result};
use std::path::{Path, PathBuf};
use std::thread;

/// The two ways a backup target is kept in sync, per §4.7. `Native` is
/// `btrfs send`/`receive`; `Copy` is rsync with `.tmp` staging plus an
/// atomic rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mechanism {
    Native,
    Copy,
}

/// One of LocalNative, RemoteNative, LocalCopy, RemoteCopy, expressed as
/// (mechanism, target context) rather than four separate types.
pub struct Transport<C> {
    commander: C,
    mechanism: Mechanism,
    /// Context the *source* subvolume's own commands run under — always
    /// local (§5: only backup targets may be remote).
    source_context: Context,
    target_context: Context,
    source_dir: PathBuf,
    location: String,
    retry_policy: RetryPolicy,
}

impl<C> Transport<C>
where
    C: CommandSubvolumeDelete
        + CommandSendReceive
        + CommandListRemoteDir
        + CommandEnsureRemoteDir
        + CommandRsyncTransfer
        + CommandMovePath
        + CommandRemoveRecursive
        + CommandTouchFile,
{
    pub fn new(
        commander: C,
        mechanism: Mechanism,
        source_context: Context,
        target_context: Context,
        source_dir: PathBuf,
        location: String,
    ) -> Self {
        Transport {
            commander,
            mechanism,
            source_context,
            target_context,
            source_dir,
            location,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    fn is_remote(&self) -> bool {
        self.target_context.is_remote()
    }

    fn staging_dir(&self) -> String {
        format!("{}/.tmp", self.location.trim_end_matches('/'))
    }

    /// Step 1: `ensure_location`. Native creates the location with mode
    /// 0700; copy also ensures the `.tmp` staging directory exists.
    pub fn ensure_location(&mut self) -> Result<()> {
        let remote = self.is_remote();
        let policy = self.retry_policy;
        let mechanism = self.mechanism;

        match self.target_context.clone() {
            Context::Local { .. } => {
                create_dir_0700(&self.location)?;
                if mechanism == Mechanism::Copy {
                    create_dir_0700(&self.staging_dir())?;
                }
                Ok(())
            }
            target_context @ Context::Remote { .. } => {
                let location = self.location.clone();
                let location_for_err = location.clone();
                let staging = self.staging_dir();
                let commander = &mut self.commander;
                run_unreachable_on_exhaustion(remote, policy, &location_for_err, move || {
                    commander.ensure_remote_dir(&location, &target_context)?;
                    if mechanism == Mechanism::Copy {
                        commander.ensure_remote_dir(&staging, &target_context)?;
                    }
                    Ok(())
                })
            }
        }
    }

    /// Step 2: `list_target_snapshots`. Local targets are scanned via
    /// `std::fs`; remote targets via `ls -1` (§4.7).
    pub fn list_target_snapshots(&mut self) -> Result<Vec<String>> {
        let remote = self.is_remote();
        let policy = self.retry_policy;

        match self.target_context.clone() {
            Context::Local { .. } => list_local_dir(&self.location),
            target_context @ Context::Remote { .. } => {
                let location = self.location.clone();
                let location_for_err = location.clone();
                let commander = &mut self.commander;
                run_unreachable_on_exhaustion(remote, policy, &location_for_err, move || commander.list_remote_dir(&location, &target_context))
            }
        }
    }

    /// Step 4: `delete_target(name)`.
    pub fn delete_target(&mut self, name: &str) -> Result<()> {
        let remote = self.is_remote();
        let policy = self.retry_policy;
        let mechanism = self.mechanism;
        let target_path = format!("{}/{}", self.location.trim_end_matches('/'), name);
        let target_context = self.target_context.clone();
        let commander = &mut self.commander;

        run_with_policy(remote, policy, move || match mechanism {
            Mechanism::Native => commander.subvolume_delete(&target_path, &target_context),
            Mechanism::Copy => commander.remove_recursive(&target_path, &target_context),
        })
    }

    /// Step 5 (no predecessor on target): `transfer_full(name)`.
    pub fn transfer_full(&mut self, name: &str) -> Result<()> {
        let remote = self.is_remote();
        let policy = self.retry_policy;
        let mechanism = self.mechanism;
        let src = self.source_dir.join(name).to_string_lossy().to_string();
        let source_context = self.source_context.clone();
        let target_context = self.target_context.clone();
        let location = self.location.clone();
        let staged = format!("{}/{}", self.staging_dir(), name);
        let dest = format!("{}/{}", location, name);
        let commander = &mut self.commander;

        run_with_policy(remote, policy, move || match mechanism {
            Mechanism::Native => commander.send_full(&src, &source_context, &location, &target_context),
            Mechanism::Copy => {
                commander.rsync_full(&source_context, &src, &target_context, &staged)?;
                commander.move_path(&staged, &dest, &target_context)
            }
        })
    }

    /// Step 5 (predecessor present on target): `transfer_delta(parent, name)`.
    pub fn transfer_delta(&mut self, parent: &str, name: &str) -> Result<()> {
        let remote = self.is_remote();
        let policy = self.retry_policy;
        let mechanism = self.mechanism;
        let parent_src = self.source_dir.join(parent).to_string_lossy().to_string();
        let src = self.source_dir.join(name).to_string_lossy().to_string();
        let source_context = self.source_context.clone();
        let target_context = self.target_context.clone();
        let location = self.location.clone();
        let link_dest = format!("{}/{}", location, parent);
        let staged = format!("{}/{}", self.staging_dir(), name);
        let dest = format!("{}/{}", location, name);
        let commander = &mut self.commander;

        run_with_policy(remote, policy, move || match mechanism {
            Mechanism::Native => commander.send_delta(&parent_src, &src, &source_context, &location, &target_context),
            Mechanism::Copy => {
                commander.rsync_delta(&source_context, &src, &target_context, &staged, &link_dest)?;
                commander.move_path(&staged, &dest, &target_context)
            }
        })
    }

    /// Step 6: touch the marker under the *subvolume's* snapshots
    /// directory, not under the target (§9 open question, preserved
    /// verbatim). Runs in the source's own (always-local) context.
    pub fn touch_marker(&mut self, snapshots_dir: &Path, marker: &str) -> Result<()> {
        let path = snapshots_dir.join(marker).to_string_lossy().to_string();
        self.commander.touch_file(&path, &self.source_context)
    }
}

fn create_dir_0700(path: &str) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true).mode(0o700);
    builder.create(path)?;
    Ok(())
}

fn list_local_dir(path: &str) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(Path::new(path))? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name == ".tmp" {
            continue;
        }
        if crate::snapshot_name::parse_name(&name).is_some() {
            names.push(name);
        }
    }
    Ok(names)
}

/// Retries `attempt` per `policy` only when `remote` is true (§4.6:
/// retry never applies to local filesystem commands).
fn run_with_policy<T>(remote: bool, policy: RetryPolicy, mut attempt: impl FnMut() -> Result<T>) -> Result<T> {
    if !remote {
        return attempt();
    }
    let mut last_err = None;
    for n in 0..policy.attempts {
        match attempt() {
            Ok(v) => return Ok(v),
            Err(e) => {
                log::warn!("backup target step failed (attempt {}/{}): {}", n + 1, policy.attempts, e);
                last_err = Some(e);
                if n + 1 < policy.attempts {
                    thread::sleep(policy.fail_delay);
                }
            }
        }
    }
    Err(last_err.expect("at least one attempt always runs"))
}

/// Like `run_with_policy`, but for the two steps §7 names explicitly as
/// `TargetUnreachable` ("remote enumeration or mkdir failed after
/// retries"): `ensure_location` and `list_target_snapshots`. Retries
/// exhausted ⇒ the raw command error is wrapped so callers can tell
/// "couldn't reach the target at all" apart from "a transfer step it
/// could reach returned nonzero" (`CommandFailed`).
fn run_unreachable_on_exhaustion<T>(remote: bool, policy: RetryPolicy, location: &str, attempt: impl FnMut() -> Result<T>) -> Result<T> {
    run_with_policy(remote, policy, attempt).map_err(|e| ManagerError::TargetUnreachable(format!("{}: {}", location, e)))
}
