use super::Commander;
use crate::command::{Command, Context};
use crate::error::Result;

/// `btrfs subvolume snapshot -r <subvolume> <dest>` (§4.3): the created
/// snapshot is always read-only, mirroring the teacher's practice of
/// snapshotting for backup/boot purposes rather than for editing.
pub trait CommandSubvolumeSnapshot {
    fn subvolume_snapshot(&mut self, subvolume: &str, dest: &str, context: &Context) -> Result<()>;
}

impl<T: Command> CommandSubvolumeSnapshot for Commander<T> {
    fn subvolume_snapshot(&mut self, subvolume: &str, dest: &str, context: &Context) -> Result<()> {
        let command = format!(
            "btrfs subvolume snapshot -r '{}' '{}'",
            escape(subvolume),
            escape(dest)
        );
        self.exec.run(&command, context)?;
        Ok(())
    }
}

fn escape(path: &str) -> String {
    path.replace('\'', "'\\''")
}
