use super::Commander;
use crate::command::{Command, Context};
use crate::error::Result;

/// `btrfs subvolume delete` (§4.3, §4.6). Locally we pass `--commit-each`
/// (no `sudo`, already running as the target's owning user) so the
/// deletion is durable before the cleanup pass continues; remotely the
/// ssh session lands as an unprivileged user, so the command is wrapped
/// in `sudo` instead, and `--commit-each` is dropped to match the target
/// host's own delete convention.
pub trait CommandSubvolumeDelete {
    fn subvolume_delete(&mut self, path: &str, context: &Context) -> Result<()>;
}

impl<T: Command> CommandSubvolumeDelete for Commander<T> {
    fn subvolume_delete(&mut self, path: &str, context: &Context) -> Result<()> {
        let command = match context {
            Context::Local { .. } => format!("btrfs subvolume delete --commit-each '{}'", escape(path)),
            Context::Remote { .. } => format!("sudo btrfs subvolume delete '{}'", escape(path)),
        };
        self.exec.run(&command, context)?;
        Ok(())
    }
}

fn escape(path: &str) -> String {
    path.replace('\'', "'\\''")
}
