use super::Commander;
use crate::command::{Command, Context};
use crate::error::Result;

/// `rm -rf` (§4.6, §4.9): removes a stale backup copy or orphaned boot
/// payload directory. Reserved for paths the reconciler itself decided
/// to discard; never used on user-supplied paths directly. Remotely the
/// ssh session lands as an unprivileged user, so the removal needs its
/// own `sudo`.
pub trait CommandRemoveRecursive {
    fn remove_recursive(&mut self, path: &str, context: &Context) -> Result<()>;
}

impl<T: Command> CommandRemoveRecursive for Commander<T> {
    fn remove_recursive(&mut self, path: &str, context: &Context) -> Result<()> {
        let command = match context {
            Context::Local { .. } => format!("rm -rf '{}'", escape(path)),
            Context::Remote { .. } => format!("sudo rm -rf '{}'", escape(path)),
        };
        self.exec.run(&command, context)?;
        Ok(())
    }
}

fn escape(path: &str) -> String {
    path.replace('\'', "'\\''")
}
