use super::Commander;
use crate::command::{Command, Context};
use crate::error::Result;

/// Idempotently ensures a directory exists at a backup target (§4.6):
/// probes with `[[ -d ... ]]` first and only `mkdir -p`s when that probe
/// comes back empty, since the create step needs `sudo` (the ssh session
/// lands as an unprivileged user) and is worth skipping when the
/// directory is already there. Local targets use
/// `std::fs::create_dir_all` instead (see the subvolume store and
/// backup reconciler).
pub trait CommandEnsureRemoteDir {
    fn ensure_remote_dir(&mut self, path: &str, context: &Context) -> Result<()>;
}

impl<T: Command> CommandEnsureRemoteDir for Commander<T> {
    fn ensure_remote_dir(&mut self, path: &str, context: &Context) -> Result<()> {
        let escaped = escape(path);
        let probe = format!("if [[ -d '{}' ]] ; then echo 'yes' ; fi", escaped);
        let exists = self.exec.run(&probe, context)?;
        if exists.trim() != "yes" {
            let mkdir = format!("sudo mkdir -p '{}'", escaped);
            self.exec.run(&mkdir, context)?;
        }
        Ok(())
    }
}

fn escape(path: &str) -> String {
    path.replace('\'', "'\\''")
}
