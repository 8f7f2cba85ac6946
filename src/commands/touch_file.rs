use super::Commander;
use crate::command::{Command, Context};
use crate::error::Result;

/// `touch` (§4.6): stamps the `last_sync_file` marker a backup target
/// uses to remember it completed its most recent reconciliation pass.
pub trait CommandTouchFile {
    fn touch_file(&mut self, path: &str, context: &Context) -> Result<()>;
}

impl<T: Command> CommandTouchFile for Commander<T> {
    fn touch_file(&mut self, path: &str, context: &Context) -> Result<()> {
        let command = format!("touch '{}'", escape(path));
        self.exec.run(&command, context)?;
        Ok(())
    }
}

fn escape(path: &str) -> String {
    path.replace('\'', "'\\''")
}
