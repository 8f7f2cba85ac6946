use super::Commander;
use crate::command::{Command, Context};
use crate::error::Result;

/// `btrfs subvolume create <path>` (§4.3): used once, to initialise a
/// subvolume's snapshot directory as its own native subvolume rather
/// than a plain directory.
pub trait CommandSubvolumeCreate {
    fn subvolume_create(&mut self, path: &str, context: &Context) -> Result<()>;
}

impl<T: Command> CommandSubvolumeCreate for Commander<T> {
    fn subvolume_create(&mut self, path: &str, context: &Context) -> Result<()> {
        let command = format!("btrfs subvolume create '{}'", escape(path));
        self.exec.run(&command, context)?;
        Ok(())
    }
}

fn escape(path: &str) -> String {
    path.replace('\'', "'\\''")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandMock;

    #[test]
    fn issues_subvolume_create() {
        let mut mock = CommandMock::new();
        let ctx = Context::Local { user: "root".into() };
        mock.expect("btrfs subvolume create '/srv/data/.snapshots'", ctx.clone(), Ok(String::new()));

        let mut commander = Commander::new(mock);
        commander.subvolume_create("/srv/data/.snapshots", &ctx).unwrap();
    }
}
