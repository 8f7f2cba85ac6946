use super::Commander;
use crate::command::{Command, Context};
use crate::error::Result;

/// `whoami` (§5): the CLI entry point uses this to confirm it's running
/// with the privileges the invoking user's sudoers rule grants it before
/// attempting any btrfs or bootloader change.
pub trait CommandWhoAmI {
    fn whoami(&mut self, context: &Context) -> Result<String>;
}

impl<T: Command> CommandWhoAmI for Commander<T> {
    fn whoami(&mut self, context: &Context) -> Result<String> {
        self.exec.run("whoami", context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandMock;

    #[test]
    fn returns_trimmed_username() {
        let mut mock = CommandMock::new();
        let ctx = Context::Local { user: "root".into() };
        mock.expect("whoami", ctx.clone(), Ok("root".to_string()));

        let mut commander = Commander::new(mock);
        assert_eq!(commander.whoami(&ctx).unwrap(), "root");
    }
}
