use super::Commander;
use crate::command::{Command, Context};
use crate::error::{ManagerError, Result};

/// Runs `btrfs subvolume show <path>` and extracts the subvolume's
/// top-level mount-relative path, which anchors every other command
/// this crate issues against the subvolume (§4.3).
pub trait CommandSubvolumeShow {
    fn subvolume_show(&mut self, path: &str, context: &Context) -> Result<String>;
}

impl<T: Command> CommandSubvolumeShow for Commander<T> {
    fn subvolume_show(&mut self, path: &str, context: &Context) -> Result<String> {
        let command = format!("btrfs subvolume show {}", shell_escape(path));
        let output = self.exec.run(&command, context)?;

        if !output.lines().any(|l| !l.trim().is_empty()) {
            return Err(ManagerError::NotASubvolume(path.to_string()));
        }

        Ok(output)
    }
}

fn shell_escape(path: &str) -> String {
    format!("'{}'", path.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandMock;

    #[test]
    fn parses_successful_output() {
        let mut mock = CommandMock::new();
        let ctx = Context::Local { user: "root".into() };
        mock.expect(
            "btrfs subvolume show '/srv/data'",
            ctx.clone(),
            Ok("/srv/data\n\tName: \t\t\t<FS_TREE>\n".to_string()),
        );

        let mut commander = Commander::new(mock);
        let result = commander.subvolume_show("/srv/data", &ctx).unwrap();
        assert!(result.contains("FS_TREE"));
    }

    #[test]
    fn empty_output_is_not_a_subvolume() {
        let mut mock = CommandMock::new();
        let ctx = Context::Local { user: "root".into() };
        mock.expect("btrfs subvolume show '/srv/data'", ctx.clone(), Ok(String::new()));

        let mut commander = Commander::new(mock);
        let err = commander.subvolume_show("/srv/data", &ctx).unwrap_err();
        assert!(matches!(err, ManagerError::NotASubvolume(p) if p == "/srv/data"));
    }
}
