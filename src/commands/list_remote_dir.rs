use super::Commander;
use crate::command::{Command, Context};
use crate::error::Result;

/// `ls -1` to enumerate a target directory's entries (§4.7): used for
/// remote contexts, where a plain directory read isn't available to us
/// without shelling out. Local enumeration goes through `std::fs`
/// directly instead (see the subvolume store).
pub trait CommandListRemoteDir {
    fn list_remote_dir(&mut self, path: &str, context: &Context) -> Result<Vec<String>>;
}

impl<T: Command> CommandListRemoteDir for Commander<T> {
    fn list_remote_dir(&mut self, path: &str, context: &Context) -> Result<Vec<String>> {
        let command = format!("ls -1 '{}'", escape(path));
        let output = self.exec.run(&command, context)?;
        Ok(output.lines().map(str::to_string).filter(|l| !l.is_empty()).collect())
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
    fn splits_output_into_entries() {
        let mut mock = CommandMock::new();
        let ctx = Context::Remote {
            host: "backup.example".into(),
            user: None,
            ssh_options: None,
        };
        mock.expect(
            "ls -1 '/mnt/backup'",
            ctx.clone(),
            Ok("2024-06-01_08-00-00_H\n2024-06-01_09-00-00_H\n".to_string()),
        );

        let mut commander = Commander::new(mock);
        let entries = commander.list_remote_dir("/mnt/backup", &ctx).unwrap();
        assert_eq!(entries, vec!["2024-06-01_08-00-00_H", "2024-06-01_09-00-00_H"]);
    }
}
