use super::Commander;
use crate::command::{Command, Context};
use crate::error::Result;

/// `mv` (§4.6, §4.9): used to atomically swap a freshly-written boot
/// payload or backup staging directory into its final name. Remotely
/// the ssh session lands as an unprivileged user, so the move needs its
/// own `sudo`.
pub trait CommandMovePath {
    fn move_path(&mut self, src: &str, dst: &str, context: &Context) -> Result<()>;
}

impl<T: Command> CommandMovePath for Commander<T> {
    fn move_path(&mut self, src: &str, dst: &str, context: &Context) -> Result<()> {
        let command = match context {
            Context::Local { .. } => format!("mv '{}' '{}'", escape(src), escape(dst)),
            Context::Remote { .. } => format!("sudo mv '{}' '{}'", escape(src), escape(dst)),
        };
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
    fn issues_mv() {
        let mut mock = CommandMock::new();
        let ctx = Context::Local { user: "root".into() };
        mock.expect("mv '/boot/payload.tmp' '/boot/payload/2024-06-01'", ctx.clone(), Ok(String::new()));

        let mut commander = Commander::new(mock);
        commander
            .move_path("/boot/payload.tmp", "/boot/payload/2024-06-01", &ctx)
            .unwrap();
    }

    #[test]
    fn issues_sudo_mv_remote() {
        let mut mock = CommandMock::new();
        let ctx = Context::Remote {
            host: "backup.example".into(),
            user: Some("backupuser".into()),
            ssh_options: None,
        };
        mock.expect(
            "sudo mv '/mnt/backup/.tmp/2024-06-01_10-00-00_H' '/mnt/backup/2024-06-01_10-00-00_H'",
            ctx.clone(),
            Ok(String::new()),
        );

        let mut commander = Commander::new(mock);
        commander
            .move_path("/mnt/backup/.tmp/2024-06-01_10-00-00_H", "/mnt/backup/2024-06-01_10-00-00_H", &ctx)
            .unwrap();
    }
}
