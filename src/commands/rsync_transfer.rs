use super::Commander;
use crate::command::{Command, Context};
use crate::error::Result;

/// `rsync -a --delete [--link-dest=...] <src>/ <dst>` (§4.6, §4.7): rsync
/// always runs on the local host (it dials out over its own ssh
/// transport), so `local_context` is the invoking user while `target`
/// only ever shapes the destination spec and `-e ssh`/`--rsync-path`
/// flags.
pub trait CommandRsyncTransfer {
    fn rsync_full(&mut self, local_context: &Context, src_dir: &str, target: &Context, dst_path: &str) -> Result<()>;

    fn rsync_delta(
        &mut self,
        local_context: &Context,
        src_dir: &str,
        target: &Context,
        dst_path: &str,
        link_dest: &str,
    ) -> Result<()>;
}

impl<T: Command> CommandRsyncTransfer for Commander<T> {
    fn rsync_full(&mut self, local_context: &Context, src_dir: &str, target: &Context, dst_path: &str) -> Result<()> {
        let command = format!("rsync -a --delete {} {}", source_spec(src_dir), destination_spec(target, dst_path));
        self.exec.run(&command, local_context)?;
        Ok(())
    }

    fn rsync_delta(
        &mut self,
        local_context: &Context,
        src_dir: &str,
        target: &Context,
        dst_path: &str,
        link_dest: &str,
    ) -> Result<()> {
        let command = format!(
            "rsync -a --delete --link-dest='{}' {} {}",
            escape(link_dest),
            source_spec(src_dir),
            destination_spec(target, dst_path)
        );
        self.exec.run(&command, local_context)?;
        Ok(())
    }
}

fn source_spec(src_dir: &str) -> String {
    let trimmed = src_dir.trim_end_matches('/');
    format!("'{}/'", escape(trimmed))
}

fn destination_spec(target: &Context, dst_path: &str) -> String {
    match target {
        Context::Local { .. } => format!("'{}'", escape(dst_path)),
        Context::Remote { host, user, ssh_options } => {
            let ssh_flag = match ssh_options {
                Some(opts) => format!("-e 'ssh {}' ", opts),
                None => String::new(),
            };
            let host_spec = match user {
                Some(user) => format!("{}@{}", user, host),
                None => host.clone(),
            };
            format!("--rsync-path=\"sudo rsync\" {}'{}:{}'", ssh_flag, host_spec, escape(dst_path))
        }
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
    fn full_transfer_to_local_target() {
        let mut mock = CommandMock::new();
        let local = Context::Local { user: "root".into() };
        mock.expect(
            "rsync -a --delete '/srv/data/.snapshots/2024-06-01_10-00-00_H/' '/mnt/backup/2024-06-01_10-00-00_H'",
            local.clone(),
            Ok(String::new()),
        );

        let mut commander = Commander::new(mock);
        commander
            .rsync_full(
                &local,
                "/srv/data/.snapshots/2024-06-01_10-00-00_H",
                &local,
                "/mnt/backup/2024-06-01_10-00-00_H",
            )
            .unwrap();
    }

    #[test]
    fn delta_transfer_to_remote_target_uses_link_dest_and_ssh() {
        let mut mock = CommandMock::new();
        let local = Context::Local { user: "root".into() };
        let remote = Context::Remote {
            host: "backup.example".into(),
            user: Some("backupuser".into()),
            ssh_options: Some("-p 2222".into()),
        };
        mock.expect(
            "rsync -a --delete --link-dest='/mnt/backup/2024-06-01_09-00-00_H' '/srv/data/.snapshots/2024-06-01_10-00-00_H/' --rsync-path=\"sudo rsync\" -e 'ssh -p 2222' 'backupuser@backup.example:/mnt/backup/2024-06-01_10-00-00_H'",
            local.clone(),
            Ok(String::new()),
        );

        let mut commander = Commander::new(mock);
        commander
            .rsync_delta(
                &local,
                "/srv/data/.snapshots/2024-06-01_10-00-00_H",
                &remote,
                "/mnt/backup/2024-06-01_10-00-00_H",
                "/mnt/backup/2024-06-01_09-00-00_H",
            )
            .unwrap();
    }
}
