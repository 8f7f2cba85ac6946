use super::Commander;
use crate::command::{Command, Context};
use crate::error::Result;

/// `btrfs send | btrfs receive`, piped through the Command Runner so the
/// same code path works whether either side is local or reached over ssh
/// (§4.6, §4.7): the runner's `run_piped` already treats each side as an
/// independent context.
pub trait CommandSendReceive {
    fn send_full(
        &mut self,
        src: &str,
        src_context: &Context,
        dst_parent_dir: &str,
        dst_context: &Context,
    ) -> Result<()>;

    fn send_delta(
        &mut self,
        parent: &str,
        src: &str,
        src_context: &Context,
        dst_parent_dir: &str,
        dst_context: &Context,
    ) -> Result<()>;
}

impl<T: Command> CommandSendReceive for Commander<T> {
    fn send_full(
        &mut self,
        src: &str,
        src_context: &Context,
        dst_parent_dir: &str,
        dst_context: &Context,
    ) -> Result<()> {
        let send = format!("btrfs send '{}'", escape(src));
        let receive = receive_command(dst_parent_dir, dst_context);
        self.exec
            .run_piped(&[(&send, src_context), (&receive, dst_context)])?;
        Ok(())
    }

    fn send_delta(
        &mut self,
        parent: &str,
        src: &str,
        src_context: &Context,
        dst_parent_dir: &str,
        dst_context: &Context,
    ) -> Result<()> {
        let send = format!("btrfs send -p '{}' '{}'", escape(parent), escape(src));
        let receive = receive_command(dst_parent_dir, dst_context);
        self.exec
            .run_piped(&[(&send, src_context), (&receive, dst_context)])?;
        Ok(())
    }
}

/// A remote receiver needs its own `sudo`: the ssh connection lands as
/// whatever user the target context names, not root (§4.7 RemoteNative).
fn receive_command(dst_parent_dir: &str, dst_context: &Context) -> String {
    let receive = format!("btrfs receive '{}'", escape(dst_parent_dir));
    match dst_context {
        Context::Remote { .. } => format!("sudo {}", receive),
        Context::Local { .. } => receive,
    }
}

fn escape(path: &str) -> String {
    path.replace('\'', "'\\''")
}
