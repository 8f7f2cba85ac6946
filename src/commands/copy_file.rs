use super::Commander;
use crate::command::{Command, Context};
use crate::error::Result;

/// `cp` (§4.9): copies a kernel/initramfs file into a boot payload
/// directory being assembled.
pub trait CommandCopyFile {
    fn copy_file(&mut self, src: &str, dst: &str, context: &Context) -> Result<()>;
}

impl<T: Command> CommandCopyFile for Commander<T> {
    fn copy_file(&mut self, src: &str, dst: &str, context: &Context) -> Result<()> {
        let command = format!("cp '{}' '{}'", escape(src), escape(dst));
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
    fn issues_cp() {
        let mut mock = CommandMock::new();
        let ctx = Context::Local { user: "root".into() };
        mock.expect("cp '/boot/vmlinuz' '/boot/payload.tmp/vmlinuz'", ctx.clone(), Ok(String::new()));

        let mut commander = Commander::new(mock);
        commander
            .copy_file("/boot/vmlinuz", "/boot/payload.tmp/vmlinuz", &ctx)
            .unwrap();
    }
}
