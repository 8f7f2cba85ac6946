use super::Commander;
use crate::command::{Command, Context};
use crate::error::Result;

/// `diff -q` (§4.9): compares a candidate kernel/initramfs file against
/// the most recently stored payload so a bit-identical kernel doesn't
/// get archived a second time.
pub trait CommandDiffFiles {
    fn files_differ(&mut self, a: &str, b: &str, context: &Context) -> Result<bool>;
}

impl<T: Command> CommandDiffFiles for Commander<T> {
    fn files_differ(&mut self, a: &str, b: &str, context: &Context) -> Result<bool> {
        let command = format!("diff -q '{}' '{}' > /dev/null; echo $?", escape(a), escape(b));
        let output = self.exec.run(&command, context)?;
        Ok(output.trim() != "0")
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
    fn identical_files_report_no_difference() {
        let mut mock = CommandMock::new();
        let ctx = Context::Local { user: "root".into() };
        mock.expect(
            "diff -q '/boot/vmlinuz' '/boot/payload/2024-06-01/vmlinuz' > /dev/null; echo $?",
            ctx.clone(),
            Ok("0".to_string()),
        );

        let mut commander = Commander::new(mock);
        let differ = commander
            .files_differ("/boot/vmlinuz", "/boot/payload/2024-06-01/vmlinuz", &ctx)
            .unwrap();
        assert!(!differ);
    }

    #[test]
    fn differing_files_report_a_difference() {
        let mut mock = CommandMock::new();
        let ctx = Context::Local { user: "root".into() };
        mock.expect(
            "diff -q '/boot/vmlinuz' '/boot/payload/2024-05-01/vmlinuz' > /dev/null; echo $?",
            ctx.clone(),
            Ok("1".to_string()),
        );

        let mut commander = Commander::new(mock);
        let differ = commander
            .files_differ("/boot/vmlinuz", "/boot/payload/2024-05-01/vmlinuz", &ctx)
            .unwrap();
        assert!(differ);
    }
}
