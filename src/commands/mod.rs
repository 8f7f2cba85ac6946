//! Thin, per-operation wrappers around the Command Runner (§4.3, §4.6,
//! §4.7, §4.8, §4.9): one file per external binary invocation, each
//! exposing a small trait implemented for `Commander<T>`. One file per
//! command mirrors the teacher's layout; callers depend on the trait,
//! tests depend on `Commander<CommandMock>`.
mod copy_file;
mod diff_files;
mod ensure_remote_dir;
mod list_remote_dir;
mod move_path;
mod remove_recursive;
mod rsync_transfer;
mod send_receive;
mod subvolume_create;
mod subvolume_delete;
mod subvolume_show;
mod subvolume_snapshot;
mod touch_file;
mod whoami;

pub use copy_file::CommandCopyFile;
pub use diff_files::CommandDiffFiles;
pub use ensure_remote_dir::CommandEnsureRemoteDir;
pub use list_remote_dir::CommandListRemoteDir;
pub use move_path::CommandMovePath;
pub use remove_recursive::CommandRemoveRecursive;
pub use rsync_transfer::CommandRsyncTransfer;
pub use send_receive::CommandSendReceive;
pub use subvolume_create::CommandSubvolumeCreate;
pub use subvolume_delete::CommandSubvolumeDelete;
pub use subvolume_show::CommandSubvolumeShow;
pub use subvolume_snapshot::CommandSubvolumeSnapshot;
pub use touch_file::CommandTouchFile;
pub use whoami::CommandWhoAmI;

use crate::command::{Command, CommandSystem};

pub trait Commands:
    CommandSubvolumeShow
    + CommandSubvolumeCreate
    + CommandSubvolumeSnapshot
    + CommandSubvolumeDelete
    + CommandSendReceive
    + CommandListRemoteDir
    + CommandEnsureRemoteDir
    + CommandRsyncTransfer
    + CommandMovePath
    + CommandRemoveRecursive
    + CommandDiffFiles
    + CommandCopyFile
    + CommandTouchFile
    + CommandWhoAmI
{
}

pub struct Commander<T: Command> {
    pub(crate) exec: T,
}

impl<T: Command> Commander<T> {
    pub fn new(exec: T) -> Self {
        Commander { exec }
    }
}

impl Default for Commander<CommandSystem> {
    fn default() -> Self {
        Commander {
            exec: CommandSystem::default(),
        }
    }
}

impl<T: Command> Commands for Commander<T> {}
