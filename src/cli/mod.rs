//! CLI Surface (§6): the subcommand tree parsed with `clap`'s derive
//! API, one enum per subcommand group. Argument parsing only — dispatch
//! lives in `main`/`orchestrator`, structured rendering in
//! [`output`].
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/btrfs-snapshot-manager/config.yml";

#[derive(Parser, Debug)]
#[command(name = "btrfs-snapshot-manager", version, about = "Periodic btrfs snapshots, bounded retention, backup mirroring and bootloader reconciliation")]
pub struct Cli {
    /// 0=trace .. 4=error, 5 disables logging entirely.
    #[arg(long, default_value_t = 2, global = true)]
    pub log_level: u8,

    /// Render list output as CSV instead of a table.
    #[arg(long, global = true, conflicts_with = "json")]
    pub csv: bool,

    /// Render list output as JSON instead of a table.
    #[arg(long, global = true)]
    pub json: bool,

    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: TopCommand,
}

#[derive(Subcommand, Debug)]
pub enum TopCommand {
    /// Manage a subvolume's own snapshots (C3, C4, C5).
    Snapshot(SnapshotArgs),
    /// Manage a subvolume's backup targets (C6, C7).
    Backup(BackupArgs),
    /// Validate the configuration file.
    Config(ConfigArgs),
    /// Manage systemd-boot entries and boot payloads (C8, C9).
    Systemdboot(SystemdbootArgs),
}

#[derive(Parser, Debug)]
pub struct SnapshotArgs {
    #[command(subcommand)]
    pub command: SnapshotCommand,
}

#[derive(Subcommand, Debug)]
pub enum SnapshotCommand {
    /// Creates the snapshots directory as a native subvolume.
    Init { path: Option<PathBuf> },
    /// Takes one snapshot tagged with every currently-due period.
    Create { path: Option<PathBuf> },
    /// Deletes one snapshot by name, cascading to its bootloader entries.
    Delete { path: Option<PathBuf>, name: String },
    /// Lists a subvolume's snapshots.
    List { path: Option<PathBuf> },
    /// Applies the retention policy, deleting everything outside the keep set.
    Cleanup { path: Option<PathBuf> },
    /// Prints the effective configuration for a subvolume.
    Config { path: Option<PathBuf> },
    /// Runs schedule → create → cleanup for one subvolume (or all, if omitted).
    Run { path: Option<PathBuf> },
}

#[derive(Parser, Debug)]
pub struct BackupArgs {
    #[command(subcommand)]
    pub command: BackupCommand,
}

#[derive(Subcommand, Debug)]
pub enum BackupCommand {
    /// Prints the effective backup target configuration for a subvolume.
    Config { path: Option<PathBuf> },
    /// Lists a subvolume's configured backup targets and their state.
    List { path: Option<PathBuf> },
    /// Reconciles one or more backup targets (all, unless `--id` is given).
    Run {
        path: Option<PathBuf>,
        #[arg(long = "id")]
        id: Vec<usize>,
    },
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Loads and validates the configuration file, reporting every violation.
    Check,
}

#[derive(Parser, Debug)]
pub struct SystemdbootArgs {
    #[command(subcommand)]
    pub command: SystemdbootCommand,
}

#[derive(Subcommand, Debug)]
pub enum SystemdbootCommand {
    /// Prints the effective bootloader entry configuration for a subvolume.
    Config { path: Option<PathBuf> },
    /// Creates any missing bootloader entries for the current keep set.
    Create { path: Option<PathBuf> },
    /// Deletes one bootloader entry by the snapshot name it was derived from.
    Delete { path: Option<PathBuf>, name: String },
    /// Lists a subvolume's bootloader entries.
    List { path: Option<PathBuf> },
    /// Reconciles bootloader entries for one subvolume (or all, if omitted).
    Run { path: Option<PathBuf> },
    /// Manages the boot payload store (C9).
    Snapshot(SystemdbootSnapshotArgs),
}

#[derive(Parser, Debug)]
pub struct SystemdbootSnapshotArgs {
    #[command(subcommand)]
    pub command: SystemdbootSnapshotCommand,
}

#[derive(Subcommand, Debug)]
pub enum SystemdbootSnapshotCommand {
    /// Archives the designated init files unconditionally.
    Create,
    /// Archives the designated init files only if they changed since the last payload.
    CreateNeeded,
    /// Deletes one boot payload by name.
    Delete { name: String },
    /// Deletes every payload not referenced by a live snapshot.
    DeleteUnneeded,
    /// Lists boot payloads.
    List,
}
