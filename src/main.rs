//! CLI entry point: parses the argument tree defined in [`cli`], confirms
//! the invoking user can act as root, loads and validates the
//! configuration file, then dispatches to the library modules that do
//! the actual work. Exit code is 0 on success, 1 on any reported failure.
use anyhow::{anyhow, bail};
use btrfs_snapshot_manager::backup::transport::{Mechanism, Transport};
use btrfs_snapshot_manager::backup::BackupTarget;
use btrfs_snapshot_manager::bootloader::entry;
use btrfs_snapshot_manager::bootloader::payload::BootPayloadStore;
use btrfs_snapshot_manager::cli::output::{self, OutputFormat};
use btrfs_snapshot_manager::cli::{
    BackupCommand, Cli, ConfigCommand, SnapshotCommand, SystemdbootCommand, SystemdbootSnapshotCommand, TopCommand,
};
use btrfs_snapshot_manager::command::{CommandSystem, Context};
use btrfs_snapshot_manager::commands::{Commander, CommandWhoAmI};
use btrfs_snapshot_manager::config::{self, BackupTargetConfig, Configuration, Location, SubvolumeConfig, SystemdBootGlobalConfig, TransportKind};
use btrfs_snapshot_manager::error::ManagerError;
use btrfs_snapshot_manager::objects::Snapshot;
use btrfs_snapshot_manager::period::{self, Period};
use btrfs_snapshot_manager::retention::RetentionPolicy;
use btrfs_snapshot_manager::subvolume::Subvolume;
use btrfs_snapshot_manager::{logging, orchestrator};
use chrono::NaiveDateTime;
use clap::Parser;
use std::path::PathBuf;
use std::process;

type Commanded = Commander<CommandSystem>;

fn root_context() -> Context {
    Context::Local { user: "root".into() }
}

fn current_time() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

fn main() {
    process::exit(run());
}

fn run() -> i32 {
    let cli = Cli::parse();
    logging::init(cli.log_level);

    if let TopCommand::Config(args) = &cli.command {
        match &args.command {
            ConfigCommand::Check => {}
        }
        return match config::load_config(&cli.config) {
            Ok(_) => {
                println!("configuration is valid");
                0
            }
            Err(e) => {
                eprintln!("{e}");
                1
            }
        };
    }

    if let Err(e) = confirm_root() {
        eprintln!("{e}");
        return 1;
    }

    let config = match config::load_config(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            return 1;
        }
    };

    let format = OutputFormat::from_flags(cli.csv, cli.json);

    let result = match cli.command {
        TopCommand::Snapshot(args) => dispatch_snapshot(&config, args.command, format),
        TopCommand::Backup(args) => dispatch_backup(&config, args.command, format),
        TopCommand::Systemdboot(args) => dispatch_systemdboot(&config, args.command, format),
        TopCommand::Config(_) => unreachable!("Config::Check is handled before the root check"),
    };

    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{e}");
            1
        }
    }
}

/// §5: the invoking user must hold a passwordless sudo rule to root.
/// Checked once, up front, so every other failure is a reconciliation
/// failure rather than a privilege one.
fn confirm_root() -> anyhow::Result<()> {
    let mut commander: Commanded = Commander::default();
    let user = commander.whoami(&root_context())?;
    if user != "root" {
        bail!("sudo to root resolved to `{user}`, not `root`");
    }
    Ok(())
}

fn resolve_subvolume<'a>(config: &'a Configuration, path: &Option<PathBuf>) -> anyhow::Result<&'a SubvolumeConfig> {
    match path {
        Some(p) => config.subvolumes.iter().find(|s| &s.path == p).ok_or_else(|| anyhow!("no subvolume configured at {}", p.display())),
        None => match config.subvolumes.as_slice() {
            [one] => Ok(one),
            [] => Err(anyhow!("no subvolumes configured")),
            _ => Err(anyhow!("multiple subvolumes configured; specify a path")),
        },
    }
}

fn resolve_subvolumes<'a>(config: &'a Configuration, path: &Option<PathBuf>) -> anyhow::Result<Vec<&'a SubvolumeConfig>> {
    match path {
        Some(_) => resolve_subvolume(config, path).map(|s| vec![s]),
        None => Ok(config.subvolumes.iter().collect()),
    }
}

fn build_subvolume(cfg: &SubvolumeConfig) -> Subvolume<Commanded> {
    Subvolume::new(cfg.path.clone(), cfg.snapshots_path.clone(), Commander::default(), root_context())
}

fn build_backup_target(subvol: &SubvolumeConfig, cfg: &BackupTargetConfig) -> BackupTarget<Commanded> {
    let mechanism = match cfg.kind {
        TransportKind::Btrfs => Mechanism::Native,
        TransportKind::Rsync => Mechanism::Copy,
    };
    let (target_context, location) = match &cfg.location {
        Location::Local { path } => (root_context(), path.to_string_lossy().to_string()),
        Location::Remote { host, user, ssh_options, path } => (
            Context::Remote {
                host: host.clone(),
                user: user.clone(),
                ssh_options: ssh_options.clone(),
            },
            path.clone(),
        ),
    };
    let snapshots_dir = subvol.snapshots_path.clone().unwrap_or_else(|| subvol.path.join(".snapshots"));
    let transport = Transport::new(Commander::default(), mechanism, root_context(), target_context, snapshots_dir, location);
    BackupTarget {
        transport,
        retention: cfg.retention.clone(),
        minimum: cfg.minimum,
        last_sync_file: cfg.last_sync_file.clone(),
    }
}

fn build_boot_store(global: &SystemdBootGlobalConfig) -> BootPayloadStore<Commanded> {
    BootPayloadStore::new(global.boot_path.clone(), global.init_files.clone(), Commander::default(), root_context())
}

/// Whether any subvolume in the configuration manages bootloader
/// entries — i.e. whether a boot payload store exists to be kept in
/// sync at all (§3: "when a boot manager is attached").
fn boot_manager_configured(config: &Configuration) -> bool {
    config.subvolumes.iter().any(|s| !s.bootloader_entries.is_empty())
}

/// §4.10 step 1, wired with the boot payload store whenever this
/// subvolume has bootloader entries configured, so `create_due`
/// triggers `create_if_needed` on it per §3/§4.10.
fn create_due_with_boot_store(
    config: &Configuration,
    cfg: &SubvolumeConfig,
    subvol: &mut Subvolume<Commanded>,
    periods: &[Period],
    now: NaiveDateTime,
) -> anyhow::Result<Option<Snapshot>> {
    if cfg.bootloader_entries.is_empty() {
        Ok(orchestrator::create_due(subvol, periods, now, None)?)
    } else {
        let mut store = build_boot_store(&config.systemd_boot);
        store.list()?;
        Ok(orchestrator::create_due(subvol, periods, now, Some(&mut store))?)
    }
}

/// §3 lifecycle, second half of the cascade: after a snapshot deletion's
/// bootloader entries have been removed, garbage-collect boot payloads
/// against the live snapshots of *every* managed subvolume, not just the
/// one just acted on.
fn gc_boot_payloads_across_config(config: &Configuration) -> anyhow::Result<()> {
    if !boot_manager_configured(config) {
        return Ok(());
    }
    let mut live = Vec::new();
    for cfg in &config.subvolumes {
        let mut subvol = build_subvolume(cfg);
        subvol.list()?;
        live.extend(subvol.snapshots().iter().map(|s| s.timestamp));
    }
    let mut store = build_boot_store(&config.systemd_boot);
    store.list()?;
    let deleted = orchestrator::gc_boot_payloads(&mut store, &live)?;
    for payload in &deleted {
        log::info!("garbage-collected boot payload {}", payload.name);
    }
    Ok(())
}

fn entries_dir(global: &SystemdBootGlobalConfig) -> PathBuf {
    global.boot_path.join("loader/entries")
}

fn retention_label(retention: &RetentionPolicy) -> String {
    period::ALL_PERIODS
        .iter()
        .filter_map(|p| {
            let n = retention.limit(*p);
            if n > 0 {
                Some(format!("{}={}", p.name(), n))
            } else {
                None
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn location_label(location: &Location) -> String {
    match location {
        Location::Local { path } => path.display().to_string(),
        Location::Remote { host, user, path, .. } => match user {
            Some(u) => format!("{u}@{host}:{path}"),
            None => format!("{host}:{path}"),
        },
    }
}

fn periods_label(snapshot: &Snapshot) -> String {
    period::ALL_PERIODS.iter().filter(|p| snapshot.has_period(**p)).map(|p| p.tag()).collect()
}

fn print_snapshots(snapshots: &[Snapshot], format: OutputFormat) {
    let rows: Vec<Vec<String>> = snapshots.iter().map(|s| vec![s.name.clone(), s.timestamp.to_string(), periods_label(s)]).collect();
    let json_rows: Vec<_> = snapshots
        .iter()
        .map(|s| serde_json::json!({"name": s.name, "timestamp": s.timestamp.to_string(), "periods": periods_label(s)}))
        .collect();
    output::print_list(format, &["name", "timestamp", "periods"], &rows, &json_rows);
}

fn print_subvolume_config(cfg: &SubvolumeConfig, format: OutputFormat) {
    let retention = retention_label(&cfg.retention);
    let snapshots_path = cfg.snapshots_path.as_ref().map(|p| p.display().to_string()).unwrap_or_default();
    let rows = vec![vec![cfg.path.display().to_string(), snapshots_path, retention.clone()]];
    let json_rows = vec![serde_json::json!({
        "path": cfg.path.display().to_string(),
        "snapshots_path": cfg.snapshots_path.as_ref().map(|p| p.display().to_string()),
        "retention": retention,
    })];
    output::print_list(format, &["path", "snapshots_path", "retention"], &rows, &json_rows);
}

fn print_backup_config(cfg: &SubvolumeConfig, format: OutputFormat) {
    let rows: Vec<Vec<String>> = cfg
        .backup
        .iter()
        .enumerate()
        .map(|(i, t)| vec![i.to_string(), location_label(&t.location), retention_label(&t.retention), t.minimum.to_string()])
        .collect();
    let json_rows: Vec<_> = cfg
        .backup
        .iter()
        .enumerate()
        .map(|(i, t)| serde_json::json!({"id": i, "location": location_label(&t.location), "retention": retention_label(&t.retention), "minimum": t.minimum}))
        .collect();
    output::print_list(format, &["id", "location", "retention", "minimum"], &rows, &json_rows);
}

fn print_bootloader_config(cfg: &SubvolumeConfig, format: OutputFormat) {
    let rows: Vec<Vec<String>> = cfg.bootloader_entries.iter().map(|s| vec![s.entry.clone(), retention_label(&s.retention)]).collect();
    let json_rows: Vec<_> = cfg.bootloader_entries.iter().map(|s| serde_json::json!({"entry": s.entry, "retention": retention_label(&s.retention)})).collect();
    output::print_list(format, &["entry", "retention"], &rows, &json_rows);
}

fn dispatch_snapshot(config: &Configuration, command: SnapshotCommand, format: OutputFormat) -> anyhow::Result<()> {
    match command {
        SnapshotCommand::Init { path } => {
            let cfg = resolve_subvolume(config, &path)?;
            let mut subvol = build_subvolume(cfg);
            subvol.init_snapshots()?;
            println!("initialised snapshots directory for {}", cfg.path.display());
            Ok(())
        }
        SnapshotCommand::Create { path } => {
            let cfg = resolve_subvolume(config, &path)?;
            let mut subvol = build_subvolume(cfg);
            subvol.list()?;
            let periods: Vec<Period> = cfg.retention.periods().collect();
            match create_due_with_boot_store(config, cfg, &mut subvol, &periods, current_time())? {
                Some(s) => println!("created {}", s.name),
                None => println!("nothing due"),
            }
            Ok(())
        }
        SnapshotCommand::Delete { path, name } => {
            let cfg = resolve_subvolume(config, &path)?;
            let mut subvol = build_subvolume(cfg);
            subvol.list()?;
            let deleted = subvol.delete(&name)?;

            let dir = entries_dir(&config.systemd_boot);
            for spec in &cfg.bootloader_entries {
                match entry::delete(&dir, &spec.entry, &deleted.name) {
                    Ok(_) | Err(ManagerError::SnapshotNotFound(_)) => {}
                    Err(e) => log::warn!("failed to delete bootloader entry `{}` for {}: {}", spec.entry, deleted.name, e),
                }
            }
            gc_boot_payloads_across_config(config)?;

            println!("deleted {}", deleted.name);
            Ok(())
        }
        SnapshotCommand::List { path } => {
            let cfg = resolve_subvolume(config, &path)?;
            let mut subvol = build_subvolume(cfg);
            subvol.list()?;
            print_snapshots(subvol.snapshots(), format);
            Ok(())
        }
        SnapshotCommand::Cleanup { path } => {
            let cfg = resolve_subvolume(config, &path)?;
            let mut subvol = build_subvolume(cfg);
            subvol.list()?;
            let discarded = orchestrator::cleanup(&mut subvol, &cfg.retention)?;
            for s in &discarded {
                println!("deleted {}", s.name);
            }
            Ok(())
        }
        SnapshotCommand::Config { path } => {
            let cfg = resolve_subvolume(config, &path)?;
            print_subvolume_config(cfg, format);
            Ok(())
        }
        SnapshotCommand::Run { path } => {
            let subvols = resolve_subvolumes(config, &path)?;
            let now = current_time();
            let mut failed = false;
            for cfg in subvols {
                let mut subvol = build_subvolume(cfg);
                if let Err(e) = subvol.list() {
                    log::error!("snapshot list failed for {}: {}", cfg.path.display(), e);
                    failed = true;
                    continue;
                }
                let periods: Vec<Period> = cfg.retention.periods().collect();
                if let Err(e) = create_due_with_boot_store(config, cfg, &mut subvol, &periods, now) {
                    log::error!("snapshot create failed for {}: {}", cfg.path.display(), e);
                    failed = true;
                }
                if let Err(e) = orchestrator::cleanup(&mut subvol, &cfg.retention) {
                    log::error!("retention cleanup failed for {}: {}", cfg.path.display(), e);
                    failed = true;
                }
            }
            if failed {
                bail!("one or more subvolumes failed to run");
            }
            Ok(())
        }
    }
}

fn dispatch_backup(config: &Configuration, command: BackupCommand, format: OutputFormat) -> anyhow::Result<()> {
    match command {
        BackupCommand::Config { path } => {
            let cfg = resolve_subvolume(config, &path)?;
            print_backup_config(cfg, format);
            Ok(())
        }
        BackupCommand::List { path } => {
            let cfg = resolve_subvolume(config, &path)?;
            let mut rows = Vec::new();
            let mut json_rows = Vec::new();
            for (i, target_cfg) in cfg.backup.iter().enumerate() {
                let mut target = build_backup_target(cfg, target_cfg);
                let on_target = target.transport.list_target_snapshots().unwrap_or_default();
                let location = location_label(&target_cfg.location);
                rows.push(vec![i.to_string(), location.clone(), on_target.len().to_string()]);
                json_rows.push(serde_json::json!({"id": i, "location": location, "snapshot_count": on_target.len()}));
            }
            output::print_list(format, &["id", "location", "snapshots"], &rows, &json_rows);
            Ok(())
        }
        BackupCommand::Run { path, id } => {
            let cfg = resolve_subvolume(config, &path)?;
            let mut subvol = build_subvolume(cfg);
            subvol.list()?;
            let mut targets: Vec<BackupTarget<Commanded>> = cfg.backup.iter().map(|t| build_backup_target(cfg, t)).collect();
            let ids = if id.is_empty() { None } else { Some(id.as_slice()) };
            let results = orchestrator::reconcile_backups(&subvol, &mut targets, ids);

            let mut failed = false;
            for (i, result) in results {
                match result {
                    Ok(()) => println!("backup target {i} reconciled"),
                    Err(e) => {
                        eprintln!("backup target {i} failed: {e}");
                        failed = true;
                    }
                }
            }
            if failed {
                bail!("one or more backup targets failed");
            }
            Ok(())
        }
    }
}

fn dispatch_systemdboot(config: &Configuration, command: SystemdbootCommand, format: OutputFormat) -> anyhow::Result<()> {
    match command {
        SystemdbootCommand::Config { path } => {
            let cfg = resolve_subvolume(config, &path)?;
            print_bootloader_config(cfg, format);
            Ok(())
        }
        SystemdbootCommand::Create { path } => {
            let cfg = resolve_subvolume(config, &path)?;
            let mut subvol = build_subvolume(cfg);
            subvol.verify()?;
            subvol.list()?;
            let mut store = build_boot_store(&config.systemd_boot);
            store.list()?;
            let dir = entries_dir(&config.systemd_boot);

            let mut failed = false;
            for (entry_name, result) in orchestrator::reconcile_bootloader(&subvol, &cfg.bootloader_entries, &dir, store.payloads()) {
                match result {
                    Ok(outcome) => println!("{}: created {} entries", entry_name, outcome.created.len()),
                    Err(e) => {
                        eprintln!("{entry_name}: {e}");
                        failed = true;
                    }
                }
            }
            if failed {
                bail!("one or more bootloader entry specs failed to reconcile");
            }
            Ok(())
        }
        SystemdbootCommand::Delete { path, name } => {
            let cfg = resolve_subvolume(config, &path)?;
            let dir = entries_dir(&config.systemd_boot);
            let mut found = false;
            for spec in &cfg.bootloader_entries {
                match entry::delete(&dir, &spec.entry, &name) {
                    Ok(_) => {
                        found = true;
                        println!("deleted entry derived from `{}` for {}", spec.entry, name);
                    }
                    Err(ManagerError::SnapshotNotFound(_)) => {}
                    Err(e) => return Err(e.into()),
                }
            }
            if !found {
                bail!("no bootloader entry for snapshot `{name}`");
            }
            Ok(())
        }
        SystemdbootCommand::List { path } => {
            let cfg = resolve_subvolume(config, &path)?;
            let mut subvol = build_subvolume(cfg);
            subvol.list()?;
            let mut store = build_boot_store(&config.systemd_boot);
            store.list()?;
            let dir = entries_dir(&config.systemd_boot);

            let mut rows = Vec::new();
            let mut json_rows = Vec::new();
            for spec in &cfg.bootloader_entries {
                for status in entry::list(&dir, &spec.entry, subvol.snapshots(), store.payloads())? {
                    rows.push(vec![
                        spec.entry.clone(),
                        status.snapshot_name.clone(),
                        status.snapshot_exists.to_string(),
                        status.boot_snapshot_exists.to_string(),
                    ]);
                    json_rows.push(serde_json::json!({
                        "reference_entry": spec.entry,
                        "snapshot_name": status.snapshot_name,
                        "snapshot_exists": status.snapshot_exists,
                        "boot_snapshot_exists": status.boot_snapshot_exists,
                    }));
                }
            }
            output::print_list(format, &["reference_entry", "snapshot", "snapshot_exists", "boot_snapshot_exists"], &rows, &json_rows);
            Ok(())
        }
        SystemdbootCommand::Run { path } => {
            let subvols = resolve_subvolumes(config, &path)?;
            let mut store = build_boot_store(&config.systemd_boot);
            store.list()?;
            let dir = entries_dir(&config.systemd_boot);

            let mut failed = false;
            for cfg in subvols {
                let mut subvol = build_subvolume(cfg);
                if let Err(e) = subvol.verify() {
                    log::error!("subvolume verify failed for {}: {}", cfg.path.display(), e);
                    failed = true;
                    continue;
                }
                if let Err(e) = subvol.list() {
                    log::error!("snapshot list failed for {}: {}", cfg.path.display(), e);
                    failed = true;
                    continue;
                }
                for (entry_name, result) in orchestrator::reconcile_bootloader(&subvol, &cfg.bootloader_entries, &dir, store.payloads()) {
                    if let Err(e) = result {
                        log::error!("bootloader entry `{}` reconcile failed for {}: {}", entry_name, cfg.path.display(), e);
                        failed = true;
                    }
                }
            }
            if failed {
                bail!("one or more bootloader reconciliations failed");
            }
            Ok(())
        }
        SystemdbootCommand::Snapshot(args) => dispatch_systemdboot_snapshot(config, args.command, format),
    }
}

fn dispatch_systemdboot_snapshot(config: &Configuration, command: SystemdbootSnapshotCommand, format: OutputFormat) -> anyhow::Result<()> {
    let mut store = build_boot_store(&config.systemd_boot);
    store.list()?;

    match command {
        SystemdbootSnapshotCommand::Create => {
            let payload = store.create(current_time())?;
            println!("created {}", payload.name);
            Ok(())
        }
        SystemdbootSnapshotCommand::CreateNeeded => {
            match store.create_if_needed(current_time())? {
                Some(payload) => println!("created {}", payload.name),
                None => println!("nothing changed"),
            }
            Ok(())
        }
        SystemdbootSnapshotCommand::Delete { name } => {
            let payload = store.delete(&name)?;
            println!("deleted {}", payload.name);
            Ok(())
        }
        SystemdbootSnapshotCommand::DeleteUnneeded => {
            let mut live = Vec::new();
            for cfg in &config.subvolumes {
                let mut subvol = build_subvolume(cfg);
                subvol.list()?;
                live.extend(subvol.snapshots().iter().map(|s| s.timestamp));
            }
            let deleted = store.gc(&live)?;
            for payload in &deleted {
                println!("deleted {}", payload.name);
            }
            Ok(())
        }
        SystemdbootSnapshotCommand::List => {
            let rows: Vec<Vec<String>> = store.payloads().iter().map(|p| vec![p.name.clone(), p.timestamp.to_string()]).collect();
            let json_rows: Vec<_> = store.payloads().iter().map(|p| serde_json::json!({"name": p.name, "timestamp": p.timestamp.to_string()})).collect();
            output::print_list(format, &["name", "timestamp"], &rows, &json_rows);
            Ok(())
        }
    }
}
