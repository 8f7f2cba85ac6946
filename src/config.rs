//! Configuration Loader (§6, §9): strict YAML parsing into raw schema
//! structs, followed by a declarative validation pass that walks the
//! raw tree and yields every violation with a `/a/b/c` path rather than
//! failing on the first one.
use crate::error::{ManagerError, Result};
use crate::period::Period;
use crate::retention::RetentionPolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};


/// One schema violation, named by its path in the document (e.g.
/// `/subvolumes/0/backup/1/retention`) per §6's validation contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Collects violations across an entire document instead of stopping at
/// the first one (§9: "a declarative schema walker ... yields all
/// errors with a path").
#[derive(Default)]
struct Validator {
    errors: Vec<ConfigError>,
}

impl Validator {
    fn fail(&mut self, path: &str, message: impl Into<String>) {
        self.errors.push(ConfigError {
            path: path.to_string(),
            message: message.into(),
        });
    }

    /// A required scalar field: records a violation and returns `None`
    /// if absent, so the caller can keep validating siblings instead of
    /// aborting.
    fn require<T>(&mut self, path: &str, field: Option<T>) -> Option<T> {
        match field {
            Some(v) => Some(v),
            None => {
                self.fail(path, "required field is missing");
                None
            }
        }
    }

    /// A "mutually exclusive group (min, max, members)" marker (§9):
    /// records how many of the named members are present and flags a
    /// violation if that count falls outside `[min, max]`. Returns the
    /// count so the caller can decide how to proceed with extraction.
    fn mutually_exclusive(&mut self, path: &str, members: &[(&str, bool)], min: usize, max: usize) -> usize {
        let present = members.iter().filter(|(_, is_set)| *is_set).count();
        let names: Vec<&str> = members.iter().map(|(name, _)| *name).collect();
        if present < min {
            self.fail(path, format!("requires at least {} of {:?} to be set", min, names));
        } else if present > max {
            self.fail(path, format!("allows at most {} of {:?} to be set", max, names));
        }
        present
    }
}

// --- Raw schema: one struct per YAML shape in §6, `deny_unknown_fields`
// so unknown keys are rejected at deserialization time. ---

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    subvolumes: Option<Vec<RawSubvolume>>,
    #[serde(rename = "systemd-boot")]
    systemd_boot: Option<RawSystemdBootGlobal>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSubvolume {
    path: Option<String>,
    #[serde(rename = "snapshots-path")]
    snapshots_path: Option<String>,
    retention: Option<RawPeriodRetention>,
    backup: Option<Vec<RawBackupTarget>>,
    #[serde(rename = "systemd-boot")]
    systemd_boot: Option<Vec<RawBootloaderSpec>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawPeriodRetention {
    hourly: Option<u32>,
    daily: Option<u32>,
    weekly: Option<u32>,
    monthly: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawBackupRetention {
    hourly: Option<u32>,
    daily: Option<u32>,
    weekly: Option<u32>,
    monthly: Option<u32>,
    minimum: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBackupTarget {
    #[serde(rename = "type")]
    kind: Option<String>,
    last_sync_file: Option<String>,
    local: Option<RawLocalLocation>,
    remote: Option<RawRemoteLocation>,
    retention: Option<RawBackupRetention>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLocalLocation {
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRemoteLocation {
    host: Option<String>,
    user: Option<String>,
    #[serde(rename = "ssh-options")]
    ssh_options: Option<String>,
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBootloaderSpec {
    entry: Option<String>,
    retention: Option<RawPeriodRetention>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawSystemdBootGlobal {
    #[serde(rename = "boot-path")]
    boot_path: Option<String>,
    #[serde(rename = "init-files")]
    init_files: Option<Vec<String>>,
}

// --- Validated record: what the rest of the crate consumes. ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    pub subvolumes: Vec<SubvolumeConfig>,
    pub systemd_boot: SystemdBootGlobalConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubvolumeConfig {
    pub path: PathBuf,
    pub snapshots_path: Option<PathBuf>,
    pub retention: RetentionPolicy,
    pub backup: Vec<BackupTargetConfig>,
    pub bootloader_entries: Vec<BootloaderEntrySpecConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportKind {
    Btrfs,
    Rsync,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Local {
        path: PathBuf,
    },
    Remote {
        host: String,
        user: Option<String>,
        ssh_options: Option<String>,
        path: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupTargetConfig {
    pub kind: TransportKind,
    pub location: Location,
    pub retention: RetentionPolicy,
    pub minimum: u32,
    pub last_sync_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootloaderEntrySpecConfig {
    pub entry: String,
    pub retention: RetentionPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemdBootGlobalConfig {
    pub boot_path: PathBuf,
    pub init_files: Option<Vec<String>>,
}

impl Default for SystemdBootGlobalConfig {
    fn default() -> Self {
        SystemdBootGlobalConfig {
            boot_path: PathBuf::from("/boot"),
            init_files: None,
        }
    }
}

/// Loads and validates the configuration file at `path` (default
/// `/etc/btrfs-snapshot-manager/config.yml`, §6). Strict: unknown keys
/// are a deserialization error; every remaining schema violation is
/// collected and reported together.
pub fn load_config(path: &Path) -> Result<Configuration> {
    let contents = std::fs::read_to_string(path)?;
    let raw: RawConfig = serde_yaml::from_str(&contents)?;
    validate(raw).map_err(|errors| {
        let message = errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; ");
        ManagerError::ConfigInvalid {
            path: path.to_string_lossy().to_string(),
            message,
        }
    })
}

fn period_retention(r: RawPeriodRetention) -> RetentionPolicy {
    let mut limits = Vec::new();
    if let Some(n) = r.hourly {
        limits.push((Period::Hourly, n));
    }
    if let Some(n) = r.daily {
        limits.push((Period::Daily, n));
    }
    if let Some(n) = r.weekly {
        limits.push((Period::Weekly, n));
    }
    if let Some(n) = r.monthly {
        limits.push((Period::Monthly, n));
    }
    RetentionPolicy::new(limits)
}

fn validate(raw: RawConfig) -> std::result::Result<Configuration, Vec<ConfigError>> {
    let mut v = Validator::default();

    let mut subvolumes = Vec::new();
    for (i, raw_subvol) in raw.subvolumes.unwrap_or_default().into_iter().enumerate() {
        let base = format!("/subvolumes/{}", i);
        if let Some(subvol) = validate_subvolume(&mut v, &base, raw_subvol) {
            subvolumes.push(subvol);
        }
    }

    let systemd_boot = validate_systemd_boot_global(&mut v, "/systemd-boot", raw.systemd_boot.unwrap_or_default());

    if v.errors.is_empty() {
        Ok(Configuration { subvolumes, systemd_boot })
    } else {
        Err(v.errors)
    }
}

fn validate_subvolume(v: &mut Validator, base: &str, raw: RawSubvolume) -> Option<SubvolumeConfig> {
    let path = v.require(&format!("{}/path", base), raw.path).map(PathBuf::from)?;

    let raw_retention = raw.retention.unwrap_or_default();
    let has_any_period = raw_retention.hourly.is_some()
        || raw_retention.daily.is_some()
        || raw_retention.weekly.is_some()
        || raw_retention.monthly.is_some();
    if !has_any_period {
        v.fail(&format!("{}/retention", base), "must set at least one period");
    }
    let retention = period_retention(raw_retention);

    let mut backup = Vec::new();
    for (i, raw_target) in raw.backup.unwrap_or_default().into_iter().enumerate() {
        let target_base = format!("{}/backup/{}", base, i);
        if let Some(target) = validate_backup_target(v, &target_base, raw_target) {
            backup.push(target);
        }
    }

    let mut bootloader_entries = Vec::new();
    for (i, raw_spec) in raw.systemd_boot.unwrap_or_default().into_iter().enumerate() {
        let spec_base = format!("{}/systemd-boot/{}", base, i);
        if let Some(spec) = validate_bootloader_spec(v, &spec_base, raw_spec) {
            bootloader_entries.push(spec);
        }
    }

    Some(SubvolumeConfig {
        path,
        snapshots_path: raw.snapshots_path.map(PathBuf::from),
        retention,
        backup,
        bootloader_entries,
    })
}

fn validate_backup_target(v: &mut Validator, base: &str, raw: RawBackupTarget) -> Option<BackupTargetConfig> {
    let kind = match raw.kind.as_deref() {
        Some("btrfs") => Some(TransportKind::Btrfs),
        Some("rsync") => Some(TransportKind::Rsync),
        Some(other) => {
            v.fail(&format!("{}/type", base), format!("must be \"btrfs\" or \"rsync\", got \"{}\"", other));
            None
        }
        None => {
            v.fail(&format!("{}/type", base), "required field is missing");
            None
        }
    }?;

    let group_count = v.mutually_exclusive(base, &[("local", raw.local.is_some()), ("remote", raw.remote.is_some())], 1, 1);
    let location = if group_count == 0 {
        None
    } else {
        match (raw.local, raw.remote) {
            (Some(local), _) => {
                let path = v.require(&format!("{}/local/path", base), local.path)?;
                Some(Location::Local { path: PathBuf::from(path) })
            }
            (None, Some(remote)) => {
                let path = v.require(&format!("{}/remote/path", base), remote.path)?;
                let host = v.require(&format!("{}/remote/host", base), remote.host)?;
                Some(Location::Remote {
                    host,
                    user: remote.user,
                    ssh_options: remote.ssh_options,
                    path,
                })
            }
            (None, None) => None,
        }
    };
    let location = location?;

    let raw_retention = raw.retention.unwrap_or_default();
    let minimum = raw_retention.minimum.unwrap_or(0);
    let has_any_period =
        raw_retention.hourly.is_some() || raw_retention.daily.is_some() || raw_retention.weekly.is_some() || raw_retention.monthly.is_some();
    if !has_any_period && minimum == 0 {
        v.fail(&format!("{}/retention", base), "must set at least one period or a minimum");
    }
    let retention = period_retention(RawPeriodRetention {
        hourly: raw_retention.hourly,
        daily: raw_retention.daily,
        weekly: raw_retention.weekly,
        monthly: raw_retention.monthly,
    });

    Some(BackupTargetConfig {
        kind,
        location,
        retention,
        minimum,
        last_sync_file: raw.last_sync_file,
    })
}

fn validate_bootloader_spec(v: &mut Validator, base: &str, raw: RawBootloaderSpec) -> Option<BootloaderEntrySpecConfig> {
    let entry = v.require(&format!("{}/entry", base), raw.entry)?;
    let retention = period_retention(raw.retention.unwrap_or_default());
    Some(BootloaderEntrySpecConfig { entry, retention })
}

fn validate_systemd_boot_global(_v: &mut Validator, _base: &str, raw: RawSystemdBootGlobal) -> SystemdBootGlobalConfig {
    SystemdBootGlobalConfig {
        boot_path: raw.boot_path.map(PathBuf::from).unwrap_or_else(|| PathBuf::from("/boot")),
        init_files: raw.init_files,
    }
}
