//! WSL host pairing.
//!
//! Inside WSL the Windows side keeps its own hosts file. The subsystem
//! announces its current address there (and locally) under the `#WSL` tag so
//! Windows programs can reach it by name, and the member block is mirrored
//! into the Windows file as well.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::{PairedConfig, SyncConfig};
use crate::error::{Result, SyncError};
use crate::hosts_file::{HostFileTarget, LineEnding};
use crate::util::{interface_ipv4, short_hostname};

/// Tag marking the self-announcement block.
pub const ANNOUNCE_TAG: &str = "WSL";

/// Default location of the Windows hosts file as seen from WSL.
pub const DEFAULT_WINDOWS_HOSTS: &str = "/mnt/c/Windows/System32/drivers/etc/hosts";

const OSRELEASE: &str = "/proc/sys/kernel/osrelease";

/// Who this machine is, resolved once per cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    /// Local short hostname.
    pub hostname: String,
    /// The Windows side, when running inside WSL.
    pub paired: Option<PairedHost>,
}

/// The Windows host paired with this WSL instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairedHost {
    /// The Windows hosts file.
    pub hosts_file: PathBuf,
    /// Windows computer name.
    pub host_name: String,
    /// Name announced for the subsystem.
    pub subsystem_name: String,
    /// Current IPv4 address of the subsystem.
    pub address: Ipv4Addr,
}

impl PairedHost {
    /// The Windows hosts file as a `\r\n` sync target carrying the announcement.
    #[must_use]
    pub fn target(&self) -> HostFileTarget {
        HostFileTarget::new("windows", &self.hosts_file)
            .with_line_ending(LineEnding::CrLf)
            .with_announcement()
    }

    /// The announcement line, without header.
    #[must_use]
    pub fn announcement(&self) -> String {
        format!("{} {} #{ANNOUNCE_TAG}", self.address, self.subsystem_name)
    }
}

/// Returns `true` when the kernel or environment identifies this as WSL.
#[must_use]
pub fn is_wsl() -> bool {
    std::env::var_os("WSL_DISTRO_NAME").is_some()
        || std::fs::read_to_string(OSRELEASE)
            .is_ok_and(|r| r.to_ascii_lowercase().contains("microsoft"))
}

/// Resolves the local identity and, when pairing applies, the Windows side.
///
/// # Errors
///
/// Returns [`SyncError::DependencyMissing`] if pairing is active but
/// `cmd.exe`, the Windows hosts file or a subsystem IPv4 address is
/// unavailable.
pub fn detect(config: &SyncConfig) -> Result<HostIdentity> {
    let hostname = short_hostname().unwrap_or_default();
    let paired = match config.paired.enabled {
        Some(false) => None,
        Some(true) => Some(detect_paired(&config.paired, &hostname)?),
        None if is_wsl() => Some(detect_paired(&config.paired, &hostname)?),
        None => None,
    };
    Ok(HostIdentity { hostname, paired })
}

fn detect_paired(config: &PairedConfig, hostname: &str) -> Result<PairedHost> {
    if !config.hosts_file.exists() {
        return Err(SyncError::DependencyMissing {
            tool: config.hosts_file.display().to_string(),
        });
    }

    let host_name = match &config.host_name {
        Some(name) => name.clone(),
        None => windows_hostname()?,
    };

    let subsystem_name = config
        .subsystem_name
        .clone()
        .or_else(|| std::env::var("WSL_DISTRO_NAME").ok())
        .unwrap_or_else(|| hostname.to_string());

    let address = interface_ipv4(config.interface.as_deref()).ok_or_else(|| {
        SyncError::DependencyMissing {
            tool: format!(
                "IPv4 address on interface {}",
                config.interface.as_deref().unwrap_or("(any)")
            ),
        }
    })?;

    tracing::debug!(
        windows = %host_name,
        subsystem = %subsystem_name,
        address = %address,
        "Detected paired Windows host"
    );

    Ok(PairedHost {
        hosts_file: config.hosts_file.clone(),
        host_name,
        subsystem_name,
        address,
    })
}

/// Asks Windows for its computer name via `cmd.exe /c hostname`.
fn windows_hostname() -> Result<String> {
    let output = Command::new("cmd.exe")
        .args(["/c", "hostname"])
        .current_dir(cmd_working_dir())
        .output()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SyncError::DependencyMissing {
                tool: "cmd.exe".to_string(),
            },
            _ => SyncError::Io(e),
        })?;

    let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !output.status.success() || name.is_empty() {
        return Err(SyncError::DependencyMissing {
            tool: "cmd.exe hostname".to_string(),
        });
    }
    Ok(name)
}

/// `cmd.exe` complains about UNC paths when started from a Linux directory.
fn cmd_working_dir() -> &'static Path {
    let windows_root = Path::new("/mnt/c");
    if windows_root.is_dir() {
        windows_root
    } else {
        Path::new("/")
    }
}

/// Writes the announcement block into `local` and the Windows hosts file.
///
/// Failures are per file: each result is returned with its target label.
pub fn announce(paired: &PairedHost, local: &HostFileTarget) -> Vec<(String, Result<bool>)> {
    let lines = [paired.announcement()];
    [local.clone(), paired.target()]
        .into_iter()
        .map(|target| {
            let result = target.sync_block(ANNOUNCE_TAG, &lines);
            if let Err(e) = &result {
                tracing::warn!(
                    target_file = %target.label,
                    error = %e,
                    "Failed to write WSL announcement"
                );
            }
            (target.label, result)
        })
        .collect()
}
