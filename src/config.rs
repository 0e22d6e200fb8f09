//! Sync configuration.
//!
//! Settings come from a TOML file, with the credentials and network
//! selection overridable from the environment or command line. The result
//! is an immutable [`SyncConfig`] built once per process.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, SyncError};
use crate::membership::DEFAULT_API_URL;
use crate::paired::{ANNOUNCE_TAG, DEFAULT_WINDOWS_HOSTS};
use crate::util::{is_world_or_group_readable, restrict_permissions};

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/zerotier-hosts/config.toml";

/// Default tag for the member block.
pub const DEFAULT_TAG: &str = "ZeroTier";

const DEFAULT_HOSTS_FILE: &str = "/etc/hosts";
const DEFAULT_INTERVAL_SECS: u64 = 300;

/// Template written by [`write_template`].
const TEMPLATE: &str = r##"# zerotier-hosts configuration
#
# ZeroTier Central API token and the network to mirror.
api_key = ""
network_id = ""

# Domain appended to member names in the filter list.
domain = "zt.lan"

# Seconds between cycles in `watch` mode.
interval_secs = 300

hosts_file = "/etc/hosts"

# DNS filter custom list, e.g. Pi-hole.
# filter_list = "/etc/pihole/custom.list"

[paired]
# Pairing with the Windows host is detected automatically inside WSL.
# enabled = true
# hosts_file = "/mnt/c/Windows/System32/drivers/etc/hosts"
# host_name = "DESKTOP-1234"
# subsystem_name = "Ubuntu"
# interface = "eth0"
"##;

/// Windows host pairing settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PairedConfig {
    /// Force pairing on or off; `None` detects WSL.
    pub enabled: Option<bool>,
    /// Windows hosts file as seen from WSL.
    pub hosts_file: PathBuf,
    /// Windows computer name; queried from `cmd.exe` when unset.
    pub host_name: Option<String>,
    /// Name announced for this subsystem.
    pub subsystem_name: Option<String>,
    /// Interface whose IPv4 address is announced.
    pub interface: Option<String>,
}

impl Default for PairedConfig {
    fn default() -> Self {
        Self {
            enabled: None,
            hosts_file: PathBuf::from(DEFAULT_WINDOWS_HOSTS),
            host_name: None,
            subsystem_name: None,
            interface: None,
        }
    }
}

impl PairedConfig {
    /// Forces pairing on or off.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Overrides the Windows hosts file path.
    #[must_use]
    pub fn with_hosts_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.hosts_file = path.into();
        self
    }

    /// Sets the Windows computer name.
    #[must_use]
    pub fn with_host_name(mut self, name: impl Into<String>) -> Self {
        self.host_name = Some(name.into());
        self
    }

    /// Sets the announced subsystem name.
    #[must_use]
    pub fn with_subsystem_name(mut self, name: impl Into<String>) -> Self {
        self.subsystem_name = Some(name.into());
        self
    }

    /// Sets the interface to read the subsystem address from.
    #[must_use]
    pub fn with_interface(mut self, name: impl Into<String>) -> Self {
        self.interface = Some(name.into());
        self
    }
}

/// Everything a sync cycle needs.
///
/// # Example
///
/// ```
/// use zerotier_hosts::SyncConfig;
///
/// let config = SyncConfig::new("token", "8056c2e21c000001", "zt.lan")
///     .with_filter_list("/etc/pihole/custom.list");
///
/// assert_eq!(config.hosts_file.to_str(), Some("/etc/hosts"));
/// assert_eq!(config.tag, "ZeroTier");
/// ```
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// ZeroTier Central API token.
    pub api_key: String,
    /// Network whose members are mirrored.
    pub network_id: String,
    /// Domain suffix for FQDN entries.
    pub domain: String,
    /// API base URL.
    pub api_url: String,
    /// Pause between cycles in `watch` mode.
    pub interval: Duration,
    /// Primary hosts file.
    pub hosts_file: PathBuf,
    /// DNS filter custom list, if any.
    pub filter_list: Option<PathBuf>,
    /// Tag marking the member block.
    pub tag: String,
    /// Windows host pairing.
    pub paired: PairedConfig,
}

impl SyncConfig {
    /// Creates a config with default paths, interval and tag.
    #[must_use]
    pub fn new(
        api_key: impl Into<String>,
        network_id: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            network_id: network_id.into(),
            domain: domain.into(),
            api_url: DEFAULT_API_URL.to_string(),
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            hosts_file: PathBuf::from(DEFAULT_HOSTS_FILE),
            filter_list: None,
            tag: DEFAULT_TAG.to_string(),
            paired: PairedConfig::default(),
        }
    }

    /// Overrides the API base URL.
    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Overrides the `watch` interval.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Overrides the primary hosts file.
    #[must_use]
    pub fn with_hosts_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.hosts_file = path.into();
        self
    }

    /// Enables the DNS filter list target.
    #[must_use]
    pub fn with_filter_list(mut self, path: impl Into<PathBuf>) -> Self {
        self.filter_list = Some(path.into());
        self
    }

    /// Overrides the member block tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Overrides the pairing settings.
    #[must_use]
    pub fn with_paired(mut self, paired: PairedConfig) -> Self {
        self.paired = paired;
        self
    }

    fn validate(self) -> Result<Self> {
        if self.api_key.trim().is_empty() {
            return Err(SyncError::InvalidConfig("api_key is not set".into()));
        }
        if self.network_id.trim().is_empty() {
            return Err(SyncError::InvalidConfig("network_id is not set".into()));
        }
        if self.tag.is_empty() || self.tag.contains(char::is_whitespace) {
            return Err(SyncError::InvalidConfig(format!("invalid tag: {:?}", self.tag)));
        }
        if self.tag == ANNOUNCE_TAG {
            return Err(SyncError::InvalidConfig(format!(
                "tag {ANNOUNCE_TAG:?} is reserved for the WSL announcement"
            )));
        }
        if self.interval.is_zero() {
            return Err(SyncError::InvalidConfig("interval_secs must be positive".into()));
        }
        Ok(self)
    }
}

/// On-disk configuration; every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// ZeroTier Central API token.
    pub api_key: Option<String>,
    /// Network whose members are mirrored.
    pub network_id: Option<String>,
    /// Domain suffix for filter list entries.
    pub domain: Option<String>,
    /// API base URL; defaults to ZeroTier Central.
    pub api_url: Option<String>,
    /// Seconds between cycles in `watch` mode.
    pub interval_secs: Option<u64>,
    /// Primary hosts file; defaults to `/etc/hosts`.
    pub hosts_file: Option<PathBuf>,
    /// DNS filter custom list.
    pub filter_list: Option<PathBuf>,
    /// Member block tag; defaults to `ZeroTier`.
    pub tag: Option<String>,
    /// `[paired]` table.
    #[serde(default)]
    pub paired: PairedConfig,
}

/// Values supplied from the environment or command line.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    /// Replaces `api_key` from the file.
    pub api_key: Option<String>,
    /// Replaces `network_id` from the file.
    pub network_id: Option<String>,
    /// Replaces `domain` from the file.
    pub domain: Option<String>,
}

impl ConfigFile {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] on a syntax error or unknown key.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| SyncError::InvalidConfig(e.to_string()))
    }

    /// Loads `path`.
    ///
    /// A missing file yields an empty config when `required` is `false`, so
    /// the environment alone can configure the tool. A file readable by
    /// group or others is loaded with a warning, since it holds the API key.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] if the file is missing while
    /// required or cannot be parsed, and [`SyncError::FileAccess`] if it
    /// cannot be read.
    pub fn load(path: &Path, required: bool) -> Result<Self> {
        if !path.exists() {
            if required {
                return Err(SyncError::InvalidConfig(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        if is_world_or_group_readable(path) {
            tracing::warn!(
                path = %path.display(),
                "Config file holds the API key but is readable by other users; chmod 600 it"
            );
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| SyncError::file_access(path, e))?;
        Self::parse(&content)
    }

    /// Applies `overrides` and defaults, producing a validated config.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] if the API key or network ID is
    /// missing, the tag is malformed or the interval is zero.
    pub fn resolve(self, overrides: ConfigOverrides) -> Result<SyncConfig> {
        let mut config = SyncConfig::new(
            overrides.api_key.or(self.api_key).unwrap_or_default(),
            overrides.network_id.or(self.network_id).unwrap_or_default(),
            overrides.domain.or(self.domain).unwrap_or_default(),
        )
        .with_paired(self.paired);

        if let Some(url) = self.api_url {
            config = config.with_api_url(url);
        }
        if let Some(secs) = self.interval_secs {
            config = config.with_interval(Duration::from_secs(secs));
        }
        if let Some(path) = self.hosts_file {
            config = config.with_hosts_file(path);
        }
        if let Some(path) = self.filter_list {
            config = config.with_filter_list(path);
        }
        if let Some(tag) = self.tag {
            config = config.with_tag(tag);
        }
        config.validate()
    }
}

/// Writes a commented config template to `path` with mode `0600`.
///
/// Refuses to overwrite an existing file.
///
/// # Errors
///
/// Returns [`SyncError::InvalidConfig`] if the file exists and
/// [`SyncError::Io`] if it cannot be created.
pub fn write_template(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(SyncError::InvalidConfig(format!(
            "{} already exists",
            path.display()
        )));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, TEMPLATE)?;
    restrict_permissions(path)?;
    tracing::info!(path = %path.display(), "Wrote config template");
    Ok(())
}
