//! # zerotier-hosts
//!
//! Mirror the members of a ZeroTier network into hosts files.
//!
//! Each cycle fetches the member list from ZeroTier Central, renders one
//! line per member with an assigned address and replaces a tagged block at
//! the end of every target file. Everything outside the block is left alone,
//! and running the same cycle twice produces identical files.
//!
//! Targets:
//!
//! - the local `/etc/hosts` (this machine's own name is left out),
//! - inside WSL, the Windows hosts file with `\r\n` line endings, plus a
//!   `#WSL` block announcing the subsystem's current address on both sides,
//! - optionally a DNS filter custom list (e.g. Pi-hole), with FQDN entries.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use zerotier_hosts::{MembershipClient, SyncConfig, Syncer, paired};
//!
//! let config = SyncConfig::new("api-token", "8056c2e21c000001", "zt.lan");
//! let client = MembershipClient::builder(&config.api_key, &config.network_id).build()?;
//!
//! // Requires root to edit /etc/hosts.
//! let syncer = Syncer::new(&config, paired::detect(&config)?);
//! let report = syncer.run_cycle(&client)?;
//! for line in &report.entries {
//!     println!("{line}");
//! }
//! ```
//!
//! ## Scheduling
//!
//! The crate runs a single cycle per call and keeps no state between
//! cycles; run the `zerotier-hosts sync` binary from cron or a systemd
//! timer, or use `zerotier-hosts watch` to loop in the foreground.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod hosts_file;
pub mod membership;
pub mod paired;
pub mod render;
pub mod sync;
pub mod util;

pub use config::{ConfigFile, ConfigOverrides, PairedConfig, SyncConfig};
pub use error::{Result, SyncError};
pub use hosts_file::{HostFileTarget, LineEnding};
pub use membership::{MemberRecord, MembershipClient, parse_members};
pub use paired::{HostIdentity, PairedHost};
pub use render::{EntryFormat, render_entries};
pub use sync::{CycleReport, Syncer, TargetOutcome};
