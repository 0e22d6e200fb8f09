//! One sync cycle over every configured target.
//!
//! A cycle is linear: announce the WSL address (when paired), fetch the
//! member list, then rewrite the member block of each target. A failed fetch
//! aborts the cycle before any member block is touched; a failed target
//! only skips that file.

use std::path::PathBuf;

use crate::config::SyncConfig;
use crate::error::Result;
use crate::hosts_file::HostFileTarget;
use crate::membership::{MemberRecord, MembershipClient};
use crate::paired::{self, ANNOUNCE_TAG, HostIdentity};
use crate::render::{EntryFormat, render_entries};

/// Outcome of syncing one target file.
#[derive(Debug)]
pub struct TargetOutcome {
    /// Target label.
    pub label: String,
    /// Target path.
    pub path: PathBuf,
    /// `Ok(true)` if the file was rewritten, `Ok(false)` if already current.
    pub result: Result<bool>,
}

/// Summary of a cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Members with an assigned IP, rendered without exclusions.
    pub entries: Vec<String>,
    /// Announcement outcomes, in write order.
    pub announcements: Vec<TargetOutcome>,
    /// Member block outcomes, in write order.
    pub targets: Vec<TargetOutcome>,
}

impl CycleReport {
    /// Returns `true` if every file was written (or already current).
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Iterates over the targets that failed.
    pub fn failures(&self) -> impl Iterator<Item = &TargetOutcome> {
        self.announcements
            .iter()
            .chain(&self.targets)
            .filter(|o| o.result.is_err())
    }

    /// Number of files rewritten during the cycle.
    #[must_use]
    pub fn changed(&self) -> usize {
        self.announcements
            .iter()
            .chain(&self.targets)
            .filter(|o| matches!(o.result, Ok(true)))
            .count()
    }
}

/// Applies member lists to the targets derived from a config and identity.
///
/// # Example
///
/// ```rust,ignore
/// use zerotier_hosts::{MembershipClient, SyncConfig, Syncer, paired};
///
/// let config = SyncConfig::new("token", "8056c2e21c000001", "zt.lan");
/// let client = MembershipClient::builder(&config.api_key, &config.network_id).build()?;
/// let syncer = Syncer::new(&config, paired::detect(&config)?);
/// let report = syncer.run_cycle(&client)?;
/// ```
pub struct Syncer<'a> {
    config: &'a SyncConfig,
    identity: HostIdentity,
}

impl<'a> Syncer<'a> {
    /// Creates a syncer for `config` running as `identity`.
    #[must_use]
    pub const fn new(config: &'a SyncConfig, identity: HostIdentity) -> Self {
        Self { config, identity }
    }

    /// Returns the identity this syncer excludes and announces.
    #[must_use]
    pub const fn identity(&self) -> &HostIdentity {
        &self.identity
    }

    fn primary(&self) -> HostFileTarget {
        let target = HostFileTarget::new("hosts", &self.config.hosts_file).with_announcement();
        if self.identity.hostname.is_empty() {
            target
        } else {
            target.with_exclude([self.identity.hostname.as_str()])
        }
    }

    /// Files receiving the member block, in write order.
    ///
    /// The local hosts file leaves out this machine; the Windows hosts file
    /// leaves out the Windows host and this subsystem, which is covered by
    /// the announcement; the filter list gets every member as an FQDN.
    #[must_use]
    pub fn targets(&self) -> Vec<HostFileTarget> {
        let mut targets = vec![self.primary()];

        if let Some(paired) = &self.identity.paired {
            let exclude = [paired.host_name.as_str(), self.identity.hostname.as_str()];
            let exclude = exclude.into_iter().filter(|n| !n.is_empty());
            targets.push(paired.target().with_exclude(exclude));
        }

        if let Some(path) = &self.config.filter_list {
            targets.push(HostFileTarget::new("filter-list", path).with_format(EntryFormat::Fqdn));
        }
        targets
    }

    /// Writes the WSL announcement into the local and Windows hosts files.
    ///
    /// Returns no outcomes when not paired.
    pub fn announce(&self) -> Vec<TargetOutcome> {
        let Some(host) = &self.identity.paired else {
            return Vec::new();
        };
        let local = self.primary();
        let windows = host.target();
        paired::announce(host, &local)
            .into_iter()
            .zip([local.path, windows.path])
            .map(|((label, result), path)| TargetOutcome { label, path, result })
            .collect()
    }

    /// Rewrites the member block of every target from `members`.
    ///
    /// Each target is handled independently; failures are logged and
    /// recorded in the outcome.
    #[must_use]
    pub fn apply(&self, members: &[MemberRecord]) -> Vec<TargetOutcome> {
        let tag = self.config.tag.as_str();
        self.targets()
            .into_iter()
            .map(|target| {
                let lines = render_entries(
                    members,
                    target.format,
                    &self.config.domain,
                    tag,
                    &target.exclude,
                );
                let result = target.sync_block(tag, &lines);
                if let Err(e) = &result {
                    tracing::error!(
                        target_file = %target.label,
                        error = %e,
                        "Failed to sync member block, skipping file"
                    );
                }
                TargetOutcome {
                    label: target.label,
                    path: target.path,
                    result,
                }
            })
            .collect()
    }

    /// Runs a full cycle: announce, fetch, apply.
    ///
    /// # Errors
    ///
    /// Returns the fetch error if the member list could not be retrieved;
    /// member blocks are left untouched in that case. File errors do not
    /// fail the cycle and are reported in [`CycleReport::targets`].
    pub fn run_cycle(&self, client: &MembershipClient) -> Result<CycleReport> {
        let announcements = self.announce();
        let members = client.fetch()?;
        Ok(self.report(&members, announcements))
    }

    /// Like [`run_cycle`](Self::run_cycle) with an already fetched member list.
    #[must_use]
    pub fn run_with_members(&self, members: &[MemberRecord]) -> CycleReport {
        let announcements = self.announce();
        self.report(members, announcements)
    }

    fn report(&self, members: &[MemberRecord], announcements: Vec<TargetOutcome>) -> CycleReport {
        let targets = self.apply(members);
        let entries = render_entries(members, EntryFormat::Bare, "", &self.config.tag, &[]);
        let report = CycleReport {
            entries,
            announcements,
            targets,
        };
        tracing::info!(
            members = members.len(),
            entries = report.entries.len(),
            changed = report.changed(),
            failed = report.failures().count(),
            "Sync cycle finished"
        );
        report
    }

    /// Removes the member and announcement blocks from every target.
    #[must_use]
    pub fn clean(&self) -> Vec<TargetOutcome> {
        let mut outcomes = Vec::new();
        for target in self.targets() {
            let mut tags = vec![self.config.tag.as_str()];
            if target.announced {
                tags.push(ANNOUNCE_TAG);
            }
            let mut result = Ok(false);
            for tag in tags {
                match target.remove_block(tag) {
                    Ok(changed) => result = result.map(|c| c || changed),
                    Err(e) => {
                        tracing::error!(
                            target_file = %target.label,
                            error = %e,
                            "Failed to clean file"
                        );
                        result = Err(e);
                        break;
                    }
                }
            }
            outcomes.push(TargetOutcome {
                label: target.label,
                path: target.path,
                result,
            });
        }
        outcomes
    }
}
