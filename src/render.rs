//! Hosts-file line rendering.

use std::collections::BTreeSet;

use crate::membership::MemberRecord;

/// Column separator between fields of a rendered line.
const SEP: &str = "  ";

/// Layout of a rendered hosts line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryFormat {
    /// `<ip>  <hostname>  #<tag>`
    Bare,
    /// `<ip>  <hostname>.<domain>  <hostname>  #<tag>`
    Fqdn,
}

/// Renders member records into sorted hosts-file lines.
///
/// Records without a name or IP, and records whose name appears in
/// `exclude` (compared ASCII case-insensitively), produce no line. The result is sorted byte-wise and free of
/// duplicates.
///
/// ```
/// use zerotier_hosts::{EntryFormat, MemberRecord, render_entries};
///
/// let records = [
///     MemberRecord::new("alice", "1", Some("10.0.0.2")),
///     MemberRecord::new("bob", "2", None),
/// ];
/// let lines = render_entries(&records, EntryFormat::Fqdn, "example.lan", "ZeroTier", &[]);
/// assert_eq!(lines, ["10.0.0.2  alice.example.lan  alice  #ZeroTier"]);
/// ```
#[must_use]
pub fn render_entries(
    records: &[MemberRecord],
    format: EntryFormat,
    domain: &str,
    tag: &str,
    exclude: &[String],
) -> Vec<String> {
    records
        .iter()
        .filter(|r| {
            !r.name.is_empty() && !exclude.iter().any(|x| x.eq_ignore_ascii_case(&r.name))
        })
        .filter_map(|r| {
            let ip = r.ip.as_deref().filter(|ip| !ip.is_empty())?;
            Some(render_line(ip, &r.name, format, domain, tag))
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn render_line(ip: &str, name: &str, format: EntryFormat, domain: &str, tag: &str) -> String {
    match format {
        EntryFormat::Fqdn if !domain.is_empty() => {
            format!("{ip}{SEP}{name}.{domain}{SEP}{name}{SEP}#{tag}")
        }
        _ => format!("{ip}{SEP}{name}{SEP}#{tag}"),
    }
}
