//! Internal utilities.

use std::ffi::{CStr, CString};
use std::net::Ipv4Addr;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::error::{Result, SyncError};

/// Returns `true` when running with an effective UID of 0.
#[must_use]
pub fn is_root() -> bool {
    // SAFETY: `geteuid` has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

/// Checks that `path` can be edited by this process.
///
/// Root always passes. Otherwise the file (or, if it does not exist yet,
/// its parent directory) must be writable according to `access(2)`.
///
/// # Errors
///
/// Returns [`SyncError::PermissionDenied`] if the file cannot be written.
pub fn check_write_access(path: &Path) -> Result<()> {
    if is_root() {
        return Ok(());
    }

    let probe = if path.exists() {
        path
    } else {
        path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."))
    };

    let c_path = CString::new(probe.as_os_str().as_bytes()).map_err(|_| {
        SyncError::InvalidConfig(format!("path contains a NUL byte: {}", path.display()))
    })?;

    // SAFETY: `c_path` is a valid NUL-terminated string for the duration of the call.
    if unsafe { libc::access(c_path.as_ptr(), libc::W_OK) } == 0 {
        Ok(())
    } else {
        Err(SyncError::PermissionDenied {
            reason: format!("{} is not writable; run as root", path.display()),
        })
    }
}

/// Returns the local hostname truncated at the first dot.
#[must_use]
pub fn short_hostname() -> Option<String> {
    let mut buf = [0u8; 256];
    // SAFETY: the buffer is valid for `buf.len()` bytes; glibc NUL-terminates
    // on success and we force a terminator at the end regardless.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len()) };
    if rc != 0 {
        return None;
    }
    buf[buf.len() - 1] = 0;
    let name = CStr::from_bytes_until_nul(&buf).ok()?.to_str().ok()?;
    let short = name.split('.').next().unwrap_or_default();
    (!short.is_empty()).then(|| short.to_string())
}

/// Finds an IPv4 address of a local interface.
///
/// With `Some(name)` only that interface is considered; with `None` the
/// first interface that is up, not loopback and has an IPv4 address wins.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn interface_ipv4(name: Option<&str>) -> Option<Ipv4Addr> {
    let mut ifap: *mut libc::ifaddrs = std::ptr::null_mut();
    // SAFETY: `getifaddrs` fills `ifap` with a list we release below.
    if unsafe { libc::getifaddrs(&raw mut ifap) } != 0 {
        return None;
    }

    let mut found = None;
    let mut cur = ifap;
    while !cur.is_null() {
        // SAFETY: `cur` is a non-null node of the list returned by `getifaddrs`.
        let ifa = unsafe { &*cur };
        cur = ifa.ifa_next;

        if ifa.ifa_addr.is_null() {
            continue;
        }
        // SAFETY: `ifa_addr` is non-null and points to a `sockaddr`.
        let family = unsafe { (*ifa.ifa_addr).sa_family };
        if i32::from(family) != libc::AF_INET {
            continue;
        }

        // SAFETY: `ifa_name` is a NUL-terminated interface name.
        let ifname = unsafe { CStr::from_ptr(ifa.ifa_name) };
        let matches = match name {
            Some(wanted) => ifname.to_bytes() == wanted.as_bytes(),
            None => {
                let flags = ifa.ifa_flags;
                flags & libc::IFF_UP as u32 != 0 && flags & libc::IFF_LOOPBACK as u32 == 0
            }
        };
        if !matches {
            continue;
        }

        // SAFETY: the family is AF_INET, so the address is a `sockaddr_in`.
        let sin = unsafe { &*ifa.ifa_addr.cast::<libc::sockaddr_in>() };
        found = Some(Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr)));
        break;
    }

    // SAFETY: `ifap` came from a successful `getifaddrs` call.
    unsafe { libc::freeifaddrs(ifap) };
    found
}

/// Sets `path` to owner-only read/write (`0600`).
///
/// # Errors
///
/// Returns [`SyncError::Io`] if the permissions cannot be changed.
pub fn restrict_permissions(path: &Path) -> Result<()> {
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

/// Returns `true` if `path` is readable by group or others.
#[must_use]
pub fn is_world_or_group_readable(path: &Path) -> bool {
    std::fs::metadata(path).is_ok_and(|m| m.permissions().mode() & 0o077 != 0)
}
