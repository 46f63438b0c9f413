//! Windows destination forms: UNC paths and mapped network drives.
//!
//! UNC parsing is pure and available everywhere. On Windows a UNC path is
//! its own copy root; elsewhere the root is the local mount point of the
//! matching CIFS share. Mapped drive resolution queries the host's active
//! drive mappings and is only eligible when the probe reports a Windows
//! platform.

use super::strategy::{Resolution, ResolveStrategy};
use super::{DescriptorKind, resolve_host};
use crate::services::system::{Platform, SystemProbe};
use crate::{Error, Result};
use std::path::PathBuf;

/// Components of `\\host\share[\rest]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UncParts<'a> {
    pub host: &'a str,
    pub share: &'a str,
    /// Path below the share, separators untouched; empty for the share itself.
    pub rest: &'a str,
}

impl UncParts<'_> {
    /// Non-empty components of [`UncParts::rest`].
    #[must_use]
    pub fn rest_segments(&self) -> Vec<&str> {
        self.rest.split(['\\', '/']).filter(|s| !s.is_empty()).collect()
    }

    fn same_share(&self, other: &UncParts<'_>) -> bool {
        self.host.eq_ignore_ascii_case(other.host) && self.share.eq_ignore_ascii_case(other.share)
    }
}

/// Split a UNC path into host, share and remainder. Both separators are accepted.
#[must_use]
pub fn parse_unc(path: &str) -> Option<UncParts<'_>> {
    let unc = path
        .strip_prefix(r"\\")
        .or_else(|| path.strip_prefix("//"))?;
    let (host, after_host) = unc.split_once(['\\', '/'])?;
    let (share, rest) = after_host
        .split_once(['\\', '/'])
        .unwrap_or((after_host, ""));
    if host.is_empty() || share.is_empty() {
        return None;
    }
    Some(UncParts { host, share, rest })
}

/// Local directory for `unc` under a mounted CIFS share, preferring the
/// mount of the deepest share sub-directory.
fn mounted_share_root(unc: &UncParts<'_>, system: &dyn SystemProbe) -> Option<PathBuf> {
    let wanted = unc.rest_segments();
    let entries = system.mount_table().ok()?;

    entries
        .iter()
        .filter(|entry| entry.is_network())
        .filter_map(|entry| {
            let mounted = parse_unc(&entry.source)?;
            if !mounted.same_share(unc) {
                return None;
            }
            let prefix = mounted.rest_segments();
            let remainder = wanted.strip_prefix(prefix.as_slice())?;
            let root = remainder
                .iter()
                .fold(entry.mount_point.clone(), |path, segment| path.join(segment));
            Some((prefix.len(), root))
        })
        .max_by_key(|(depth, _)| *depth)
        .map(|(_, root)| root)
}

/// `\\192.168.1.10\share`.
#[derive(Debug, Default)]
pub struct UncPath;

impl ResolveStrategy for UncPath {
    fn kind(&self) -> DescriptorKind {
        DescriptorKind::Unc
    }

    fn accepts(&self, descriptor: &str) -> bool {
        parse_unc(descriptor).is_some()
    }

    fn resolve(&self, descriptor: &str, system: &dyn SystemProbe) -> Result<Resolution> {
        let unc = parse_unc(descriptor)
            .ok_or_else(|| Error::unresolvable(descriptor, "malformed UNC path"))?;
        let address = resolve_host(descriptor, unc.host, system)?;

        let root = if system.platform() == Platform::Windows {
            Some(PathBuf::from(descriptor))
        } else {
            mounted_share_root(&unc, system)
        };
        if root.is_none() {
            log::warn!("Share '{descriptor}' is not mounted on this host");
        }

        Ok(Resolution { address, root })
    }
}

/// `Z:` or `Z:\path` on a drive mapped to a network share.
#[derive(Debug, Default)]
pub struct MappedDrive;

impl MappedDrive {
    fn designator(descriptor: &str) -> Option<&str> {
        let bytes = descriptor.as_bytes();
        let well_formed = bytes.len() >= 2
            && bytes[0].is_ascii_alphabetic()
            && bytes[1] == b':'
            && (bytes.len() == 2 || bytes[2] == b'\\' || bytes[2] == b'/');
        well_formed.then(|| &descriptor[..2])
    }
}

impl ResolveStrategy for MappedDrive {
    fn kind(&self) -> DescriptorKind {
        DescriptorKind::DriveLetter
    }

    fn is_eligible(&self, platform: Platform) -> bool {
        platform == Platform::Windows
    }

    fn accepts(&self, descriptor: &str) -> bool {
        Self::designator(descriptor).is_some()
    }

    fn resolve(&self, descriptor: &str, system: &dyn SystemProbe) -> Result<Resolution> {
        let letter = Self::designator(descriptor)
            .ok_or_else(|| Error::unresolvable(descriptor, "malformed drive letter"))?;

        let drives = system.mapped_drives().map_err(|e| {
            Error::unresolvable(descriptor, format!("cannot list network drives: {e}"))
        })?;

        let mapping = drives
            .iter()
            .find(|drive| drive.local.eq_ignore_ascii_case(letter))
            .ok_or_else(|| {
                Error::unresolvable(
                    descriptor,
                    format!("{letter} is not mapped to a network share"),
                )
            })?;

        let unc = parse_unc(&mapping.remote).ok_or_else(|| {
            Error::unresolvable(
                descriptor,
                format!("mapping target '{}' is not a UNC path", mapping.remote),
            )
        })?;
        let address = resolve_host(descriptor, unc.host, system)?;

        let root = if descriptor.len() == 2 {
            PathBuf::from(format!("{descriptor}\\"))
        } else {
            PathBuf::from(descriptor)
        };

        Ok(Resolution {
            address,
            root: Some(root),
        })
    }
}
