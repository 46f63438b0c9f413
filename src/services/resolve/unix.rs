//! Unix destination forms: `host:/export` descriptors and local network mounts.

use super::strategy::{Resolution, ResolveStrategy};
use super::{DescriptorKind, resolve_host};
use crate::services::system::{SystemProbe, find_mount};
use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Split `host:/path` into host and export path.
#[must_use]
pub fn parse_network_mount(descriptor: &str) -> Option<(&str, &str)> {
    let (host, path) = descriptor.split_once(':')?;
    let valid_host = !host.is_empty() && !host.contains(['/', '\\']);
    (valid_host && path.starts_with('/')).then_some((host, path))
}

/// `192.168.1.10:/export/data` or `nas01:/export/data`.
///
/// The copy root is the local mount point of that export (or of a parent
/// export) when it is mounted on this host.
#[derive(Debug, Default)]
pub struct NetworkMount;

impl ResolveStrategy for NetworkMount {
    fn kind(&self) -> DescriptorKind {
        DescriptorKind::NetworkMount
    }

    fn accepts(&self, descriptor: &str) -> bool {
        parse_network_mount(descriptor).is_some()
    }

    fn resolve(&self, descriptor: &str, system: &dyn SystemProbe) -> Result<Resolution> {
        let (host, export) = parse_network_mount(descriptor)
            .ok_or_else(|| Error::unresolvable(descriptor, "expected host:/path"))?;
        let address = resolve_host(descriptor, host, system)?;

        let root = system.mount_table().ok().and_then(|entries| {
            entries
                .iter()
                .filter(|entry| entry.is_network() && entry.remote_host() == Some(host))
                .filter_map(|entry| {
                    let (_, mounted_export) = entry.source.split_once(':')?;
                    let remainder = Path::new(export).strip_prefix(mounted_export).ok()?;
                    Some((mounted_export.len(), entry.mount_point.join(remainder)))
                })
                .max_by_key(|(len, _)| *len)
                .map(|(_, root)| root)
        });

        if root.is_none() {
            log::warn!("Export '{descriptor}' is not mounted on this host");
        }

        Ok(Resolution { address, root })
    }
}

/// An existing local path that lives on a network filesystem mount.
#[derive(Debug, Default)]
pub struct LocalMount;

impl ResolveStrategy for LocalMount {
    fn kind(&self) -> DescriptorKind {
        DescriptorKind::LocalMount
    }

    fn accepts(&self, descriptor: &str) -> bool {
        Path::new(descriptor).exists()
    }

    fn resolve(&self, descriptor: &str, system: &dyn SystemProbe) -> Result<Resolution> {
        let path = std::fs::canonicalize(descriptor).map_err(|e| {
            Error::unresolvable(descriptor, format!("cannot canonicalize path: {e}"))
        })?;

        let entries = system
            .mount_table()
            .map_err(|e| Error::unresolvable(descriptor, format!("cannot read mount table: {e}")))?;

        let mount = find_mount(&entries, &path)
            .ok_or_else(|| Error::unresolvable(descriptor, "path is not under any mount point"))?;

        let host = mount.remote_host().ok_or_else(|| {
            Error::unresolvable(
                descriptor,
                format!(
                    "{} is a local '{}' filesystem, not a network mount",
                    mount.mount_point.display(),
                    mount.fs_type
                ),
            )
        })?;
        let address = resolve_host(descriptor, host, system)?;

        Ok(Resolution {
            address,
            root: Some(PathBuf::from(descriptor)),
        })
    }
}
