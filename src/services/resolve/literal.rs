//! Bare IPv4 address descriptors.

use super::strategy::{Resolution, ResolveStrategy};
use super::{DescriptorKind, mount_point_for_address, parse_ipv4_octets};
use crate::Result;
use crate::services::system::SystemProbe;
use std::path::PathBuf;

/// `192.168.1.10`. The copy root is the local mount of a share served by
/// that address, or its mapped drive on Windows.
#[derive(Debug, Default)]
pub struct Ipv4Literal;

impl ResolveStrategy for Ipv4Literal {
    fn kind(&self) -> DescriptorKind {
        DescriptorKind::Ipv4
    }

    fn accepts(&self, descriptor: &str) -> bool {
        parse_ipv4_octets(descriptor).is_some()
    }

    fn resolve(&self, descriptor: &str, system: &dyn SystemProbe) -> Result<Resolution> {
        let address = parse_ipv4_octets(descriptor)
            .ok_or_else(|| crate::Error::unresolvable(descriptor, "not an IPv4 address"))?;

        let root = mount_point_for_address(system, address).or_else(|| {
            system.mapped_drives().ok().and_then(|drives| {
                drives
                    .into_iter()
                    .find(|drive| {
                        super::windows::parse_unc(&drive.remote)
                            .and_then(|unc| parse_ipv4_octets(unc.host))
                            == Some(address)
                    })
                    .map(|drive| PathBuf::from(format!("{}\\", drive.local)))
            })
        });

        Ok(Resolution { address, root })
    }
}
