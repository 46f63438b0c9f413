//! Destination resolution: turn a user-supplied descriptor into a network target.
//!
//! Descriptor forms are tried in a fixed priority order:
//!
//! 1. IPv4 address literal
//! 2. UNC path `\\host\share`
//! 3. Windows drive letter mapped to a network share (Windows only)
//! 4. Network mount descriptor `host:/export/path`
//! 5. Existing local path on a network filesystem mount
//!
//! The first form whose syntax matches owns the descriptor; if it then fails
//! to resolve, resolution fails without trying later forms.

pub mod literal;
pub mod strategy;
pub mod unix;
pub mod windows;

use crate::services::system::{MountEntry, SystemProbe};
use crate::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::{Path, PathBuf};
use strategy::StrategyRegistry;

/// Ports 0 through this value are reserved for standard services.
pub const WELL_KNOWN_PORT_MAX: u16 = 1023;

/// Port probed when none is configured.
pub const DEFAULT_PORT: u16 = 8000;

/// Destination port outside the well-known range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Port(u16);

impl Port {
    /// # Errors
    /// Returns [`Error::WellKnownPort`] for ports 0-1023.
    pub fn new(port: u16) -> Result<Self> {
        if port <= WELL_KNOWN_PORT_MAX {
            return Err(Error::WellKnownPort(port));
        }
        Ok(Self(port))
    }

    /// Parse a decimal port number.
    pub fn parse(text: &str) -> Result<Self> {
        let port: u16 = text
            .trim()
            .parse()
            .map_err(|_| Error::InvalidInput(format!("invalid port '{text}'")))?;
        Self::new(port)
    }

    #[must_use]
    pub fn get(&self) -> u16 {
        self.0
    }
}

impl Default for Port {
    fn default() -> Self {
        Self(DEFAULT_PORT)
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Descriptor forms accepted by the resolver, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptorKind {
    Ipv4,
    Unc,
    DriveLetter,
    NetworkMount,
    LocalMount,
}

impl DescriptorKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DescriptorKind::Ipv4 => "ipv4",
            DescriptorKind::Unc => "unc",
            DescriptorKind::DriveLetter => "drive_letter",
            DescriptorKind::NetworkMount => "network_mount",
            DescriptorKind::LocalMount => "local_mount",
        }
    }
}

impl fmt::Display for DescriptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved copy destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DestinationTarget {
    pub descriptor: String,
    pub kind: DescriptorKind,
    pub address: Ipv4Addr,
    pub port: Port,
    root: Option<PathBuf>,
}

impl DestinationTarget {
    /// Build a target directly, bypassing descriptor resolution.
    #[must_use]
    pub fn new(
        descriptor: impl Into<String>,
        kind: DescriptorKind,
        address: Ipv4Addr,
        port: Port,
        root: Option<PathBuf>,
    ) -> Self {
        Self {
            descriptor: descriptor.into(),
            kind,
            address,
            port,
            root,
        }
    }

    /// Directory files are copied under. `None` when the address is known
    /// but the share is not mounted on this host.
    #[must_use]
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    #[must_use]
    pub fn socket_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.address, self.port.get())
    }

    /// Address and port are usable for a reachability probe.
    #[must_use]
    pub fn has_network_properties(&self) -> bool {
        !self.address.is_unspecified() && !self.address.is_broadcast()
    }

    /// Open a TCP connection to address:port; blocking, OS default timeout.
    pub fn probe_reachable(&self, system: &dyn SystemProbe) -> bool {
        self.has_network_properties() && system.is_reachable(self.socket_addr())
    }
}

/// Resolves destination descriptors through an ordered strategy registry.
pub struct DestinationResolver<'a> {
    system: &'a dyn SystemProbe,
    registry: StrategyRegistry,
}

impl<'a> DestinationResolver<'a> {
    /// Resolver with the five built-in forms in priority order.
    #[must_use]
    pub fn new(system: &'a dyn SystemProbe) -> Self {
        let mut registry = StrategyRegistry::new();
        registry.register(Box::new(literal::Ipv4Literal));
        registry.register(Box::new(windows::UncPath));
        registry.register(Box::new(windows::MappedDrive));
        registry.register(Box::new(unix::NetworkMount));
        registry.register(Box::new(unix::LocalMount));
        Self { system, registry }
    }

    /// Resolver with a caller-supplied registry.
    #[must_use]
    pub fn with_registry(system: &'a dyn SystemProbe, registry: StrategyRegistry) -> Self {
        Self { system, registry }
    }

    /// Classify `descriptor` without resolving it.
    #[must_use]
    pub fn classify(&self, descriptor: &str) -> Option<DescriptorKind> {
        self.registry
            .select(descriptor.trim(), self.system.platform())
            .map(|s| s.kind())
    }

    /// # Errors
    /// Returns [`Error::UnresolvableDestination`] when no form matches or the
    /// matching form cannot resolve an address.
    pub fn resolve(&self, descriptor: &str, port: Port) -> Result<DestinationTarget> {
        let descriptor = descriptor.trim();
        if descriptor.is_empty() {
            return Err(Error::unresolvable(descriptor, "empty descriptor"));
        }

        let platform = self.system.platform();
        let strategy = self.registry.select(descriptor, platform).ok_or_else(|| {
            let forms: Vec<&str> = self
                .registry
                .kinds(platform)
                .iter()
                .map(DescriptorKind::as_str)
                .collect();
            Error::unresolvable(
                descriptor,
                format!(
                    "not a recognized destination form on {} (accepted: {})",
                    platform.as_str(),
                    forms.join(", ")
                ),
            )
        })?;

        let resolution = strategy.resolve(descriptor, self.system)?;
        log::info!(
            "Resolved destination '{descriptor}' as {} -> {} (root: {})",
            strategy.kind(),
            resolution.address,
            resolution
                .root
                .as_deref()
                .map_or_else(|| "unmounted".to_string(), |r| r.display().to_string())
        );

        Ok(DestinationTarget {
            descriptor: descriptor.to_string(),
            kind: strategy.kind(),
            address: resolution.address,
            port,
            root: resolution.root,
        })
    }
}

/// Resolve a host token: dotted-quad literals are validated octet by octet,
/// anything else goes through DNS.
pub(crate) fn resolve_host(
    descriptor: &str,
    host: &str,
    system: &dyn SystemProbe,
) -> Result<Ipv4Addr> {
    if host.is_empty() {
        return Err(Error::unresolvable(descriptor, "missing host"));
    }

    if host.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return parse_ipv4_octets(host)
            .ok_or_else(|| Error::unresolvable(descriptor, format!("invalid IPv4 address '{host}'")));
    }

    system
        .lookup_ipv4(host)
        .map_err(|e| Error::unresolvable(descriptor, format!("cannot resolve host '{host}': {e}")))
}

/// Strict dotted-quad parse with each octet in 0-255.
#[must_use]
pub fn parse_ipv4_octets(text: &str) -> Option<Ipv4Addr> {
    let octets: Vec<&str> = text.split('.').collect();
    if octets.len() != 4 {
        return None;
    }

    let mut parsed = [0u8; 4];
    for (slot, octet) in parsed.iter_mut().zip(&octets) {
        if octet.is_empty() || octet.len() > 3 || !octet.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        *slot = octet.parse::<u8>().ok()?;
    }
    Some(Ipv4Addr::from(parsed))
}

/// Local mount point of a network share served by `address`, if any.
pub(crate) fn mount_point_for_address(
    system: &dyn SystemProbe,
    address: Ipv4Addr,
) -> Option<PathBuf> {
    let entries: Vec<MountEntry> = system.mount_table().ok()?;
    entries
        .iter()
        .filter(|entry| entry.is_network())
        .find(|entry| {
            entry
                .remote_host()
                .and_then(|host| {
                    parse_ipv4_octets(host).or_else(|| system.lookup_ipv4(host).ok())
                })
                == Some(address)
        })
        .map(|entry| entry.mount_point.clone())
}
