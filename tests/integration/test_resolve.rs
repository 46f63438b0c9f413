//! Destination descriptor resolution across forms and platforms

use crate::fixtures::{FakeSystem, NAS_ADDRESS};
use eclipse_ingest::services::resolve::strategy::StrategyRegistry;
use eclipse_ingest::services::resolve::{DescriptorKind, DestinationResolver, Port, unix, windows};
use eclipse_ingest::services::system::Platform;
use eclipse_ingest::{DestinationTarget, Error, Result};
use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;
use tempfile::TempDir;

fn resolve(system: &FakeSystem, descriptor: &str) -> Result<DestinationTarget> {
    DestinationResolver::new(system).resolve(descriptor, Port::default())
}

fn assert_unresolvable(result: Result<DestinationTarget>) {
    let err = result.unwrap_err();
    assert!(
        matches!(err, Error::UnresolvableDestination { .. }),
        "expected unresolvable destination, got {err}"
    );
    assert!(err.is_configuration());
}

#[test]
fn test_ipv4_literal_with_mounted_share() {
    let system = FakeSystem::unix().with_mount(
        "192.168.1.10:/export/data",
        Path::new("/mnt/nas"),
        "nfs4",
    );

    let target = resolve(&system, "192.168.1.10").unwrap();
    assert_eq!(target.kind, DescriptorKind::Ipv4);
    assert_eq!(target.address, NAS_ADDRESS);
    assert_eq!(target.port.get(), 8000);
    assert_eq!(target.root(), Some(Path::new("/mnt/nas")));
}

#[test]
fn test_ipv4_literal_without_mount_has_no_root() {
    let system = FakeSystem::unix();
    let target = resolve(&system, " 192.168.1.10 ").unwrap();

    assert_eq!(target.descriptor, "192.168.1.10");
    assert_eq!(target.address, NAS_ADDRESS);
    assert!(target.root().is_none());
    assert!(target.has_network_properties());
}

#[test]
fn test_ipv4_literal_via_mapped_drive() {
    let system = FakeSystem::windows().with_drive("Z:", r"\\192.168.1.10\share");
    let target = resolve(&system, "192.168.1.10").unwrap();
    assert_eq!(target.root(), Some(Path::new(r"Z:\")));
}

#[test]
fn test_unc_path_on_windows() {
    let system = FakeSystem::windows();

    let target = resolve(&system, r"\\192.168.1.10\share").unwrap();
    assert_eq!(target.kind, DescriptorKind::Unc);
    assert_eq!(target.address, NAS_ADDRESS);
    assert_eq!(target.root(), Some(Path::new(r"\\192.168.1.10\share")));
}

#[test]
fn test_unc_path_uses_cifs_mount_on_unix() {
    let system = FakeSystem::unix()
        .with_mount("//192.168.1.10/share", Path::new("/mnt/share"), "cifs")
        .with_mount("//192.168.1.10/share/archive", Path::new("/mnt/archive"), "cifs")
        .with_mount("//192.168.1.10/other", Path::new("/mnt/other"), "cifs");

    let target = resolve(&system, r"\\192.168.1.10\share").unwrap();
    assert_eq!(target.kind, DescriptorKind::Unc);
    assert_eq!(target.address, NAS_ADDRESS);
    assert_eq!(target.root(), Some(Path::new("/mnt/share")));

    let target = resolve(&system, r"\\192.168.1.10\SHARE\incoming\2024").unwrap();
    assert_eq!(target.root(), Some(Path::new("/mnt/share/incoming/2024")));

    // Deepest mounted sub-directory wins.
    let target = resolve(&system, "//192.168.1.10/share/archive/old").unwrap();
    assert_eq!(target.root(), Some(Path::new("/mnt/archive/old")));
}

#[test]
fn test_unc_path_without_mount_on_unix() {
    let system = FakeSystem::unix()
        .with_host("nas01", Ipv4Addr::new(10, 0, 0, 5))
        .with_mount("//192.168.1.10/other", Path::new("/mnt/other"), "cifs")
        .with_mount("//192.168.1.10/share", Path::new("/mnt/local"), "ext4");

    let target = resolve(&system, r"\\192.168.1.10\share").unwrap();
    assert_eq!(target.address, NAS_ADDRESS);
    assert!(target.root().is_none());

    let target = resolve(&system, "//nas01/lidar").unwrap();
    assert_eq!(target.kind, DescriptorKind::Unc);
    assert_eq!(target.address, Ipv4Addr::new(10, 0, 0, 5));
    assert!(target.root().is_none());
}

#[test]
fn test_same_address_from_every_form() {
    let system = FakeSystem::windows()
        .with_drive("Z:", r"\\192.168.1.10\share")
        .with_mount("192.168.1.10:/export/data", Path::new("/mnt/nas"), "nfs");

    for descriptor in [
        "192.168.1.10",
        r"\\192.168.1.10\share",
        "Z:",
        "192.168.1.10:/export/data",
    ] {
        let target = resolve(&system, descriptor).unwrap();
        assert_eq!(target.address, NAS_ADDRESS, "{descriptor}");
    }
}

#[test]
fn test_network_mount_descriptor() {
    let system = FakeSystem::unix().with_mount(
        "192.168.1.10:/export/data",
        Path::new("/mnt/nas"),
        "nfs4",
    );

    let target = resolve(&system, "192.168.1.10:/export/data").unwrap();
    assert_eq!(target.kind, DescriptorKind::NetworkMount);
    assert_eq!(target.root(), Some(Path::new("/mnt/nas")));

    // Sub-directory of a mounted export.
    let target = resolve(&system, "192.168.1.10:/export/data/incoming").unwrap();
    assert_eq!(target.root(), Some(Path::new("/mnt/nas/incoming")));

    // Known host, export not mounted.
    let target = resolve(&system, "192.168.1.10:/export/other").unwrap();
    assert_eq!(target.address, NAS_ADDRESS);
    assert!(target.root().is_none());
}

#[test]
fn test_host_names_resolved_through_dns() {
    let system = FakeSystem::unix()
        .with_host("nas01", NAS_ADDRESS)
        .with_mount("nas01:/lidar", Path::new("/mnt/lidar"), "nfs");

    let target = resolve(&system, "nas01:/lidar").unwrap();
    assert_eq!(target.address, NAS_ADDRESS);
    assert_eq!(target.root(), Some(Path::new("/mnt/lidar")));

    assert_unresolvable(resolve(&system, "unknown-host:/lidar"));
}

#[test]
fn test_invalid_octets() {
    let system = FakeSystem::unix();
    assert_unresolvable(resolve(&system, r"\\192.168.1.300\share"));
    assert_unresolvable(resolve(&system, "192.168.1.300:/export"));
    // Not a literal, not a path that exists.
    assert_unresolvable(resolve(&system, "192.168.1.300"));
}

#[test]
fn test_empty_and_unrecognized_descriptors() {
    let system = FakeSystem::unix();
    assert_unresolvable(resolve(&system, ""));
    assert_unresolvable(resolve(&system, "   "));
    assert_unresolvable(resolve(&system, "no such destination"));
}

#[test]
fn test_drive_letter_on_windows() {
    let system = FakeSystem::windows().with_drive("Z:", r"\\192.168.1.10\share");
    let resolver = DestinationResolver::new(&system);

    assert_eq!(resolver.classify("Z:"), Some(DescriptorKind::DriveLetter));
    let target = resolver.resolve("z:", Port::default()).unwrap();
    assert_eq!(target.kind, DescriptorKind::DriveLetter);
    assert_eq!(target.address, NAS_ADDRESS);
    assert_eq!(target.root(), Some(Path::new(r"z:\")));

    let target = resolver.resolve(r"Z:\incoming", Port::default()).unwrap();
    assert_eq!(target.root(), Some(Path::new(r"Z:\incoming")));

    // Unmapped letter is owned by the drive form and fails there.
    assert_unresolvable(resolver.resolve("Y:", Port::default()));
}

#[test]
fn test_drive_letter_not_recognized_on_unix() {
    let system = FakeSystem::unix().with_drive("Z:", r"\\192.168.1.10\share");
    let resolver = DestinationResolver::new(&system);

    assert_eq!(resolver.classify("Z:"), None);
    assert_unresolvable(resolver.resolve("Z:", Port::default()));
}

#[test]
fn test_local_path_on_network_mount() {
    let temp = TempDir::new().unwrap();
    let mount_point = fs::canonicalize(temp.path()).unwrap();
    let incoming = mount_point.join("incoming");
    fs::create_dir_all(&incoming).unwrap();

    let system = FakeSystem::unix().with_mount("192.168.1.10:/export/data", &mount_point, "nfs4");
    let descriptor = incoming.to_string_lossy().to_string();

    let target = resolve(&system, &descriptor).unwrap();
    assert_eq!(target.kind, DescriptorKind::LocalMount);
    assert_eq!(target.address, NAS_ADDRESS);
    assert_eq!(target.root(), Some(incoming.as_path()));
}

#[test]
fn test_local_path_on_local_filesystem() {
    let temp = TempDir::new().unwrap();
    let mount_point = fs::canonicalize(temp.path()).unwrap();

    let system = FakeSystem::unix().with_mount("/dev/sda2", &mount_point, "ext4");
    assert_unresolvable(resolve(&system, &mount_point.to_string_lossy()));

    // Not under any mount at all.
    let bare = FakeSystem::unix();
    assert_unresolvable(resolve(&bare, &mount_point.to_string_lossy()));
}

#[test]
fn test_port_is_carried_and_validated() {
    let system = FakeSystem::unix();
    let port = Port::new(2049).unwrap();
    let target = DestinationResolver::new(&system)
        .resolve("192.168.1.10", port)
        .unwrap();
    assert_eq!(target.socket_addr().to_string(), "192.168.1.10:2049");

    for reserved in [0, 22, 445, 1023] {
        let err = Port::new(reserved).unwrap_err();
        assert!(matches!(err, Error::WellKnownPort(p) if p == reserved));
        assert!(err.is_configuration());
    }
    assert!(Port::parse("not-a-port").is_err());
}

#[test]
fn test_probe_counts_only_usable_addresses() {
    let system = FakeSystem::unix().unreachable();
    let target = resolve(&system, "192.168.1.10").unwrap();
    assert!(!target.probe_reachable(&system));
    assert_eq!(system.probes.get(), 1);

    let broadcast = resolve(&system, "255.255.255.255").unwrap();
    assert!(!broadcast.has_network_properties());
    assert!(!broadcast.probe_reachable(&system));
    assert_eq!(system.probes.get(), 1);
}

#[test]
fn test_custom_registry_limits_forms() {
    let mut registry = StrategyRegistry::new();
    registry.register(Box::new(windows::UncPath));
    registry.register(Box::new(unix::NetworkMount));
    registry.register(Box::new(windows::MappedDrive));
    assert_eq!(
        registry.kinds(Platform::Unix),
        vec![DescriptorKind::Unc, DescriptorKind::NetworkMount]
    );
    assert_eq!(registry.kinds(Platform::Windows).len(), 3);

    let system = FakeSystem::unix();
    let resolver = DestinationResolver::with_registry(&system, registry);
    assert_eq!(
        resolver.classify(r"\\192.168.1.10\share"),
        Some(DescriptorKind::Unc)
    );
    assert_eq!(resolver.classify("192.168.1.10"), None);
    let err = resolver
        .resolve("192.168.1.10", Port::default())
        .unwrap_err();
    assert!(
        err.to_string().contains("accepted: unc, network_mount"),
        "{err}"
    );
}
