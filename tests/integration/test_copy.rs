//! Copy orchestration: gating, partial failures and metadata submission

use crate::fixtures::{
    FailingCopier, FakeSystem, NAS_ADDRESS, VENDOR_TREE_MATCHES, create_vendor_tree, nas_target,
    write_file,
};
use eclipse_ingest::models::{EntityKind, UNSET_ID};
use eclipse_ingest::services::resolve::{
    DescriptorKind, DestinationResolver, DestinationTarget, Port,
};
use eclipse_ingest::services::sink::memory::MemorySink;
use eclipse_ingest::taxonomy::{Category, FolderMapping, MappingEntry};
use eclipse_ingest::{CopyContext, CopyJob, CopyStage, DestinationLayout, Error};
use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;
use tempfile::TempDir;

fn prepared_job(temp: &TempDir, system: &FakeSystem) -> CopyJob {
    let root = create_vendor_tree(temp.path()).unwrap();
    let dest = temp.path().join("nas");
    fs::create_dir_all(&dest).unwrap();

    let mut job = CopyJob::new(&root, &FolderMapping::riprocess_to_geobc(), system).unwrap();
    job.set_identifiers(3, 17);
    job.set_destination(nas_target(&dest));
    job
}

fn dir_is_empty(path: &Path) -> bool {
    fs::read_dir(path).map(|mut d| d.next().is_none()).unwrap_or(true)
}

#[test]
fn test_full_copy_mirrors_source_tree() {
    let temp = TempDir::new().unwrap();
    let system = FakeSystem::unix();
    let mut job = prepared_job(&temp, &system);
    let sink = MemorySink::new();

    let outcome = job.copy(&CopyContext::new(&sink, &system)).unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.copied.len(), VENDOR_TREE_MATCHES);
    assert_eq!(job.stage(), CopyStage::Done);

    let dest = temp.path().join("nas");
    let source = temp.path().join("vendor_drive");
    for relative in [
        "03_RIEGL_RAW/02_RXP/flight_02/scan_002.rxp",
        "09_EXPORT/control.shp",
        "06_RIEGL_PROC/04_EXPORT/strip_01.laz",
        "05_INS-GPS_PROC/01_POS/pos.txt",
    ] {
        assert_eq!(
            fs::read(dest.join(relative)).unwrap(),
            fs::read(source.join(relative)).unwrap(),
            "{relative} differs"
        );
    }
    assert!(!dest.join("09_EXPORT/readme.txt").exists());

    let drives = sink.posted(EntityKind::Drive);
    assert_eq!(drives.len(), 1);
    assert_eq!(drives[0]["nas_id"], 3);
    assert_eq!(drives[0]["delivery_id"], 17);
    assert_eq!(drives[0]["file_count"], 14);

    let batches = sink.posted(EntityKind::SensorData);
    assert_eq!(batches.len(), 1);
    let records = batches[0].as_array().unwrap();
    assert_eq!(records.len(), VENDOR_TREE_MATCHES);
    assert!(records.iter().all(|r| r["nas_id"] == 3 && r["delivery_id"] == 17));
}

#[test]
fn test_partial_failure_isolation() {
    let temp = TempDir::new().unwrap();
    let system = FakeSystem::unix();
    let mut job = prepared_job(&temp, &system);
    let sink = MemorySink::new();
    let copier = FailingCopier::failing(&["control.dbf", "strip_01.laz"]);

    let ctx = CopyContext::new(&sink, &system).with_copier(&copier);
    let outcome = job.copy(&ctx).unwrap();

    assert_eq!(copier.attempts.get(), VENDOR_TREE_MATCHES);
    assert_eq!(outcome.failures.len(), 2);
    assert!(outcome.failures.iter().all(|f| f.code == "EACCES"));
    assert!(outcome.failures[0].path.ends_with("control.dbf"));
    assert!(outcome.failures[1].path.ends_with("strip_01.laz"));
    assert_eq!(outcome.copied.len(), VENDOR_TREE_MATCHES - 2);
    assert!(!outcome.is_success());

    let dest = temp.path().join("nas");
    assert!(!dest.join("09_EXPORT/control.dbf").exists());
    assert!(dest.join("09_EXPORT/control.shp").exists());
    for copied in &outcome.copied {
        assert!(copied.exists(), "{} missing", copied.display());
    }

    // Drive record still goes out; failed files get no record.
    assert_eq!(sink.posted(EntityKind::Drive).len(), 1);
    let batch = &sink.posted(EntityKind::SensorData)[0];
    let names: Vec<&str> = batch
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["file_name"].as_str().unwrap())
        .collect();
    assert_eq!(names.len(), VENDOR_TREE_MATCHES - 2);
    assert!(!names.contains(&"control.dbf"));
    assert!(!names.contains(&"strip_01.laz"));
}

#[test]
fn test_foreign_key_gating() {
    let temp = TempDir::new().unwrap();
    let system = FakeSystem::unix();
    let sink = MemorySink::new();

    for (nas_id, delivery_id) in [(0, 17), (3, -1), (UNSET_ID, UNSET_ID)] {
        let mut job = prepared_job(&temp, &system);
        job.set_identifiers(nas_id, delivery_id);

        let err = job.copy(&CopyContext::new(&sink, &system)).unwrap_err();
        assert!(matches!(err, Error::MissingForeignKey { .. }), "{err}");
        assert_eq!(job.stage(), CopyStage::Unvalidated);
    }

    assert!(dir_is_empty(&temp.path().join("nas")));
    assert!(sink.requests().is_empty());
}

#[test]
fn test_identifiers_propagate_to_all_records() {
    let temp = TempDir::new().unwrap();
    let system = FakeSystem::unix();
    let mut job = prepared_job(&temp, &system);

    job.set_identifiers(8, 21);
    assert!(job.records().iter().all(|r| r.nas_id == 8 && r.delivery_id == 21));
    assert_eq!(job.drive().nas_id, 8);
    assert_eq!(job.drive().delivery_id, 21);

    job.set_identifiers(-5, 21);
    assert!(job.records().iter().all(|r| r.nas_id == UNSET_ID));
    assert_eq!(job.drive().nas_id, UNSET_ID);
}

#[test]
fn test_missing_destination() {
    let temp = TempDir::new().unwrap();
    let root = create_vendor_tree(temp.path()).unwrap();
    let system = FakeSystem::unix();
    let sink = MemorySink::new();

    let mut job = CopyJob::new(&root, &FolderMapping::riprocess_to_geobc(), &system).unwrap();
    job.set_identifiers(3, 17);
    let err = job.copy(&CopyContext::new(&sink, &system)).unwrap_err();
    assert!(matches!(err, Error::MissingDestination(_)));

    // Resolved address without a local mount.
    job.set_destination(DestinationTarget::new(
        "192.168.1.10:/export/data",
        DescriptorKind::NetworkMount,
        NAS_ADDRESS,
        Port::default(),
        None,
    ));
    let err = job.copy(&CopyContext::new(&sink, &system)).unwrap_err();
    assert!(matches!(err, Error::MissingDestination(msg) if msg.contains("not mounted")));
    assert_eq!(system.probes.get(), 0);
}

#[test]
fn test_unmounted_share_is_missing_destination() {
    let temp = TempDir::new().unwrap();
    let root = create_vendor_tree(temp.path()).unwrap();
    let system = FakeSystem::unix();
    let sink = MemorySink::new();

    let target = DestinationResolver::new(&system)
        .resolve(r"\\192.168.1.10\share", Port::default())
        .unwrap();
    assert!(target.root().is_none());

    let mut job = CopyJob::new(&root, &FolderMapping::riprocess_to_geobc(), &system).unwrap();
    job.set_identifiers(1, 1);
    job.set_destination(target);

    let err = job.copy(&CopyContext::new(&sink, &system)).unwrap_err();
    assert!(matches!(err, Error::MissingDestination(msg) if msg.contains("not mounted")));
    assert!(sink.requests().is_empty());
    assert_eq!(system.probes.get(), 0);
}

#[test]
fn test_unc_share_copies_into_cifs_mount() {
    let temp = TempDir::new().unwrap();
    let root = create_vendor_tree(temp.path()).unwrap();
    let mount_point = temp.path().join("mnt_share");
    fs::create_dir_all(&mount_point).unwrap();

    let system = FakeSystem::unix().with_mount("//192.168.1.10/share", &mount_point, "cifs");
    let sink = MemorySink::new();

    let target = DestinationResolver::new(&system)
        .resolve(r"\\192.168.1.10\share\incoming", Port::default())
        .unwrap();
    let mut job = CopyJob::new(&root, &FolderMapping::riprocess_to_geobc(), &system).unwrap();
    job.set_identifiers(1, 1);
    job.set_destination(target);

    let outcome = job.copy(&CopyContext::new(&sink, &system)).unwrap();
    assert!(outcome.is_success());
    assert!(outcome.copied.iter().all(|p| p.starts_with(mount_point.join("incoming"))));
    assert!(mount_point.join("incoming/09_EXPORT/control.shp").exists());
}

#[test]
fn test_network_gating() {
    let temp = TempDir::new().unwrap();
    let sink = MemorySink::new();

    let unreachable = FakeSystem::unix().unreachable();
    let mut job = prepared_job(&temp, &unreachable);
    let err = job.copy(&CopyContext::new(&sink, &unreachable)).unwrap_err();
    assert!(matches!(err, Error::MissingNetworkProperties(_)));
    assert_eq!(unreachable.probes.get(), 1);

    let system = FakeSystem::unix();
    let dest = temp.path().join("nas");
    job.set_destination(DestinationTarget::new(
        "0.0.0.0",
        DescriptorKind::Ipv4,
        Ipv4Addr::UNSPECIFIED,
        Port::default(),
        Some(dest.clone()),
    ));
    let err = job.copy(&CopyContext::new(&sink, &system)).unwrap_err();
    assert!(matches!(err, Error::MissingNetworkProperties(_)));
    assert_eq!(system.probes.get(), 0);

    assert!(dir_is_empty(&dest));
    assert!(sink.requests().is_empty());
}

#[test]
fn test_repeat_copy_is_idempotent_for_directories() {
    let temp = TempDir::new().unwrap();
    let system = FakeSystem::unix();
    let mut job = prepared_job(&temp, &system);
    let sink = MemorySink::new();
    let ctx = CopyContext::new(&sink, &system);

    let first = job.copy(&ctx).unwrap();
    let second = job.copy(&ctx).unwrap();

    assert!(first.failures.is_empty());
    assert!(second.failures.is_empty());
    assert_eq!(first.copied, second.copied);
    assert_eq!(sink.posted(EntityKind::Drive).len(), 2);
}

#[test]
fn test_rejected_drive_record_is_fatal() {
    let temp = TempDir::new().unwrap();
    let system = FakeSystem::unix();

    for sink in [
        MemorySink::new().rejecting(EntityKind::Drive),
        MemorySink::new().disconnected(EntityKind::Drive),
    ] {
        let mut job = prepared_job(&temp, &system);
        let err = job.copy(&CopyContext::new(&sink, &system)).unwrap_err();

        assert!(matches!(err, Error::Connection(_)), "{err}");
        assert_eq!(job.stage(), CopyStage::Copying);
        assert!(sink.posted(EntityKind::SensorData).is_empty());
        // Files were already copied before the drive record went out.
        assert!(temp.path().join("nas/09_EXPORT/control.shp").exists());
    }
}

#[test]
fn test_rejected_file_records_are_retained() {
    let temp = TempDir::new().unwrap();
    let system = FakeSystem::unix();
    let mut job = prepared_job(&temp, &system);
    let sink = MemorySink::new().rejecting(EntityKind::SensorData);

    let outcome = job.copy(&CopyContext::new(&sink, &system)).unwrap();

    assert!(outcome.failures.is_empty());
    assert!(!outcome.records_submitted);
    assert!(!outcome.is_success());
    assert_eq!(outcome.records.len(), VENDOR_TREE_MATCHES);
    assert!(outcome.records.iter().all(|r| r.keys().is_complete()));
    assert_eq!(job.stage(), CopyStage::Done);
}

#[test]
fn test_overlapping_categories_copied_once() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("drive");
    write_file(&root, "09_EXPORT/shared.kml", b"<kml/>").unwrap();
    let dest = temp.path().join("nas");
    fs::create_dir_all(&dest).unwrap();

    let mapping = FolderMapping::new(
        "overlap",
        vec![
            MappingEntry::new(Category::Coverage, &["09_EXPORT"], &[".kml"]),
            MappingEntry::new(Category::Control, &["09_EXPORT"], &[".kml"]),
        ],
    )
    .unwrap();

    let system = FakeSystem::unix();
    let sink = MemorySink::new();
    let mut job = CopyJob::new(&root, &mapping, &system).unwrap();
    assert_eq!(job.files().len(), 2);
    job.set_identifiers(1, 1);
    job.set_destination(nas_target(&dest));
    job.set_layout(DestinationLayout::Category);

    let outcome = job.copy(&CopyContext::new(&sink, &system)).unwrap();
    assert_eq!(outcome.copied.len(), 1);
    assert!(dest.join("COVERAGE/shared.kml").exists());
    assert!(!dest.join("CONTROL").exists());
    assert_eq!(
        sink.posted(EntityKind::SensorData)[0].as_array().unwrap().len(),
        1
    );
}

#[test]
fn test_category_layout_name_collision_is_a_failure() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("drive");
    write_file(&root, "06_RIEGL_PROC/09_EXPORT/tile.kml", b"FIRST").unwrap();
    write_file(&root, "06_RIEGL_PROC/06_GEOIMAGES/tile.kml", b"SECOND").unwrap();
    let dest = temp.path().join("nas");
    fs::create_dir_all(&dest).unwrap();

    let system = FakeSystem::unix();
    let sink = MemorySink::new();
    let mut job = CopyJob::new(&root, &FolderMapping::riprocess_to_geobc(), &system).unwrap();
    job.set_identifiers(1, 1);
    job.set_destination(nas_target(&dest));
    job.set_layout(DestinationLayout::Category);

    let outcome = job.copy(&CopyContext::new(&sink, &system)).unwrap();

    assert_eq!(outcome.copied, vec![dest.join("COVERAGE/tile.kml")]);
    assert_eq!(fs::read(dest.join("COVERAGE/tile.kml")).unwrap(), b"FIRST");

    assert_eq!(outcome.failures.len(), 1);
    let failure = &outcome.failures[0];
    assert_eq!(failure.code, "EEXIST");
    assert!(failure.path.ends_with("tile.kml"));
    assert!(failure.path.contains("06_GEOIMAGES"));

    let posted = sink.posted(EntityKind::SensorData);
    let batch = posted[0].as_array().unwrap();
    assert_eq!(batch.len(), 1);
    assert!(batch[0]["file_path"].as_str().unwrap().contains("09_EXPORT"));

    // Mirror layout keeps both.
    job.set_layout(DestinationLayout::Mirror);
    let outcome = job.copy(&CopyContext::new(&sink, &system)).unwrap();
    assert!(outcome.failures.is_empty());
    assert_eq!(outcome.copied.len(), 2);
}

#[test]
fn test_category_layout() {
    let temp = TempDir::new().unwrap();
    let system = FakeSystem::unix();
    let mut job = prepared_job(&temp, &system);
    job.set_layout(DestinationLayout::Category);
    let sink = MemorySink::new();

    let outcome = job.copy(&CopyContext::new(&sink, &system)).unwrap();
    assert!(outcome.is_success());

    let dest = temp.path().join("nas");
    assert!(dest.join("AUXILIARY/flight_02/scan_002.rxp").exists());
    assert!(dest.join("AUXILIARY/scan_001.rxp").exists());
    assert!(dest.join("AUXILIARY/project.rdp").exists());
    assert!(dest.join("CONTROL/control.shp").exists());
    assert!(dest.join("RAW_LIDAR/strip_01.laz").exists());
    assert!(dest.join("IMU_GPS/pos.txt").exists());
}

#[test]
fn test_modification_time_preserved() {
    let temp = TempDir::new().unwrap();
    let system = FakeSystem::unix();
    let mut job = prepared_job(&temp, &system);

    let source = temp.path().join("vendor_drive/09_EXPORT/control.shp");
    let past = filetime::FileTime::from_unix_time(1_600_000_000, 0);
    filetime::set_file_mtime(&source, past).unwrap();

    let sink = MemorySink::new();
    job.copy(&CopyContext::new(&sink, &system)).unwrap();

    let copied = fs::metadata(temp.path().join("nas/09_EXPORT/control.shp")).unwrap();
    assert_eq!(
        filetime::FileTime::from_last_modification_time(&copied).unix_seconds(),
        1_600_000_000
    );
}
