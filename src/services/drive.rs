//! Source drive probing: serial number, capacity and file count.
//!
//! Every value is best-effort. A value that cannot be determined is stored as
//! a sentinel (empty serial, NaN capacity) and logged, so a drive on an
//! unusual filesystem still produces a submittable record. Unreadable
//! entries are left out of the file count.

use crate::models::{DriveRecord, ForeignKeys, bytes_to_gb};
use crate::services::system::SystemProbe;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

/// Total and used bytes of the filesystem holding a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    pub total_bytes: u64,
    pub used_bytes: u64,
}

/// Build the drive record for the filesystem holding `root`.
#[must_use]
pub fn probe_drive(root: &Path, system: &dyn SystemProbe, keys: ForeignKeys) -> DriveRecord {
    let serial_number = volume_serial(root, system).unwrap_or_else(|e| {
        log::warn!("Cannot read serial number for {}: {e}", root.display());
        String::new()
    });

    let (storage_total_gb, storage_used_gb) = match capacity(root) {
        Ok(cap) => (bytes_to_gb(cap.total_bytes), bytes_to_gb(cap.used_bytes)),
        Err(e) => {
            log::warn!("Cannot read capacity for {}: {e}", root.display());
            (f64::NAN, f64::NAN)
        }
    };

    let file_count = i64::try_from(count_files(root)).unwrap_or(i64::MAX);

    log::info!(
        "Probed drive at {}: serial='{serial_number}', {storage_used_gb:.2}/{storage_total_gb:.2} GB used, {file_count} files",
        root.display()
    );

    DriveRecord::new(
        serial_number,
        storage_total_gb,
        storage_used_gb,
        file_count,
        keys,
    )
}

/// Regular files under `root`, recursively. Unreadable entries are skipped.
#[must_use]
pub fn count_files(root: &Path) -> u64 {
    let mut count = 0u64;
    for entry in WalkDir::new(root).follow_links(false) {
        match entry {
            Ok(entry) if entry.file_type().is_file() => count += 1,
            Ok(_) => {}
            Err(e) => log::debug!("Skipping unreadable entry while counting: {e}"),
        }
    }
    count
}

/// # Errors
/// Returns the OS error when the filesystem statistics cannot be read.
#[cfg(unix)]
pub fn capacity(root: &Path) -> io::Result<Capacity> {
    let stats = rustix::fs::statvfs(root)?;
    let total_bytes = stats.f_blocks.saturating_mul(stats.f_frsize);
    let free_bytes = stats.f_bfree.saturating_mul(stats.f_frsize);
    Ok(Capacity {
        total_bytes,
        used_bytes: total_bytes.saturating_sub(free_bytes),
    })
}

#[cfg(windows)]
pub fn capacity(root: &Path) -> io::Result<Capacity> {
    use windows_sys::Win32::Storage::FileSystem::GetDiskFreeSpaceExW;

    let wide = to_wide(root);
    let mut available = 0u64;
    let mut total_bytes = 0u64;
    let mut free_bytes = 0u64;

    let status = unsafe {
        GetDiskFreeSpaceExW(
            wide.as_ptr(),
            &mut available,
            &mut total_bytes,
            &mut free_bytes,
        )
    };
    if status == 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(Capacity {
        total_bytes,
        used_bytes: total_bytes.saturating_sub(free_bytes),
    })
}

#[cfg(not(any(unix, windows)))]
pub fn capacity(_root: &Path) -> io::Result<Capacity> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "filesystem capacity is not available on this platform",
    ))
}

/// Hardware serial of the block device backing `root`, taken from the
/// `/dev/disk/by-id` link that points at the mounted device.
#[cfg(target_os = "linux")]
pub fn volume_serial(root: &Path, system: &dyn SystemProbe) -> io::Result<String> {
    use crate::services::system::find_mount;

    let root = std::fs::canonicalize(root)?;
    let mounts = system.mount_table()?;
    let mount = find_mount(&mounts, &root).ok_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "path is not under any mount point")
    })?;

    if !mount.source.starts_with("/dev/") {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is not backed by a block device", mount.source),
        ));
    }
    let device = std::fs::canonicalize(&mount.source)?;

    let mut names: Vec<String> = std::fs::read_dir("/dev/disk/by-id")?
        .filter_map(|entry| entry.ok())
        .filter(|entry| std::fs::canonicalize(entry.path()).is_ok_and(|target| target == device))
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();

    names
        .iter()
        .filter(|name| !name.starts_with("wwn-") && !name.starts_with("nvme-eui."))
        .chain(names.iter())
        .find_map(|name| serial_from_disk_id(name))
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no disk id links to {}", device.display()),
            )
        })
}

/// Volume serial number of the drive holding `root`, in decimal.
#[cfg(windows)]
pub fn volume_serial(root: &Path, _system: &dyn SystemProbe) -> io::Result<String> {
    use std::ptr;
    use windows_sys::Win32::Storage::FileSystem::GetVolumeInformationW;

    let absolute = std::path::absolute(root)?;
    let mut drive_root = absolute
        .ancestors()
        .last()
        .map_or_else(|| absolute.clone(), Path::to_path_buf)
        .into_os_string();
    if !drive_root.to_string_lossy().ends_with('\\') {
        drive_root.push("\\");
    }

    let wide = to_wide(Path::new(&drive_root));
    let mut serial = 0u32;
    let status = unsafe {
        GetVolumeInformationW(
            wide.as_ptr(),
            ptr::null_mut(),
            0,
            &mut serial,
            ptr::null_mut(),
            ptr::null_mut(),
            ptr::null_mut(),
            0,
        )
    };
    if status == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(serial.to_string())
}

#[cfg(not(any(target_os = "linux", windows)))]
pub fn volume_serial(_root: &Path, _system: &dyn SystemProbe) -> io::Result<String> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "volume serial numbers are not available on this platform",
    ))
}

#[cfg(windows)]
fn to_wide(path: &Path) -> Vec<u16> {
    use std::os::windows::ffi::OsStrExt;
    path.as_os_str().encode_wide().chain(Some(0)).collect()
}

/// Extract the serial from a `/dev/disk/by-id` name such as
/// `usb-Seagate_Expansion_NAAB1234-0:0-part1`.
///
/// The bus prefix, partition suffix and LUN suffix are removed; the serial
/// is the last underscore-separated field of what remains.
#[must_use]
pub fn serial_from_disk_id(name: &str) -> Option<String> {
    let (_bus, rest) = name.split_once('-')?;

    let rest = match rest.rsplit_once("-part") {
        Some((head, part)) if !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()) => head,
        _ => rest,
    };
    let rest = match rest.rsplit_once('-') {
        Some((head, lun)) if lun.contains(':') => head,
        _ => rest,
    };

    rest.rsplit('_')
        .next()
        .filter(|serial| !serial.is_empty())
        .map(str::to_string)
}
