//! Host system queries used for destination resolution and drive probing.
//!
//! Everything that touches the operating system beyond plain file I/O goes
//! through [`SystemProbe`] so that resolution logic can run against a fixed
//! mount table or drive mapping list.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4, TcpStream};
use std::path::{Path, PathBuf};

/// Mount tables consulted in order on Unix hosts.
const MOUNT_TABLES: &[&str] = &["/proc/self/mounts", "/etc/mtab"];

/// Filesystem types treated as network mounts.
const NETWORK_FS_TYPES: &[&str] = &["nfs", "nfs4", "cifs", "smbfs", "smb3", "afpfs"];

/// Operating system family, selected at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Unix,
    Other,
}

impl Platform {
    #[must_use]
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else if cfg!(unix) {
            Platform::Unix
        } else {
            Platform::Other
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::Unix => "unix",
            Platform::Other => "other",
        }
    }
}

/// One line of the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub source: String,
    pub mount_point: PathBuf,
    pub fs_type: String,
}

impl MountEntry {
    #[must_use]
    pub fn is_network(&self) -> bool {
        NETWORK_FS_TYPES.contains(&self.fs_type.as_str())
    }

    /// Remote host of a network mount: `host` in `host:/export` (NFS) or
    /// `//host/share` (CIFS).
    #[must_use]
    pub fn remote_host(&self) -> Option<&str> {
        if !self.is_network() {
            return None;
        }

        if let Some(rest) = self
            .source
            .strip_prefix("//")
            .or_else(|| self.source.strip_prefix(r"\\"))
        {
            return rest.split(['/', '\\']).next().filter(|h| !h.is_empty());
        }

        self.source
            .split_once(':')
            .map(|(host, _)| host)
            .filter(|h| !h.is_empty())
    }
}

/// A Windows drive letter mapped to a network share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedDrive {
    /// Drive designator such as `Z:`.
    pub local: String,
    /// UNC target such as `\\192.168.1.10\share`.
    pub remote: String,
}

/// Operating system queries needed to resolve network destinations.
pub trait SystemProbe {
    /// Platform the probe reports, used for strategy eligibility.
    fn platform(&self) -> Platform;

    /// Active mounts (empty where the concept does not apply).
    fn mount_table(&self) -> io::Result<Vec<MountEntry>>;

    /// Active network drive mappings.
    fn mapped_drives(&self) -> io::Result<Vec<MappedDrive>>;

    /// Resolve a host name to its first IPv4 address.
    fn lookup_ipv4(&self, host: &str) -> io::Result<Ipv4Addr>;

    /// Open a TCP connection to `addr`; success means reachable.
    fn is_reachable(&self, addr: SocketAddrV4) -> bool;
}

/// [`SystemProbe`] backed by the running host.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostSystem;

impl SystemProbe for HostSystem {
    fn platform(&self) -> Platform {
        Platform::current()
    }

    fn mount_table(&self) -> io::Result<Vec<MountEntry>> {
        if !cfg!(unix) {
            return Ok(Vec::new());
        }

        let mut last_err = io::Error::new(io::ErrorKind::NotFound, "no mount table found");
        for table in MOUNT_TABLES {
            match std::fs::read_to_string(table) {
                Ok(text) => return Ok(parse_mount_table(&text)),
                Err(e) => {
                    log::trace!("Cannot read mount table {table}: {e}");
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    fn mapped_drives(&self) -> io::Result<Vec<MappedDrive>> {
        if !cfg!(windows) {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "network drive mappings are only available on Windows",
            ));
        }

        let output = std::process::Command::new("net").arg("use").output()?;
        if !output.status.success() {
            return Err(io::Error::other(format!(
                "'net use' exited with {}",
                output.status
            )));
        }
        Ok(parse_net_use(&String::from_utf8_lossy(&output.stdout)))
    }

    fn lookup_ipv4(&self, host: &str) -> io::Result<Ipv4Addr> {
        dns_lookup::lookup_host(host)?
            .into_iter()
            .find_map(|ip| match ip {
                IpAddr::V4(v4) => Some(v4),
                IpAddr::V6(_) => None,
            })
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no IPv4 address for host '{host}'"),
                )
            })
    }

    fn is_reachable(&self, addr: SocketAddrV4) -> bool {
        match TcpStream::connect(SocketAddr::V4(addr)) {
            Ok(_) => true,
            Err(e) => {
                log::warn!("Destination {addr} unreachable: {e}");
                false
            }
        }
    }
}

/// Parse `/proc/mounts` style text. Octal escapes (`\040` for space) are
/// decoded in the source and mount point fields.
#[must_use]
pub fn parse_mount_table(text: &str) -> Vec<MountEntry> {
    text.lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let source = fields.next()?;
            let mount_point = fields.next()?;
            let fs_type = fields.next()?;
            Some(MountEntry {
                source: unescape_octal(source),
                mount_point: PathBuf::from(unescape_octal(mount_point)),
                fs_type: fs_type.to_string(),
            })
        })
        .collect()
}

fn unescape_octal(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\'
            && i + 3 < bytes.len()
            && bytes[i + 1..=i + 3].iter().all(|b| (b'0'..=b'7').contains(b))
        {
            let value = bytes[i + 1..=i + 3]
                .iter()
                .fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
            if let Ok(byte) = u8::try_from(value) {
                out.push(byte);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).to_string()
}

/// Parse the output of Windows `net use`.
///
/// Only rows holding a drive designator followed by a UNC path are kept;
/// header, separator and device-less rows are ignored.
#[must_use]
pub fn parse_net_use(text: &str) -> Vec<MappedDrive> {
    text.lines()
        .filter_map(|line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let idx = tokens.iter().position(|t| is_drive_designator(t))?;
            let remote = tokens.get(idx + 1).filter(|t| t.starts_with(r"\\"))?;
            Some(MappedDrive {
                local: tokens[idx].to_ascii_uppercase(),
                remote: (*remote).to_string(),
            })
        })
        .collect()
}

/// `X:` with nothing after the colon.
#[must_use]
pub fn is_drive_designator(token: &str) -> bool {
    let bytes = token.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Mount whose mount point is the longest prefix of `path`.
#[must_use]
pub fn find_mount<'a>(entries: &'a [MountEntry], path: &Path) -> Option<&'a MountEntry> {
    entries
        .iter()
        .filter(|entry| path.starts_with(&entry.mount_point))
        .max_by_key(|entry| entry.mount_point.components().count())
}
