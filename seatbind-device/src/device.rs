//! Raw hardware identifiers for license binding.
//!
//! Collects the identifiers that make up a device identity. Values are
//! returned exactly as the platform reports them; separators, case and
//! width are normalized later by the canonical encoder.

use crate::error::DeviceResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Names the fields of a [`RawIdentifierSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IdentifierField {
    CpuId,
    SystemSerial,
    SystemUuid,
    BaseboardSerial,
    MacEthernet,
    MacWifi,
    DiskSerial,
}

impl IdentifierField {
    /// All fields in commitment order.
    pub const ALL: [IdentifierField; 7] = [
        Self::CpuId,
        Self::SystemSerial,
        Self::SystemUuid,
        Self::BaseboardSerial,
        Self::MacEthernet,
        Self::MacWifi,
        Self::DiskSerial,
    ];

    /// Returns the field name as used in JSON files.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::CpuId => "cpuId",
            Self::SystemSerial => "systemSerial",
            Self::SystemUuid => "systemUUID",
            Self::BaseboardSerial => "baseboardSerial",
            Self::MacEthernet => "macEthernet",
            Self::MacWifi => "macWifi",
            Self::DiskSerial => "diskSerial",
        }
    }
}

impl fmt::Display for IdentifierField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The raw identifiers of one device. Private to the client.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct RawIdentifierSet {
    pub cpu_id: String,
    pub system_serial: String,
    #[serde(rename = "systemUUID")]
    pub system_uuid: String,
    pub baseboard_serial: String,
    pub mac_ethernet: String,
    pub mac_wifi: String,
    pub disk_serial: String,
}

impl RawIdentifierSet {
    /// Collects identifiers for the current device.
    ///
    /// Identifiers the platform does not expose are left empty; the encoder
    /// reports which of them are required.
    #[must_use]
    pub fn collect() -> Self {
        let set = collect_platform();
        debug!("Collected raw device identifiers, missing: {:?}", set.missing_fields());
        set
    }

    /// Loads an identifier set from a JSON file.
    pub fn from_json_file(path: &Path) -> DeviceResult<Self> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Returns the value of one field.
    #[must_use]
    pub fn field(&self, field: IdentifierField) -> &str {
        match field {
            IdentifierField::CpuId => &self.cpu_id,
            IdentifierField::SystemSerial => &self.system_serial,
            IdentifierField::SystemUuid => &self.system_uuid,
            IdentifierField::BaseboardSerial => &self.baseboard_serial,
            IdentifierField::MacEthernet => &self.mac_ethernet,
            IdentifierField::MacWifi => &self.mac_wifi,
            IdentifierField::DiskSerial => &self.disk_serial,
        }
    }

    /// Returns the fields that are empty after trimming.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<IdentifierField> {
        IdentifierField::ALL
            .into_iter()
            .filter(|f| self.field(*f).trim().is_empty())
            .collect()
    }
}

impl fmt::Debug for RawIdentifierSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("RawIdentifierSet");
        for field in IdentifierField::ALL {
            let len = self.field(field).len();
            s.field(field.name(), &format_args!("<{len} bytes redacted>"));
        }
        s.finish()
    }
}

#[cfg(target_os = "linux")]
fn collect_platform() -> RawIdentifierSet {
    let (mac_ethernet, mac_wifi) = linux::mac_addresses();
    RawIdentifierSet {
        cpu_id: linux::cpu_id().unwrap_or_default(),
        system_serial: linux::dmi("product_serial").unwrap_or_default(),
        system_uuid: linux::dmi("product_uuid").unwrap_or_default(),
        baseboard_serial: linux::dmi("board_serial").unwrap_or_default(),
        mac_ethernet: mac_ethernet.unwrap_or_default(),
        mac_wifi: mac_wifi.unwrap_or_default(),
        disk_serial: linux::disk_serial().unwrap_or_default(),
    }
}

#[cfg(target_os = "macos")]
fn collect_platform() -> RawIdentifierSet {
    let platform = macos::ioreg_platform();
    let serial = macos::ioreg_value(&platform, "IOPlatformSerialNumber").unwrap_or_default();
    RawIdentifierSet {
        cpu_id: macos::sysctl("machdep.cpu.brand_string").unwrap_or_default(),
        baseboard_serial: macos::ioreg_value(&platform, "board-id").unwrap_or_else(|| serial.clone()),
        system_serial: serial,
        system_uuid: macos::ioreg_value(&platform, "IOPlatformUUID").unwrap_or_default(),
        mac_ethernet: macos::ether("en0").unwrap_or_default(),
        mac_wifi: macos::ether("en1").unwrap_or_default(),
        disk_serial: String::new(),
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn collect_platform() -> RawIdentifierSet {
    // Would use WMI on Windows; callers provision identifiers via JSON instead.
    RawIdentifierSet::default()
}

#[cfg(target_os = "linux")]
mod linux {
    use std::fs;
    use std::path::Path;

    fn read_trimmed(path: &Path) -> Option<String> {
        fs::read_to_string(path)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Reads a DMI attribute. Serial numbers usually require root.
    pub(super) fn dmi(name: &str) -> Option<String> {
        read_trimmed(&Path::new("/sys/class/dmi/id").join(name))
    }

    /// ARM boards expose `Serial`; x86 falls back to vendor + model name.
    pub(super) fn cpu_id() -> Option<String> {
        let info = fs::read_to_string("/proc/cpuinfo").ok()?;
        let value_of = |key: &str| {
            info.lines()
                .find(|l| l.split(':').next().map(str::trim) == Some(key))
                .and_then(|l| l.split_once(':'))
                .map(|(_, v)| v.trim().to_string())
        };
        value_of("Serial").or_else(|| {
            let vendor = value_of("vendor_id")?;
            let model = value_of("model name")?;
            Some(format!("{vendor} {model}"))
        })
    }

    /// Returns (ethernet, wifi) MAC addresses of the first matching interfaces.
    pub(super) fn mac_addresses() -> (Option<String>, Option<String>) {
        let mut ethernet = None;
        let mut wifi = None;
        let Ok(entries) = fs::read_dir("/sys/class/net") else {
            return (None, None);
        };
        let mut names: Vec<_> = entries
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();

        for name in names {
            let dir = Path::new("/sys/class/net").join(&name);
            let Some(addr) = read_trimmed(&dir.join("address")) else {
                continue;
            };
            if addr == "00:00:00:00:00:00" {
                continue;
            }
            if dir.join("wireless").exists() || name.starts_with("wl") {
                wifi.get_or_insert(addr);
            } else if name.starts_with("en") || name.starts_with("eth") {
                ethernet.get_or_insert(addr);
            }
        }
        (ethernet, wifi)
    }

    pub(super) fn disk_serial() -> Option<String> {
        let mut devices: Vec<_> = fs::read_dir("/sys/block")
            .ok()?
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| !n.starts_with("loop") && !n.starts_with("ram") && !n.starts_with("zram"))
            .collect();
        devices.sort();
        devices.into_iter().find_map(|dev| {
            let base = Path::new("/sys/block").join(dev).join("device");
            read_trimmed(&base.join("serial")).or_else(|| read_trimmed(&base.join("vpd_pg80")))
        })
    }
}

#[cfg(target_os = "macos")]
mod macos {
    use std::process::Command;

    fn run(cmd: &str, args: &[&str]) -> Option<String> {
        Command::new(cmd)
            .args(args)
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
    }

    pub(super) fn ioreg_platform() -> String {
        run("ioreg", &["-rd1", "-c", "IOPlatformExpertDevice"]).unwrap_or_default()
    }

    pub(super) fn ioreg_value(output: &str, key: &str) -> Option<String> {
        output
            .lines()
            .find(|l| l.contains(&format!("\"{key}\"")))
            .and_then(|l| l.split('"').nth(3))
            .map(String::from)
    }

    pub(super) fn sysctl(name: &str) -> Option<String> {
        run("sysctl", &["-n", name]).map(|s| s.trim().to_string())
    }

    pub(super) fn ether(iface: &str) -> Option<String> {
        run("ifconfig", &[iface])?
            .lines()
            .find_map(|l| l.trim().strip_prefix("ether ").map(|v| v.trim().to_string()))
    }
}
