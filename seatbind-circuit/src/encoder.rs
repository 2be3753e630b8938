//! Canonical encoding of raw identifiers into fixed-width byte fields.

use std::fmt;

use seatbind_device::{IdentifierField, RawIdentifierSet};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{EncodeError, FormatIssue};

/// Width of the free-form fields (CPU id, serials).
pub const FREE_FORM_WIDTH: usize = 64;
/// Hex digits in a system UUID.
pub const UUID_WIDTH: usize = 32;
/// Hex digits in a MAC address.
pub const MAC_WIDTH: usize = 12;

/// Separators removed from UUIDs and MAC addresses.
const SEPARATORS: [char; 2] = ['-', ':'];

/// Fixed-width, field-safe device identifiers.
///
/// Free-form fields are left-aligned and zero padded. Hex fields hold
/// uppercase ASCII digits. Fields are public so that circuits can be
/// exercised with inputs the encoder would never produce.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct EncodedIdentifiers {
    pub cpu_id: [u8; FREE_FORM_WIDTH],
    pub system_serial: [u8; FREE_FORM_WIDTH],
    pub system_uuid: [u8; UUID_WIDTH],
    pub baseboard_serial: [u8; FREE_FORM_WIDTH],
    pub mac_ethernet: [u8; MAC_WIDTH],
    pub mac_wifi: [u8; MAC_WIDTH],
    pub disk_serial: [u8; FREE_FORM_WIDTH],
}

impl EncodedIdentifiers {
    /// An all-zero witness. Used to synthesize reference circuit shapes; it
    /// does not satisfy the identity constraints.
    #[must_use]
    pub fn blank() -> Self {
        Self {
            cpu_id: [0; FREE_FORM_WIDTH],
            system_serial: [0; FREE_FORM_WIDTH],
            system_uuid: [0; UUID_WIDTH],
            baseboard_serial: [0; FREE_FORM_WIDTH],
            mac_ethernet: [0; MAC_WIDTH],
            mac_wifi: [0; MAC_WIDTH],
            disk_serial: [0; FREE_FORM_WIDTH],
        }
    }

    /// Returns the bytes of one field.
    #[must_use]
    pub fn field(&self, field: IdentifierField) -> &[u8] {
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
}

impl fmt::Debug for EncodedIdentifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncodedIdentifiers { <redacted> }")
    }
}

/// Whether a field holds uppercase hex rather than free-form bytes.
#[must_use]
pub fn is_hex_field(field: IdentifierField) -> bool {
    matches!(
        field,
        IdentifierField::SystemUuid | IdentifierField::MacEthernet | IdentifierField::MacWifi
    )
}

/// Normalizes `raw` into its canonical fixed-width encoding.
pub fn encode(raw: &RawIdentifierSet) -> Result<EncodedIdentifiers, EncodeError> {
    let mut out = EncodedIdentifiers::blank();
    free_form(&mut out.cpu_id, IdentifierField::CpuId, &raw.cpu_id, false)?;
    free_form(&mut out.system_serial, IdentifierField::SystemSerial, &raw.system_serial, true)?;
    hex_digits(&mut out.system_uuid, IdentifierField::SystemUuid, &raw.system_uuid)?;
    free_form(
        &mut out.baseboard_serial,
        IdentifierField::BaseboardSerial,
        &raw.baseboard_serial,
        true,
    )?;
    hex_digits(&mut out.mac_ethernet, IdentifierField::MacEthernet, &raw.mac_ethernet)?;
    hex_digits(&mut out.mac_wifi, IdentifierField::MacWifi, &raw.mac_wifi)?;
    free_form(&mut out.disk_serial, IdentifierField::DiskSerial, &raw.disk_serial, false)?;
    Ok(out)
}

fn free_form(
    dst: &mut [u8],
    field: IdentifierField,
    value: &str,
    required: bool,
) -> Result<(), EncodeError> {
    let bytes = value.trim().as_bytes();
    if required && bytes.is_empty() {
        return Err(EncodeError::new(field, FormatIssue::Empty));
    }
    if bytes.len() > dst.len() {
        return Err(EncodeError::new(
            field,
            FormatIssue::TooLong { max: dst.len(), actual: bytes.len() },
        ));
    }
    if bytes.contains(&0) {
        return Err(EncodeError::new(field, FormatIssue::NulByte));
    }
    dst[..bytes.len()].copy_from_slice(bytes);
    Ok(())
}

fn hex_digits(dst: &mut [u8], field: IdentifierField, value: &str) -> Result<(), EncodeError> {
    let digits: Vec<u8> = value
        .trim()
        .chars()
        .filter(|c| !SEPARATORS.contains(c))
        .map(|c| c.to_ascii_uppercase())
        .collect::<String>()
        .into_bytes();
    if digits.is_empty() {
        return Err(EncodeError::new(field, FormatIssue::Empty));
    }
    if !digits.iter().all(|b| matches!(b, b'0'..=b'9' | b'A'..=b'F')) {
        return Err(EncodeError::new(field, FormatIssue::NotHex));
    }
    if digits.len() != dst.len() {
        return Err(EncodeError::new(
            field,
            FormatIssue::WrongLength { expected: dst.len(), actual: digits.len() },
        ));
    }
    dst.copy_from_slice(&digits);
    Ok(())
}
