//! Shared test helpers for circuit tests.

#![allow(dead_code)]

use seatbind_circuit::{AttestingProver, EncodedIdentifiers, encode};
use seatbind_device::RawIdentifierSet;

/// A prover with a fixed key.
pub fn test_prover() -> AttestingProver {
    let seed: [u8; 32] = [
        7, 1, 4, 2, 8, 5, 7, 1, 4, 2, 8, 5, 7, 1, 4, 2, 8, 5, 7, 1, 4, 2, 8, 5, 7, 1, 4, 2, 8,
        5, 7, 1,
    ];
    AttestingProver::from_bytes(&seed)
}

/// Raw identifiers of the `n`-th test device.
pub fn raw_device(n: u8) -> RawIdentifierSet {
    RawIdentifierSet {
        cpu_id: format!("GenuineIntel Family 6 Model {n}"),
        system_serial: format!("SN-{n:04}"),
        system_uuid: format!("4c4c4544-0038-5910-8051-b4c04f4e39{n:02x}"),
        baseboard_serial: format!("/BB{n:03}/"),
        mac_ethernet: format!("a4:bb:6d:01:02:{n:02x}"),
        mac_wifi: format!("f8-e4-e3-0a-0b-{n:02x}"),
        disk_serial: format!("S6B0NL0W{n:06}"),
    }
}

/// Encoded identifiers of the `n`-th test device.
pub fn device(n: u8) -> EncodedIdentifiers {
    encode(&raw_device(n)).unwrap()
}
