use seatbind_types::{ActionId, IdentityCommitment, LicenseId, OwnerId, SlotIndex, DEVICE_SLOTS};
use std::collections::BTreeMap;
use std::str::FromStr;

// ── OwnerId ───────────────────────────────────────────────────────

#[test]
fn owner_id_display_and_parse() {
    let owner = OwnerId::from_bytes([7u8; 32]);
    let s = owner.to_string();
    assert_eq!(s.len(), 64);
    let parsed = OwnerId::parse(&s).unwrap();
    assert_eq!(owner, parsed);
}

#[test]
fn owner_id_from_str() {
    let owner = OwnerId::from_bytes([0xAB; 32]);
    let parsed = OwnerId::from_str(&owner.to_string()).unwrap();
    assert_eq!(parsed.as_bytes(), &[0xAB; 32]);
}

#[test]
fn owner_id_rejects_short_hex() {
    assert!(OwnerId::parse("abcd").is_err());
    assert!(OwnerId::parse("not hex at all").is_err());
}

#[test]
fn owner_id_serializes_as_map_key() {
    let mut map = BTreeMap::new();
    map.insert(OwnerId::from_bytes([1u8; 32]), 5u32);
    let json = serde_json::to_string(&map).unwrap();
    let parsed: BTreeMap<OwnerId, u32> = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, map);
}

// ── LicenseId ─────────────────────────────────────────────────────

#[test]
fn license_id_serde_is_transparent() {
    let json = serde_json::to_string(&LicenseId::new(42)).unwrap();
    assert_eq!(json, "42");
    let parsed: LicenseId = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.value(), 42);
}

// ── ActionId ──────────────────────────────────────────────────────

#[test]
fn action_id_new_is_unique() {
    assert_ne!(ActionId::new(), ActionId::new());
}

#[test]
fn action_id_display_and_parse() {
    let id = ActionId::new();
    let parsed = ActionId::parse(&id.to_string()).unwrap();
    assert_eq!(id, parsed);
}

// ── SlotIndex ─────────────────────────────────────────────────────

#[test]
fn slot_index_bounds() {
    assert!(SlotIndex::new(0).is_err());
    assert!(SlotIndex::new(1).is_ok());
    assert!(SlotIndex::new(DEVICE_SLOTS as u8).is_ok());
    assert!(SlotIndex::new(DEVICE_SLOTS as u8 + 1).is_err());
}

#[test]
fn slot_index_offset() {
    assert_eq!(SlotIndex::new(1).unwrap().offset(), 0);
    assert_eq!(SlotIndex::new(4).unwrap().offset(), 3);
}

#[test]
fn slot_index_serde_rejects_out_of_range() {
    assert!(serde_json::from_str::<SlotIndex>("0").is_err());
    assert!(serde_json::from_str::<SlotIndex>("5").is_err());
    let slot: SlotIndex = serde_json::from_str("2").unwrap();
    assert_eq!(slot.get(), 2);
}

#[test]
fn slot_index_all_in_order() {
    let all: Vec<u8> = SlotIndex::all().map(|s| s.get()).collect();
    assert_eq!(all, vec![1, 2, 3, 4]);
}

// ── IdentityCommitment ────────────────────────────────────────────

#[test]
fn commitment_zero_is_reserved() {
    assert!(IdentityCommitment::ZERO.is_zero());
    assert!(!IdentityCommitment::from_bytes([1u8; 32]).is_zero());
}

#[test]
fn commitment_hex_roundtrip() {
    let c = IdentityCommitment::from_bytes([0x5A; 32]);
    let json = serde_json::to_string(&c).unwrap();
    assert!(json.contains("5a5a"));
    let parsed: IdentityCommitment = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, c);
}

#[test]
fn commitment_debug_is_abbreviated() {
    let c = IdentityCommitment::from_bytes([0xFF; 32]);
    let dbg = format!("{c:?}");
    assert!(dbg.len() < 40);
}
