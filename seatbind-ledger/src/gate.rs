//! License ownership check supplied by the token contract.

use std::collections::BTreeSet;
use std::sync::RwLock;

use async_trait::async_trait;
use seatbind_types::{LicenseId, OwnerId};

/// Answers "does this owner hold this license".
#[async_trait]
pub trait LicenseGate: Send + Sync {
    async fn holds_license(&self, owner: &OwnerId, license: LicenseId) -> bool;

    /// Device bindings are not tied to one license, only to a licensed owner.
    async fn holds_any_license(&self, owner: &OwnerId) -> bool;
}

/// In-memory grant table.
#[derive(Debug, Default)]
pub struct StaticLicenseGate {
    grants: RwLock<BTreeSet<(OwnerId, LicenseId)>>,
}

impl StaticLicenseGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&self, owner: OwnerId, license: LicenseId) {
        if let Ok(mut grants) = self.grants.write() {
            grants.insert((owner, license));
        }
    }

    pub fn revoke(&self, owner: &OwnerId, license: LicenseId) {
        if let Ok(mut grants) = self.grants.write() {
            grants.remove(&(*owner, license));
        }
    }
}

#[async_trait]
impl LicenseGate for StaticLicenseGate {
    async fn holds_license(&self, owner: &OwnerId, license: LicenseId) -> bool {
        self.grants
            .read()
            .is_ok_and(|grants| grants.contains(&(*owner, license)))
    }

    async fn holds_any_license(&self, owner: &OwnerId) -> bool {
        self.grants
            .read()
            .is_ok_and(|grants| grants.iter().any(|(holder, _)| holder == owner))
    }
}
