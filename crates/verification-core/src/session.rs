//! Signed-in member context, passed explicitly to whatever needs it.

use crate::config::SessionConfig;
use crate::error::StoreError;
use crate::store::{JsonFileStore, RecordStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Profile of the signed-in member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberProfile {
    pub member_id: String,
    pub name: String,
    pub phone_number: String,
    /// Company the member belongs to, once assigned
    #[serde(default)]
    pub company: Option<String>,
}

/// Current member, backed by a record store.
pub struct SessionContext {
    store: Arc<dyn RecordStore<MemberProfile>>,
    member: Option<MemberProfile>,
}

impl SessionContext {
    /// Restore the session persisted in `store`, if any.
    pub fn load(store: Arc<dyn RecordStore<MemberProfile>>) -> Result<Self, StoreError> {
        let member = store.load()?;
        if let Some(profile) = &member {
            info!(member_id = %profile.member_id, "Session restored");
        }
        Ok(Self { store, member })
    }

    /// Restore the session from the file `config` points at.
    pub fn open(config: &SessionConfig) -> Result<Self, StoreError> {
        Self::load(Arc::new(JsonFileStore::<MemberProfile>::new(&config.path)))
    }

    pub fn member(&self) -> Option<&MemberProfile> {
        self.member.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.member.is_some()
    }

    /// Replace the current member and persist it.
    pub fn update(&mut self, profile: MemberProfile) -> Result<(), StoreError> {
        self.store.save(&profile)?;
        info!(member_id = %profile.member_id, "Session updated");
        self.member = Some(profile);
        Ok(())
    }

    /// Sign out.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.store.clear()?;
        self.member = None;
        info!("Session cleared");
        Ok(())
    }
}
