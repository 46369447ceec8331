//! In-memory stores for router tests.

use std::collections::HashMap;
use std::sync::Mutex;

use airform_core::{FormId, ResponseId, UserId};
use airform_platform_access::ProviderIdentity;
use async_trait::async_trait;

use super::{FormRecord, FormStore, ResponseRecord, ResponseStore, StoreError};
use crate::auth::db::IdentityStore;

#[derive(Default)]
pub struct MemoryIdentityStore {
    rows: Mutex<HashMap<UserId, ProviderIdentity>>,
}

impl MemoryIdentityStore {
    pub fn all(&self) -> Vec<ProviderIdentity> {
        self.rows.lock().expect("lock").values().cloned().collect()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<ProviderIdentity>, StoreError> {
        Ok(self.rows.lock().expect("lock").get(&id).cloned())
    }

    async fn find_by_provider_user_id(
        &self,
        provider_user_id: &str,
    ) -> Result<Option<ProviderIdentity>, StoreError> {
        Ok(self
            .rows
            .lock()
            .expect("lock")
            .values()
            .find(|i| i.provider_user_id() == provider_user_id)
            .cloned())
    }

    async fn upsert(&self, identity: &ProviderIdentity) -> Result<ProviderIdentity, StoreError> {
        let mut rows = self.rows.lock().expect("lock");
        let existing = rows
            .values()
            .find(|i| i.provider_user_id() == identity.provider_user_id())
            .map(ProviderIdentity::id);
        let stored = match existing {
            Some(id) => ProviderIdentity::with_all_fields(
                id,
                identity.provider_user_id().to_string(),
                identity.display_name().map(str::to_string),
                identity.email().map(str::to_string),
                identity.access_token().to_string(),
                identity
                    .refresh_token()
                    .or_else(|| rows.get(&id).and_then(|i| i.refresh_token()))
                    .map(str::to_string),
                identity.token_expires_at(),
                identity.login_at(),
                rows.get(&id).map_or(identity.created_at(), |i| i.created_at()),
                identity.updated_at(),
            ),
            None => identity.clone(),
        };
        rows.insert(stored.id(), stored.clone());
        Ok(stored)
    }

    async fn update_tokens(&self, identity: &ProviderIdentity) -> Result<(), StoreError> {
        self.rows
            .lock()
            .expect("lock")
            .insert(identity.id(), identity.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryFormStore {
    rows: Mutex<HashMap<FormId, FormRecord>>,
}

impl MemoryFormStore {
    pub fn len(&self) -> usize {
        self.rows.lock().expect("lock").len()
    }
}

#[async_trait]
impl FormStore for MemoryFormStore {
    async fn insert(&self, form: &FormRecord) -> Result<(), StoreError> {
        self.rows.lock().expect("lock").insert(form.id, form.clone());
        Ok(())
    }

    async fn find(&self, id: FormId) -> Result<Option<FormRecord>, StoreError> {
        Ok(self.rows.lock().expect("lock").get(&id).cloned())
    }

    async fn list_for_owner(&self, owner_id: UserId) -> Result<Vec<FormRecord>, StoreError> {
        let mut forms: Vec<_> = self
            .rows
            .lock()
            .expect("lock")
            .values()
            .filter(|f| f.owner_id == owner_id)
            .cloned()
            .collect();
        forms.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(forms)
    }

    async fn update(&self, form: &FormRecord) -> Result<bool, StoreError> {
        let mut rows = self.rows.lock().expect("lock");
        match rows.get_mut(&form.id) {
            Some(existing) if existing.owner_id == form.owner_id => {
                *existing = form.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, id: FormId, owner_id: UserId) -> Result<bool, StoreError> {
        let mut rows = self.rows.lock().expect("lock");
        if rows.get(&id).is_some_and(|f| f.owner_id == owner_id) {
            rows.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }
}

#[derive(Default)]
pub struct MemoryResponseStore {
    rows: Mutex<HashMap<ResponseId, ResponseRecord>>,
}

impl MemoryResponseStore {
    pub fn len(&self) -> usize {
        self.rows.lock().expect("lock").len()
    }
}

#[async_trait]
impl ResponseStore for MemoryResponseStore {
    async fn insert(&self, response: &ResponseRecord) -> Result<(), StoreError> {
        self.rows
            .lock()
            .expect("lock")
            .insert(response.id, response.clone());
        Ok(())
    }

    async fn find(&self, id: ResponseId) -> Result<Option<ResponseRecord>, StoreError> {
        Ok(self.rows.lock().expect("lock").get(&id).cloned())
    }

    async fn list_for_form(&self, form_id: FormId) -> Result<Vec<ResponseRecord>, StoreError> {
        let mut responses: Vec<_> = self
            .rows
            .lock()
            .expect("lock")
            .values()
            .filter(|r| r.form_id == form_id)
            .cloned()
            .collect();
        responses.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(responses)
    }

    async fn update(&self, response: &ResponseRecord) -> Result<(), StoreError> {
        self.rows
            .lock()
            .expect("lock")
            .insert(response.id, response.clone());
        Ok(())
    }

    async fn delete(&self, id: ResponseId) -> Result<bool, StoreError> {
        Ok(self.rows.lock().expect("lock").remove(&id).is_some())
    }
}
