//! Identity repository.

use std::str::FromStr;

use airform_core::UserId;
use airform_platform_access::ProviderIdentity;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::db::{StoreError, decode_error};

/// Storage for provider identities.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Finds an identity by its internal id.
    async fn find_by_id(&self, id: UserId) -> Result<Option<ProviderIdentity>, StoreError>;

    /// Finds an identity by the provider's user id.
    async fn find_by_provider_user_id(
        &self,
        provider_user_id: &str,
    ) -> Result<Option<ProviderIdentity>, StoreError>;

    /// Inserts the identity, or replaces profile and tokens of the one
    /// already stored for the same provider user. Returns the stored row.
    async fn upsert(&self, identity: &ProviderIdentity) -> Result<ProviderIdentity, StoreError>;

    /// Saves refreshed tokens.
    async fn update_tokens(&self, identity: &ProviderIdentity) -> Result<(), StoreError>;
}

/// Row type for identity queries.
#[derive(FromRow)]
struct IdentityRow {
    id: String,
    provider_user_id: String,
    display_name: Option<String>,
    email: Option<String>,
    access_token: String,
    refresh_token: Option<String>,
    token_expires_at: Option<DateTime<Utc>>,
    login_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl IdentityRow {
    fn try_into_identity(self) -> Result<ProviderIdentity, sqlx::Error> {
        let id = UserId::from_str(&self.id).map_err(|e| decode_error("user id", &self.id, e))?;
        Ok(ProviderIdentity::with_all_fields(
            id,
            self.provider_user_id,
            self.display_name,
            self.email,
            self.access_token,
            self.refresh_token,
            self.token_expires_at,
            self.login_at,
            self.created_at,
            self.updated_at,
        ))
    }
}

const IDENTITY_COLUMNS: &str = "id, provider_user_id, display_name, email, access_token, \
     refresh_token, token_expires_at, login_at, created_at, updated_at";

/// PostgreSQL-backed [`IdentityStore`].
#[derive(Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    /// Creates a new identity repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<ProviderIdentity>, StoreError> {
        let row: Option<IdentityRow> =
            sqlx::query_as(&format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE id = $1"))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(IdentityRow::try_into_identity).transpose()?)
    }

    async fn find_by_provider_user_id(
        &self,
        provider_user_id: &str,
    ) -> Result<Option<ProviderIdentity>, StoreError> {
        let row: Option<IdentityRow> = sqlx::query_as(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM identities WHERE provider_user_id = $1"
        ))
        .bind(provider_user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(IdentityRow::try_into_identity).transpose()?)
    }

    async fn upsert(&self, identity: &ProviderIdentity) -> Result<ProviderIdentity, StoreError> {
        let row: IdentityRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO identities ({IDENTITY_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (provider_user_id) DO UPDATE
            SET display_name = EXCLUDED.display_name,
                email = EXCLUDED.email,
                access_token = EXCLUDED.access_token,
                refresh_token = COALESCE(EXCLUDED.refresh_token, identities.refresh_token),
                token_expires_at = EXCLUDED.token_expires_at,
                login_at = EXCLUDED.login_at,
                updated_at = EXCLUDED.updated_at
            RETURNING {IDENTITY_COLUMNS}
            "#
        ))
        .bind(identity.id().to_string())
        .bind(identity.provider_user_id())
        .bind(identity.display_name())
        .bind(identity.email())
        .bind(identity.access_token())
        .bind(identity.refresh_token())
        .bind(identity.token_expires_at())
        .bind(identity.login_at())
        .bind(identity.created_at())
        .bind(identity.updated_at())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_into_identity()?)
    }

    async fn update_tokens(&self, identity: &ProviderIdentity) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE identities
            SET access_token = $2, refresh_token = $3, token_expires_at = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(identity.id().to_string())
        .bind(identity.access_token())
        .bind(identity.refresh_token())
        .bind(identity.token_expires_at())
        .bind(identity.updated_at())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
