//! Database repository for per-account quotas.
//!
//! Quota rows are created with their account (see the accounts repository),
//! so this repository only reads and patches existing rows and is keyed by
//! account id rather than its own primary key.

use crate::db::{
    errors::{DbError, Result},
    models::quotas::{QuotaDBResponse, QuotaUpdateDBRequest},
};
use crate::types::AccountId;
use sqlx::PgConnection;
use tracing::instrument;

pub struct Quotas<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Quotas<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(account_id = account_id), err)]
    pub async fn get_for_account(&mut self, account_id: AccountId) -> Result<QuotaDBResponse> {
        let quota = sqlx::query_as::<_, QuotaDBResponse>("SELECT * FROM quotas WHERE account_id = $1")
            .bind(account_id)
            .fetch_optional(&mut *self.db)
            .await?
            .ok_or(DbError::NotFound)?;
        Ok(quota)
    }

    #[instrument(skip(self, request), fields(account_id = account_id), err)]
    pub async fn update_for_account(
        &mut self,
        account_id: AccountId,
        request: &QuotaUpdateDBRequest,
    ) -> Result<QuotaDBResponse> {
        let quota = sqlx::query_as::<_, QuotaDBResponse>(
            r#"
            UPDATE quotas
            SET max_vcpus = COALESCE($2, max_vcpus),
                max_ram_gb = COALESCE($3, max_ram_gb),
                max_disk_gb = COALESCE($4, max_disk_gb),
                allowed_networks = COALESCE($5, allowed_networks)
            WHERE account_id = $1
            RETURNING *
            "#,
        )
        .bind(account_id)
        .bind(request.max_vcpus)
        .bind(request.max_ram_gb)
        .bind(request.max_disk_gb)
        .bind(&request.allowed_networks)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;
        Ok(quota)
    }
}
