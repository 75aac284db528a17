//! Database repository for accounts.
//!
//! Accounts and their quota row form one aggregate: `create` inserts both in
//! a single transaction so the "exactly one quota per account" invariant can
//! not be broken by a crash between the two inserts.

use crate::db::{
    errors::Result,
    handlers::repository::Repository,
    models::accounts::{AccountCreateDBRequest, AccountDBResponse, AccountUpdateDBRequest},
};
use crate::types::AccountId;
use sqlx::{Connection, PgConnection};
use tracing::instrument;

/// Advisory lock key guarding the "is this the first account ever" check.
/// Two concurrent first logins must not both observe an empty table.
const FIRST_ACCOUNT_LOCK_ID: i64 = 0x7076_6563_746C_0001;

/// Filter for listing accounts
#[derive(Debug, Clone)]
pub struct AccountFilter {
    pub skip: i64,
    pub limit: i64,
}

impl Default for AccountFilter {
    fn default() -> Self {
        Self { skip: 0, limit: 200 }
    }
}

pub struct Accounts<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Accounts<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Take the transaction-scoped advisory lock serializing first-account
    /// creation. Only meaningful inside a transaction; released on
    /// commit/rollback.
    pub async fn lock_first_account_creation(&mut self) -> Result<()> {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(FIRST_ACCOUNT_LOCK_ID)
            .execute(&mut *self.db)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    pub async fn count(&mut self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts")
            .fetch_one(&mut *self.db)
            .await?;
        Ok(count)
    }

    #[instrument(skip(self, subject), err)]
    pub async fn get_by_subject(&mut self, subject: &str) -> Result<Option<AccountDBResponse>> {
        let account = sqlx::query_as::<_, AccountDBResponse>("SELECT * FROM accounts WHERE subject = $1")
            .bind(subject)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(account)
    }

    /// Refresh profile fields and the last-seen timestamp on a repeat login.
    #[instrument(skip(self, name, picture), fields(account_id = id), err)]
    pub async fn touch_login(&mut self, id: AccountId, name: &str, picture: Option<&str>) -> Result<AccountDBResponse> {
        let account = sqlx::query_as::<_, AccountDBResponse>(
            "UPDATE accounts SET name = $2, picture = $3, last_login = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(name)
        .bind(picture)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(account)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Accounts<'c> {
    type CreateRequest = AccountCreateDBRequest;
    type UpdateRequest = AccountUpdateDBRequest;
    type Response = AccountDBResponse;
    type Id = AccountId;
    type Filter = AccountFilter;

    #[instrument(skip(self, request), fields(email = %request.email), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let mut tx = self.db.begin().await?;

        let account = sqlx::query_as::<_, AccountDBResponse>(
            r#"
            INSERT INTO accounts (subject, email, name, picture, role, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&request.subject)
        .bind(&request.email)
        .bind(&request.name)
        .bind(&request.picture)
        .bind(request.role)
        .bind(request.status)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO quotas (account_id, max_vcpus, max_ram_gb, max_disk_gb, allowed_networks)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(account.id)
        .bind(request.quota.max_vcpus)
        .bind(request.quota.max_ram_gb)
        .bind(request.quota.max_disk_gb)
        .bind(&request.quota.allowed_networks)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(account)
    }

    #[instrument(skip(self), fields(account_id = id), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let account = sqlx::query_as::<_, AccountDBResponse>("SELECT * FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(account)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let accounts = sqlx::query_as::<_, AccountDBResponse>("SELECT * FROM accounts ORDER BY created_at LIMIT $1 OFFSET $2")
            .bind(filter.limit)
            .bind(filter.skip)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(accounts)
    }

    #[instrument(skip(self, request), fields(account_id = id), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let account = sqlx::query_as::<_, AccountDBResponse>(
            r#"
            UPDATE accounts
            SET role = COALESCE($2, role), status = COALESCE($3, status)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.role)
        .bind(request.status)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(account)
    }
}
