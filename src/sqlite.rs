//! SQLite-backed [`IdentityStore`].
//!
//! Uniqueness is enforced by the schema, not by this process:
//! `accounts.username_key` is `UNIQUE` and `provider_links` is keyed on
//! `(provider, subject)`. Find-or-create inserts the link with
//! `ON CONFLICT DO NOTHING` and falls back to reading the winner's row when
//! the insert lost the race, so several processes may share one database.

use std::collections::BTreeMap;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use time::OffsetDateTime;

use crate::account::{Account, CredentialHash, ProfileDefaults};
use crate::error::Error;
use crate::store::IdentityStore;
use crate::types::{AccountId, Username};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS accounts (
        id              TEXT PRIMARY KEY,
        username        TEXT,
        username_key    TEXT UNIQUE,
        credential_hash TEXT,
        display_name    TEXT,
        picture         TEXT,
        created_at      INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS provider_links (
        provider   TEXT NOT NULL,
        subject    TEXT NOT NULL,
        account_id TEXT NOT NULL REFERENCES accounts(id),
        PRIMARY KEY (provider, subject)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS provider_links_account ON provider_links (account_id)",
];

const ACCOUNT_COLUMNS: &str =
    "id, username, credential_hash, display_name, picture, created_at";

pub struct SqliteIdentityStore {
    pool: SqlitePool,
}

impl SqliteIdentityStore {
    /// Connect to `url` (e.g. `sqlite://accounts.db?mode=rwc`) and create the schema.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the connection or migration fails.
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let pool = pool_options(url)
            .connect(url)
            .await
            .map_err(store_err)?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool and create the schema if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the schema cannot be created.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, Error> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(store_err)?;
        }
        Ok(Self { pool })
    }

    /// Total number of stored accounts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] on query failure.
    pub async fn count(&self) -> Result<i64, Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM accounts")
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?;
        row.try_get("n").map_err(store_err)
    }

    async fn load(&self, row: Option<SqliteRow>) -> Result<Option<Account>, Error> {
        let Some(row) = row else {
            return Ok(None);
        };
        let id: String = row.try_get("id").map_err(store_err)?;
        let links = sqlx::query("SELECT provider, subject FROM provider_links WHERE account_id = ?")
            .bind(&id)
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;

        let mut provider_ids = BTreeMap::new();
        for link in links {
            provider_ids.insert(
                link.try_get::<String, _>("provider").map_err(store_err)?,
                link.try_get::<String, _>("subject").map_err(store_err)?,
            );
        }

        let username = row
            .try_get::<Option<String>, _>("username")
            .map_err(store_err)?
            .map(Username::try_from)
            .transpose()?;
        let created_at = OffsetDateTime::from_unix_timestamp(
            row.try_get::<i64, _>("created_at").map_err(store_err)?,
        )
        .map_err(store_err)?;

        Ok(Some(Account {
            id: id.parse()?,
            username,
            credential_hash: row
                .try_get::<Option<String>, _>("credential_hash")
                .map_err(store_err)?
                .map(CredentialHash::new),
            provider_ids,
            display_name: row.try_get("display_name").map_err(store_err)?,
            picture: row.try_get("picture").map_err(store_err)?,
            created_at,
        }))
    }
}

impl IdentityStore for SqliteIdentityStore {
    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, Error> {
        let row = sqlx::query(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        self.load(row).await
    }

    async fn find_by_username(&self, username: &Username) -> Result<Option<Account>, Error> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username_key = ?"
        ))
        .bind(username.key())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        self.load(row).await
    }

    async fn find_by_provider(
        &self,
        provider: &str,
        subject: &str,
    ) -> Result<Option<Account>, Error> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts \
             WHERE id = (SELECT account_id FROM provider_links WHERE provider = ? AND subject = ?)"
        ))
        .bind(provider)
        .bind(subject)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        self.load(row).await
    }

    async fn create_local(
        &self,
        username: Username,
        credential_hash: CredentialHash,
    ) -> Result<Account, Error> {
        let account = Account::new_local(username, credential_hash);
        let result = sqlx::query(
            "INSERT INTO accounts \
             (id, username, username_key, credential_hash, display_name, picture, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(account.id.to_string())
        .bind(account.username.as_ref().map(Username::as_str))
        .bind(account.username.as_ref().map(Username::key))
        .bind(account.credential_hash.as_ref().map(CredentialHash::as_str))
        .bind(account.display_name.as_deref())
        .bind(account.picture.as_deref())
        .bind(account.created_at.unix_timestamp())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(account),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(Error::DuplicateUsername)
            }
            Err(e) => Err(store_err(e)),
        }
    }

    async fn find_or_create_by_provider(
        &self,
        provider: &str,
        subject: &str,
        defaults: ProfileDefaults,
    ) -> Result<Account, Error> {
        if let Some(existing) = self.find_by_provider(provider, subject).await? {
            return Ok(existing);
        }

        let account = Account::new_provider(provider, subject, defaults);
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        sqlx::query(
            "INSERT INTO accounts (id, display_name, picture, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(account.id.to_string())
        .bind(account.display_name.as_deref())
        .bind(account.picture.as_deref())
        .bind(account.created_at.unix_timestamp())
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        let inserted = sqlx::query(
            "INSERT INTO provider_links (provider, subject, account_id) VALUES (?, ?, ?) \
             ON CONFLICT (provider, subject) DO NOTHING",
        )
        .bind(provider)
        .bind(subject)
        .bind(account.id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        if inserted.rows_affected() == 0 {
            // Lost the race: discard our row and return the winner's.
            tx.rollback().await.map_err(store_err)?;
            return self
                .find_by_provider(provider, subject)
                .await?
                .ok_or_else(|| Error::Store("provider link vanished after conflict".into()));
        }

        tx.commit().await.map_err(store_err)?;
        tracing::debug!(account_id = %account.id, provider, "Provider account created");
        Ok(account)
    }

    async fn link_provider(
        &self,
        id: AccountId,
        provider: &str,
        subject: &str,
    ) -> Result<Account, Error> {
        let account = self.find_by_id(id).await?.ok_or(Error::AccountNotFound)?;
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let owner: Option<String> = sqlx::query(
            "SELECT account_id FROM provider_links WHERE provider = ? AND subject = ?",
        )
        .bind(provider)
        .bind(subject)
        .fetch_optional(&mut *tx)
        .await
        .map_err(store_err)?
        .map(|row| row.try_get("account_id"))
        .transpose()
        .map_err(store_err)?;

        match owner {
            Some(owner) if owner == id.to_string() => {}
            Some(_) => {
                return Err(Error::DuplicateProviderLink {
                    provider: provider.to_owned(),
                    subject: subject.to_owned(),
                });
            }
            None => {
                if account.provider_subject(provider).is_some() {
                    sqlx::query("DELETE FROM provider_links WHERE provider = ? AND account_id = ?")
                        .bind(provider)
                        .bind(id.to_string())
                        .execute(&mut *tx)
                        .await
                        .map_err(store_err)?;
                }
                let result = sqlx::query(
                    "INSERT INTO provider_links (provider, subject, account_id) VALUES (?, ?, ?)",
                )
                .bind(provider)
                .bind(subject)
                .bind(id.to_string())
                .execute(&mut *tx)
                .await;
                match result {
                    Ok(_) => {}
                    Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                        return Err(Error::DuplicateProviderLink {
                            provider: provider.to_owned(),
                            subject: subject.to_owned(),
                        });
                    }
                    Err(e) => return Err(store_err(e)),
                }
            }
        }

        tx.commit().await.map_err(store_err)?;
        self.find_by_id(id).await?.ok_or(Error::AccountNotFound)
    }

    async fn rotate_credential(
        &self,
        id: AccountId,
        credential_hash: CredentialHash,
    ) -> Result<Account, Error> {
        let updated = sqlx::query("UPDATE accounts SET credential_hash = ? WHERE id = ?")
            .bind(credential_hash.as_str())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        if updated.rows_affected() == 0 {
            return Err(Error::AccountNotFound);
        }
        self.find_by_id(id).await?.ok_or(Error::AccountNotFound)
    }
}

fn pool_options(url: &str) -> SqlitePoolOptions {
    if url.contains(":memory:") {
        // Each connection is its own database: pin exactly one, forever.
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(5)
    }
}

fn store_err(e: impl std::fmt::Display) -> Error {
    Error::Store(e.to_string())
}
