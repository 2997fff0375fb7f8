//! MySQL database backend.
//!
//! Expects the table:
//!
//! ```sql
//! CREATE TABLE users (
//!     id       BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY,
//!     name     VARCHAR(255)    NOT NULL UNIQUE,
//!     secret   VARCHAR(255)    NOT NULL,
//!     language VARCHAR(16)     NOT NULL
//! );
//! ```
//!
//! `AUTO_INCREMENT` provides the id non-reuse guarantee the replication
//! protocol depends on.

use async_trait::async_trait;
use greeter_types::{StoreError, StoreResult, UserRecord};
use sqlx::mysql::MySqlRow;
use sqlx::{MySql, MySqlPool, Row, Transaction};

use crate::{UserDatabase, UserTx};

/// MySQL implementation of [`UserDatabase`].
pub struct MySqlDatabase {
    pool: MySqlPool,
}

impl MySqlDatabase {
    /// Connect a pool against the given DSN.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let pool = MySqlPool::connect(url).await.map_err(storage)?;
        Ok(Self { pool })
    }

    pub fn with_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDatabase for MySqlDatabase {
    async fn begin(&self) -> StoreResult<Box<dyn UserTx>> {
        let tx = self.pool.begin().await.map_err(storage)?;
        Ok(Box::new(MySqlTx { tx }))
    }
}

struct MySqlTx {
    tx: Transaction<'static, MySql>,
}

fn storage(err: sqlx::Error) -> StoreError {
    StoreError::Storage(err.to_string())
}

fn record_from(row: &MySqlRow) -> StoreResult<UserRecord> {
    Ok(UserRecord {
        id: row.try_get("id").map_err(storage)?,
        name: row.try_get("name").map_err(storage)?,
        secret: row.try_get("secret").map_err(storage)?,
        language: row.try_get("language").map_err(storage)?,
    })
}

#[async_trait]
impl UserTx for MySqlTx {
    async fn insert_user(&mut self, name: &str, secret: &str, language: &str) -> StoreResult<u64> {
        let result = sqlx::query("INSERT INTO users (name, secret, language) VALUES (?, ?, ?)")
            .bind(name)
            .bind(secret)
            .bind(language)
            .execute(&mut *self.tx)
            .await
            .map_err(|err| match &err {
                sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict,
                _ => storage(err),
            })?;
        Ok(result.last_insert_id())
    }

    async fn get_by_id(&mut self, id: u64) -> StoreResult<Option<UserRecord>> {
        let row = sqlx::query("SELECT id, name, secret, language FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(storage)?;
        row.as_ref().map(record_from).transpose()
    }

    async fn get_by_name(&mut self, name: &str) -> StoreResult<Option<UserRecord>> {
        let row = sqlx::query("SELECT id, name, secret, language FROM users WHERE name = ?")
            .bind(name)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(storage)?;
        row.as_ref().map(record_from).transpose()
    }

    async fn update_user(&mut self, record: &UserRecord) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE users SET name = ?, secret = ?, language = ? WHERE id = ?")
            .bind(&record.name)
            .bind(&record.secret)
            .bind(&record.language)
            .bind(record.id)
            .execute(&mut *self.tx)
            .await
            .map_err(storage)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_user(&mut self, id: u64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(storage)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_ids(&mut self) -> StoreResult<Vec<u64>> {
        let rows = sqlx::query("SELECT id FROM users ORDER BY id")
            .fetch_all(&mut *self.tx)
            .await
            .map_err(storage)?;
        rows.iter()
            .map(|row| row.try_get("id").map_err(storage))
            .collect()
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await.map_err(storage)
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx.rollback().await.map_err(storage)
    }
}
