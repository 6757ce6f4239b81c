//! SQLite persistence for pools and predictions.
//!
//! Every multi-row transition runs inside one transaction and is guarded by a
//! conditional `WHERE`, so a lost race rolls back instead of half-applying.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error::SettleError;
use crate::types::{Pool, Prediction};

/// A reward to be written for one prediction at resolution.
#[derive(Debug, Clone, Copy)]
pub struct RewardWrite {
    pub prediction_id: Uuid,
    pub reward: f64,
}

#[derive(Clone)]
pub struct Store {
    db: SqlitePool,
}

impl Store {
    pub async fn connect(url: &str, max_connections: u32, timeout: Duration) -> Result<Self, SettleError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(timeout);

        let db = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(timeout)
            .connect_with(options)
            .await?;

        let store = Self { db };
        store.migrate().await?;
        Ok(store)
    }

    /// Single-connection in-memory store; every handle shares the same database.
    pub async fn in_memory() -> Result<Self, SettleError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { db };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), SettleError> {
        sqlx::migrate!("./migrations").run(&self.db).await?;
        Ok(())
    }

    pub fn db(&self) -> &SqlitePool {
        &self.db
    }

    pub async fn create_pool(&self, deadline: DateTime<Utc>) -> Result<Pool, SettleError> {
        let pool = Pool {
            id: Uuid::new_v4(),
            deadline,
            total_stake: 0.0,
            outcome_value: None,
            is_resolved: false,
        };

        sqlx::query(
            r#"
            INSERT INTO pools (id, deadline, total_stake, outcome_value, is_resolved)
            VALUES (?, ?, 0, NULL, 0)
            "#,
        )
        .bind(pool.id.to_string())
        .bind(pool.deadline.to_rfc3339())
        .execute(&self.db)
        .await?;

        Ok(pool)
    }

    pub async fn get_pool(&self, id: Uuid) -> Result<Option<Pool>, SettleError> {
        let row = sqlx::query(
            r#"
            SELECT id, deadline, total_stake, outcome_value, is_resolved
            FROM pools
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(pool_from_row).transpose()
    }

    pub async fn list_pools(&self) -> Result<Vec<Pool>, SettleError> {
        let rows = sqlx::query(
            r#"
            SELECT id, deadline, total_stake, outcome_value, is_resolved
            FROM pools
            ORDER BY deadline ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(pool_from_row).collect()
    }

    /// Unresolved pools whose deadline is strictly before `now`.
    pub async fn list_expired_unresolved(&self, now: DateTime<Utc>) -> Result<Vec<Pool>, SettleError> {
        let rows = sqlx::query(
            r#"
            SELECT id, deadline, total_stake, outcome_value, is_resolved
            FROM pools
            WHERE is_resolved = 0
            ORDER BY deadline ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        // deadline is RFC3339 text; compare parsed values rather than strings
        let mut expired = Vec::new();
        for row in &rows {
            let pool = pool_from_row(row)?;
            if pool.deadline_passed(now) {
                expired.push(pool);
            }
        }
        Ok(expired)
    }

    pub async fn delete_pool(&self, id: Uuid) -> Result<bool, SettleError> {
        let res = sqlx::query("DELETE FROM pools WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.db)
            .await?;

        Ok(res.rows_affected() > 0)
    }

    pub async fn list_predictions(&self, pool_id: Uuid) -> Result<Vec<Prediction>, SettleError> {
        let rows = sqlx::query(
            r#"
            SELECT id, pool_id, subject, prediction_value, stake_amount, claimable_reward, claimed
            FROM predictions
            WHERE pool_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(pool_id.to_string())
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(prediction_from_row).collect()
    }

    pub async fn find_prediction(
        &self,
        pool_id: Uuid,
        subject: &str,
    ) -> Result<Option<Prediction>, SettleError> {
        let row = sqlx::query(
            r#"
            SELECT id, pool_id, subject, prediction_value, stake_amount, claimable_reward, claimed
            FROM predictions
            WHERE pool_id = ? AND subject = ?
            "#,
        )
        .bind(pool_id.to_string())
        .bind(subject)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(prediction_from_row).transpose()
    }

    /// Adds `stake` to the pool total and upserts the (pool, subject) prediction.
    /// Refuses resolved pools so no stake lands after settlement.
    pub async fn record_prediction(
        &self,
        pool_id: Uuid,
        subject: &str,
        prediction_value: &str,
        stake: f64,
    ) -> Result<Prediction, SettleError> {
        let mut tx = self.db.begin().await?;

        let res = sqlx::query(
            r#"
            UPDATE pools
            SET total_stake = total_stake + ?
            WHERE id = ? AND is_resolved = 0
            "#,
        )
        .bind(stake)
        .bind(pool_id.to_string())
        .execute(&mut *tx)
        .await?;

        if res.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM pools WHERE id = ?")
                .bind(pool_id.to_string())
                .fetch_optional(&mut *tx)
                .await?;

            return Err(match exists {
                Some(_) => SettleError::AlreadyResolved(pool_id),
                None => SettleError::NotFound(pool_id),
            });
        }

        sqlx::query(
            r#"
            INSERT INTO predictions (id, pool_id, subject, prediction_value, stake_amount, claimable_reward, claimed)
            VALUES (?, ?, ?, ?, ?, NULL, 0)
            ON CONFLICT (pool_id, subject) DO UPDATE SET
                prediction_value = excluded.prediction_value,
                stake_amount = predictions.stake_amount + excluded.stake_amount
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(pool_id.to_string())
        .bind(subject)
        .bind(prediction_value)
        .bind(stake)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query(
            r#"
            SELECT id, pool_id, subject, prediction_value, stake_amount, claimable_reward, claimed
            FROM predictions
            WHERE pool_id = ? AND subject = ?
            "#,
        )
        .bind(pool_id.to_string())
        .bind(subject)
        .fetch_one(&mut *tx)
        .await?;

        let prediction = prediction_from_row(&row)?;
        tx.commit().await?;

        Ok(prediction)
    }

    /// Flips the pool to resolved and writes every reward. All or nothing:
    /// a pool that is already resolved or gone, a prediction that appeared
    /// since the caller read the pool, or a reward row that is already set
    /// aborts the transaction.
    ///
    /// The pool update is the first statement so the transaction takes the
    /// write lock up front. Starting with a read would leave a snapshot that
    /// SQLite refuses to upgrade once another connection has committed.
    pub async fn commit_resolution(
        &self,
        pool_id: Uuid,
        outcome: f64,
        rewards: &[RewardWrite],
    ) -> Result<(), SettleError> {
        let mut tx = self.db.begin().await?;

        let res = sqlx::query(
            r#"
            UPDATE pools
            SET outcome_value = ?, is_resolved = 1
            WHERE id = ? AND is_resolved = 0
            "#,
        )
        .bind(outcome)
        .bind(pool_id.to_string())
        .execute(&mut *tx)
        .await?;

        if res.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM pools WHERE id = ?")
                .bind(pool_id.to_string())
                .fetch_optional(&mut *tx)
                .await?;

            return Err(match exists {
                Some(_) => SettleError::AlreadyResolved(pool_id),
                None => SettleError::NotFound(pool_id),
            });
        }

        let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM predictions WHERE pool_id = ?")
            .bind(pool_id.to_string())
            .fetch_one(&mut *tx)
            .await?
            .try_get("n")?;

        if count as usize != rewards.len() {
            return Err(SettleError::ConcurrencyConflict(pool_id));
        }

        for write in rewards {
            let res = sqlx::query(
                r#"
                UPDATE predictions
                SET claimable_reward = ?
                WHERE id = ? AND pool_id = ? AND claimable_reward IS NULL
                "#,
            )
            .bind(write.reward)
            .bind(write.prediction_id.to_string())
            .bind(pool_id.to_string())
            .execute(&mut *tx)
            .await?;

            if res.rows_affected() != 1 {
                return Err(SettleError::ConcurrencyConflict(pool_id));
            }
        }

        tx.commit().await?;
        Ok(())
    }

    /// Compare-and-set on `claimed`. Returns false when another claim won.
    pub async fn mark_claimed(&self, prediction_id: Uuid) -> Result<bool, SettleError> {
        let res = sqlx::query(
            r#"
            UPDATE predictions
            SET claimed = 1
            WHERE id = ?
              AND claimed = 0
              AND claimable_reward IS NOT NULL
              AND claimable_reward > 0
            "#,
        )
        .bind(prediction_id.to_string())
        .execute(&self.db)
        .await?;

        Ok(res.rows_affected() == 1)
    }
}

fn parse_id(raw: &str) -> Result<Uuid, SettleError> {
    Uuid::parse_str(raw).map_err(|e| SettleError::Corrupt(format!("bad id {raw:?}: {e}")))
}

fn pool_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Pool, SettleError> {
    let id: String = row.try_get("id")?;
    let deadline: String = row.try_get("deadline")?;

    let deadline = DateTime::parse_from_rfc3339(&deadline)
        .map_err(|e| SettleError::Corrupt(format!("bad deadline {deadline:?}: {e}")))?
        .with_timezone(&Utc);

    Ok(Pool {
        id: parse_id(&id)?,
        deadline,
        total_stake: row.try_get("total_stake")?,
        outcome_value: row.try_get("outcome_value")?,
        is_resolved: row.try_get("is_resolved")?,
    })
}

fn prediction_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Prediction, SettleError> {
    let id: String = row.try_get("id")?;
    let pool_id: String = row.try_get("pool_id")?;

    Ok(Prediction {
        id: parse_id(&id)?,
        pool_id: parse_id(&pool_id)?,
        subject: row.try_get("subject")?,
        prediction_value: row.try_get("prediction_value")?,
        stake_amount: row.try_get("stake_amount")?,
        claimable_reward: row.try_get("claimable_reward")?,
        claimed: row.try_get("claimed")?,
    })
}
