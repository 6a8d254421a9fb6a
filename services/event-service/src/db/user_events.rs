//! User event repository.

use chrono::{DateTime, Utc};
use pridr_id::{AccountId, UserEventId};
use sqlx::PgPool;

use super::StoreError;

const SELECT_COLUMNS: &str = "id, name, date, profile_ids, created_by, created_on";

/// Row from the user_events table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEventRow {
    pub id: UserEventId,
    pub name: String,
    pub date: DateTime<Utc>,
    pub profile_ids: Vec<i32>,
    pub created_by: String,
    pub created_on: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for UserEventRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Self {
            id: UserEventId::new(row.try_get("id")?),
            name: row.try_get("name")?,
            date: row.try_get("date")?,
            profile_ids: row.try_get("profile_ids")?,
            created_by: row.try_get("created_by")?,
            created_on: row.try_get("created_on")?,
        })
    }
}

impl UserEventRow {
    /// Appends profile ids not already present, keeping existing order.
    pub fn add_profiles(&mut self, profile_ids: &[i32]) {
        for id in profile_ids {
            if !self.profile_ids.contains(id) {
                self.profile_ids.push(*id);
            }
        }
    }

    /// Removes every listed profile id.
    pub fn remove_profiles(&mut self, profile_ids: &[i32]) {
        self.profile_ids.retain(|id| !profile_ids.contains(id));
    }
}

/// Values for a new user event.
#[derive(Debug, Clone)]
pub struct NewUserEvent {
    pub name: String,
    pub date: DateTime<Utc>,
    pub profile_ids: Vec<i32>,
    pub created_by: AccountId,
}

/// Partial update of a user event.
#[derive(Debug, Clone, Default)]
pub struct UserEventUpdate {
    pub name: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

/// CRUD access to user events. Every mutation commits on its own.
#[derive(Clone)]
pub struct UserEventRepo {
    pool: PgPool,
}

impl UserEventRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM user_events")
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::Query)
    }

    pub async fn list(&self) -> Result<Vec<UserEventRow>, StoreError> {
        sqlx::query_as::<_, UserEventRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM user_events ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::Query)
    }

    pub async fn get(&self, id: UserEventId) -> Result<Option<UserEventRow>, StoreError> {
        sqlx::query_as::<_, UserEventRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM user_events WHERE id = $1"
        ))
        .bind(id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::Query)
    }

    pub async fn create(&self, event: NewUserEvent) -> Result<UserEventRow, StoreError> {
        sqlx::query_as::<_, UserEventRow>(&format!(
            r#"
            INSERT INTO user_events (name, date, profile_ids, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(&event.name)
        .bind(event.date)
        .bind(&event.profile_ids)
        .bind(event.created_by.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::Query)
    }

    /// Applies a partial update. Returns `None` if the row does not exist.
    pub async fn update(
        &self,
        id: UserEventId,
        update: UserEventUpdate,
    ) -> Result<Option<UserEventRow>, StoreError> {
        sqlx::query_as::<_, UserEventRow>(&format!(
            r#"
            UPDATE user_events
            SET name = COALESCE($2, name),
                date = COALESCE($3, date)
            WHERE id = $1
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(id.value())
        .bind(update.name)
        .bind(update.date)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::Query)
    }

    /// Replaces the profile ids of a row. Returns `None` if it does not exist.
    pub async fn set_profile_ids(
        &self,
        id: UserEventId,
        profile_ids: &[i32],
    ) -> Result<Option<UserEventRow>, StoreError> {
        sqlx::query_as::<_, UserEventRow>(&format!(
            r#"
            UPDATE user_events
            SET profile_ids = $2
            WHERE id = $1
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(id.value())
        .bind(profile_ids)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::Query)
    }

    /// Deletes a row. Returns false if it did not exist.
    pub async fn delete(&self, id: UserEventId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM user_events WHERE id = $1")
            .bind(id.value())
            .execute(&self.pool)
            .await
            .map_err(StoreError::Query)?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(profile_ids: Vec<i32>) -> UserEventRow {
        UserEventRow {
            id: UserEventId::new(1),
            name: "Ride".to_string(),
            date: Utc::now(),
            profile_ids,
            created_by: "U1".to_string(),
            created_on: Utc::now(),
        }
    }

    #[test]
    fn test_add_profiles_skips_existing() {
        let mut event = row(vec![1, 2, 3]);
        event.add_profiles(&[3, 4, 4, 5]);
        assert_eq!(event.profile_ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_remove_profiles_ignores_missing() {
        let mut event = row(vec![4, 2, 6]);
        event.remove_profiles(&[2, 9]);
        assert_eq!(event.profile_ids, vec![4, 6]);
    }
}
