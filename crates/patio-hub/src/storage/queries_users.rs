//! User account queries for the Patio hub.

use patio_core::db::{DatabaseError, unix_timestamp};
use sqlx::{QueryBuilder, Sqlite};

use super::db::HubDatabase;
use super::models::{NewUserRecord, User, UserUpdate};
use crate::identity::{Email, ObjectId, UserFilter};

impl HubDatabase {
    /// Insert a new account.
    ///
    /// Email uniqueness is checked up front and enforced by the `UNIQUE`
    /// constraint on `users.email`.
    pub async fn insert_user(&self, user: &NewUserRecord) -> Result<User, DatabaseError> {
        if self.count_users_by_email(&user.email).await? != 0 {
            return Err(DatabaseError::DuplicateKey(format!(
                "user {} already registered",
                user.email
            )));
        }

        let id = ObjectId::new().to_hex();
        let now = unix_timestamp();

        sqlx::query(
            "INSERT INTO users (id, name, email, role, telegid, auth, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&user.name)
        .bind(user.email.as_str())
        .bind(user.role)
        .bind(user.telegid)
        .bind(&user.auth)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.get_user(&UserFilter::ByNaturalKey(user.email.clone()))
            .await
    }

    /// Get a single account.
    pub async fn get_user(&self, filter: &UserFilter) -> Result<User, DatabaseError> {
        let sql = format!("SELECT * FROM users WHERE {} = ?", filter.field());
        sqlx::query_as::<_, User>(&sql)
            .bind(filter.value())
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("User {filter}")))
    }

    pub async fn count_users_by_email(&self, email: &Email) -> Result<i64, DatabaseError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email.as_str())
            .fetch_one(self.pool())
            .await?;
        Ok(count)
    }

    /// All accounts with this email. More than one means the store is broken.
    pub async fn find_users_by_email(&self, email: &Email) -> Result<Vec<User>, DatabaseError> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email.as_str())
            .fetch_all(self.pool())
            .await?;
        Ok(users)
    }

    /// Patch the given columns. Returns the number of rows matched.
    pub async fn update_user(
        &self,
        filter: &UserFilter,
        update: &UserUpdate,
    ) -> Result<u64, DatabaseError> {
        let mut query = QueryBuilder::<Sqlite>::new("UPDATE users SET updated_at = ");
        query.push_bind(unix_timestamp());
        if let Some(name) = &update.name {
            query.push(", name = ").push_bind(name.clone());
        }
        if let Some(auth) = &update.auth {
            query.push(", auth = ").push_bind(auth.clone());
        }
        if let Some(telegid) = update.telegid {
            query.push(", telegid = ").push_bind(telegid);
        }
        query
            .push(format!(" WHERE {} = ", filter.field()))
            .push_bind(filter.value());

        let result = query.build().execute(self.pool()).await?;
        Ok(result.rows_affected())
    }

    /// Hard-delete an account. Zero rows is reported as `NotFound`.
    pub async fn delete_user(&self, filter: &UserFilter) -> Result<(), DatabaseError> {
        let sql = format!("DELETE FROM users WHERE {} = ?", filter.field());
        let result = sqlx::query(&sql)
            .bind(filter.value())
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("User {filter}")));
        }
        Ok(())
    }
}
