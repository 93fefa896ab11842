//! Postgres-backed user store.

use crate::domain::{NewUser, User};
use crate::error::UsersError;
use crate::password::hash_password;
use carpool_auth::Role;
use carpool_core::ids::UserId;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

/// Repository over the `users` and `rating_submissions` tables.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Hash the password and insert a new user.
    ///
    /// # Errors
    ///
    /// Returns [`UsersError::EmailTaken`] if the email is already registered,
    /// or [`UsersError::Hashing`] if the password could not be hashed.
    pub async fn register(&self, new_user: NewUser) -> Result<User, UsersError> {
        let password_hash = hash_password(&new_user.password)?;
        let id = UserId::generate();
        let now = Utc::now();

        let row = sqlx::query(
            r"
            INSERT INTO users (id, email, display_name, password_hash, role, rating_sum, rating_count,
                                total_trips_as_driver, total_trips_as_passenger, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, 0, 0, 0, 0, $6, $6)
            RETURNING id, email, display_name, password_hash, role, rating_sum, rating_count,
                      total_trips_as_driver, total_trips_as_passenger, created_at, updated_at
            ",
        )
        .bind(id.as_str())
        .bind(&new_user.email)
        .bind(&new_user.display_name)
        .bind(&password_hash)
        .bind(new_user.role.to_string())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => UsersError::EmailTaken,
            other => UsersError::Database(other),
        })?;

        Ok(Self::row_to_user(&row))
    }

    /// Look up a user by email, for login.
    ///
    /// # Errors
    ///
    /// Returns [`UsersError::InvalidCredentials`] if no such email is registered
    /// - login never reveals whether the email or the password was wrong.
    pub async fn find_by_email(&self, email: &str) -> Result<User, UsersError> {
        let row = sqlx::query(
            r"
            SELECT id, email, display_name, password_hash, role, rating_sum, rating_count,
                   total_trips_as_driver, total_trips_as_passenger, created_at, updated_at
            FROM users WHERE email = $1
            ",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(UsersError::InvalidCredentials)?;

        Ok(Self::row_to_user(&row))
    }

    /// Look up a user by id.
    ///
    /// # Errors
    ///
    /// Returns [`UsersError::NotFound`] if no such user exists.
    pub async fn find(&self, id: &UserId) -> Result<User, UsersError> {
        let row = sqlx::query(
            r"
            SELECT id, email, display_name, password_hash, role, rating_sum, rating_count,
                   total_trips_as_driver, total_trips_as_passenger, created_at, updated_at
            FROM users WHERE id = $1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| UsersError::NotFound(id.to_string()))?;

        Ok(Self::row_to_user(&row))
    }

    /// Record a rating, idempotent per (rater, trip): a repeat submission for
    /// the same pair is a no-op rather than double-counting.
    ///
    /// # Errors
    ///
    /// Returns [`UsersError::Database`] on query failure.
    pub async fn record_rating(&self, ratee_id: &UserId, rater_id: &UserId, trip_id: &str, rating: i16) -> Result<(), UsersError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r"
            INSERT INTO rating_submissions (rater_id, trip_id, ratee_id, rating, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (rater_id, trip_id) DO NOTHING
            ",
        )
        .bind(rater_id.as_str())
        .bind(trip_id)
        .bind(ratee_id.as_str())
        .bind(rating)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 1 {
            sqlx::query(
                r"
                UPDATE users
                SET rating_sum = rating_sum + $2, rating_count = rating_count + 1, updated_at = $3
                WHERE id = $1
                ",
            )
            .bind(ratee_id.as_str())
            .bind(i64::from(rating))
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    fn row_to_user(row: &PgRow) -> User {
        let role = match row.get::<&str, _>("role") {
            "driver" => Role::Driver,
            "both" => Role::Both,
            _ => Role::Passenger,
        };

        User {
            id: UserId::new(row.get::<String, _>("id")),
            email: row.get("email"),
            display_name: row.get("display_name"),
            password_hash: row.get("password_hash"),
            role,
            rating_sum: row.get("rating_sum"),
            rating_count: row.get("rating_count"),
            total_trips_as_driver: row.get("total_trips_as_driver"),
            total_trips_as_passenger: row.get("total_trips_as_passenger"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}
