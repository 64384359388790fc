//! User directory and course catalog backed by PostgreSQL.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::warn;

use notify_core::error::AppError;
use notify_core::result::AppResult;
use notify_core::types::{CourseKey, UserId};
use notify_entity::user::{CourseRole, CourseSummary, UserProfile};

use crate::store::{CourseCatalog, UserDirectory};

/// Repository for users, roles and course metadata.
#[derive(Debug, Clone)]
pub struct DirectoryRepository {
    pool: PgPool,
}

impl DirectoryRepository {
    /// Create a new directory repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_roles(rows: Vec<(UserId, String)>) -> HashMap<UserId, Vec<CourseRole>> {
    let mut roles: HashMap<UserId, Vec<CourseRole>> = HashMap::new();
    for (user_id, name) in rows {
        match name.parse::<CourseRole>() {
            Ok(role) => roles.entry(user_id).or_default().push(role),
            Err(e) => warn!(user_id = %user_id, error = %e, "Ignoring unknown role"),
        }
    }
    roles
}

#[async_trait]
impl UserDirectory for DirectoryRepository {
    async fn find_user(&self, id: UserId) -> AppResult<Option<UserProfile>> {
        sqlx::query_as::<_, UserProfile>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::from_sqlx("Failed to find user", e))
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<UserProfile>> {
        sqlx::query_as::<_, UserProfile>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::from_sqlx("Failed to find user by username", e))
    }

    async fn find_users(&self, ids: &[UserId]) -> AppResult<Vec<UserProfile>> {
        sqlx::query_as::<_, UserProfile>("SELECT * FROM users WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::from_sqlx("Failed to load users", e))
    }

    async fn roles_in_course(
        &self,
        user_ids: &[UserId],
        course_id: &CourseKey,
    ) -> AppResult<HashMap<UserId, Vec<CourseRole>>> {
        let rows: Vec<(UserId, String)> = sqlx::query_as(
            "SELECT user_id, role FROM course_access_roles WHERE user_id = ANY($1) AND course_id = $2",
        )
        .bind(user_ids)
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to load course roles", e))?;
        Ok(parse_roles(rows))
    }

    async fn roles_anywhere(&self, user_id: UserId) -> AppResult<Vec<CourseRole>> {
        let rows: Vec<(UserId, String)> = sqlx::query_as(
            "SELECT DISTINCT user_id, role FROM course_access_roles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to load roles", e))?;
        Ok(parse_roles(rows).remove(&user_id).unwrap_or_default())
    }
}

#[async_trait]
impl CourseCatalog for DirectoryRepository {
    async fn find_course(&self, course_id: &CourseKey) -> AppResult<Option<CourseSummary>> {
        sqlx::query_as::<_, CourseSummary>("SELECT * FROM courses WHERE course_id = $1")
            .bind(course_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::from_sqlx("Failed to find course", e))
    }
}
