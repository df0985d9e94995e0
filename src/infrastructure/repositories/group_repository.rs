//! Group Repository Implementation
//!
//! Loads a group together with its admin and member list.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::user_repository::{UserRow, USER_COLUMNS};
use crate::domain::{Group, GroupKind, GroupRepository};
use crate::shared::error::AppError;

/// Internal row type for the chat_groups table.
#[derive(Debug, sqlx::FromRow)]
struct GroupRow {
    id: Uuid,
    name: String,
    description: String,
    avatar: Option<String>,
    admin_id: Uuid,
    is_public: bool,
    group_type: String,
    created_at: DateTime<Utc>,
}

/// PostgreSQL group repository implementation.
#[derive(Clone)]
pub struct PgGroupRepository {
    pool: PgPool,
}

impl PgGroupRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GroupRepository for PgGroupRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Group>, AppError> {
        let Some(row) = sqlx::query_as::<_, GroupRow>(
            r#"
            SELECT id, name, description, avatar, admin_id, is_public, group_type, created_at
            FROM chat_groups
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let admin = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users u WHERE u.id = $1"
        ))
        .bind(row.admin_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            AppError::Internal(format!("Group {} references missing admin {}", id, row.admin_id))
        })?
        .into_user();

        let members = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users u
            JOIN chat_group_members m ON m.user_id = u.id
            WHERE m.group_id = $1
            ORDER BY u.username
            "#
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(UserRow::into_user)
        .collect();

        Ok(Some(Group {
            id: row.id,
            name: row.name,
            description: row.description,
            avatar: row.avatar,
            admin,
            members,
            is_public: row.is_public,
            kind: GroupKind::from_str(&row.group_type),
            created_at: row.created_at,
        }))
    }
}
