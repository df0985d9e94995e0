//! Message Repository Implementation
//!
//! PostgreSQL implementation of message persistence. A direct message also
//! refreshes the `chats` row of its user pair in the same transaction so
//! conversation lists show the latest message.

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Message, MessageRepository, NewMessage, Recipient};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

/// PostgreSQL message repository implementation.
#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    /// Creates a new PgMessageRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Orders a user pair so `(a, b)` and `(b, a)` share one chats row.
fn chat_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn create(&self, message: NewMessage) -> Result<Message, AppError> {
        let started = Instant::now();
        let id = Uuid::now_v7();

        let (receiver_id, group_id) = match &message.recipient {
            Recipient::Direct(user) => (Some(user.id), None),
            Recipient::Group(group) => (None, Some(group.id)),
        };

        let mut tx = self.pool.begin().await?;

        let created_at: DateTime<Utc> = sqlx::query_scalar(
            r#"
            INSERT INTO messages (id, sender_id, receiver_id, group_id, content, message_type, file)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING created_at
            "#,
        )
        .bind(id)
        .bind(message.sender.id)
        .bind(receiver_id)
        .bind(group_id)
        .bind(&message.content)
        .bind(message.message_type.as_str())
        .bind(&message.file)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(receiver_id) = receiver_id {
            let (user1, user2) = chat_pair(message.sender.id, receiver_id);
            sqlx::query(
                r#"
                INSERT INTO chats (id, user1_id, user2_id, last_message_id)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (user1_id, user2_id)
                DO UPDATE SET last_message_id = EXCLUDED.last_message_id, updated_at = NOW()
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(user1)
            .bind(user2)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        metrics::record_db_query("insert", "messages", started.elapsed().as_secs_f64());

        Ok(Message {
            id,
            sender: message.sender,
            recipient: message.recipient,
            content: message.content,
            message_type: message.message_type,
            file: message.file,
            read_by: Vec::new(),
            created_at,
        })
    }
}
