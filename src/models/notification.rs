use crate::database::connection::DbPool;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Postgres, QueryBuilder, Type};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "notification_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    PaymentRequest,
    BlastMessage,
    Event,
    General,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::PaymentRequest => "payment_request",
            NotificationType::BlastMessage => "blast_message",
            NotificationType::Event => "event",
            NotificationType::General => "general",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub team_id: Option<Uuid>,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub team_id: Option<Uuid>,
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub async fn insert_many(
        pool: &DbPool,
        notifications: &[NewNotification],
    ) -> Result<u64, sqlx::Error> {
        if notifications.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO notifications (id, user_id, team_id, type, title, message, read, created_at) ",
        );
        builder.push_values(notifications, |mut row, n| {
            row.push_bind(Uuid::new_v4())
                .push_bind(n.user_id)
                .push_bind(n.team_id)
                .push_bind(n.kind)
                .push_bind(n.title.clone())
                .push_bind(n.message.clone())
                .push_bind(false)
                .push_bind(now);
        });

        let result = builder.build().execute(pool).await?;
        Ok(result.rows_affected())
    }

    pub async fn find_unread(
        pool: &DbPool,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let notifications = sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications
             WHERE user_id = $1 AND read = FALSE
             ORDER BY created_at DESC
             LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(notifications)
    }

    pub async fn mark_read(pool: &DbPool, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE notifications SET read = TRUE WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .execute(pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}
