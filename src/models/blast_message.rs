use crate::database::connection::DbPool;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A one-to-many announcement from a coach to the team.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BlastMessage {
    pub id: Uuid,
    pub team_id: Uuid,
    pub sent_by: Uuid,
    pub subject: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBlastMessage {
    pub team_id: Uuid,
    pub sent_by: Uuid,
    pub subject: String,
    pub message: String,
}

impl BlastMessage {
    pub async fn create(pool: &DbPool, blast: NewBlastMessage) -> Result<Self, sqlx::Error> {
        let created = sqlx::query_as::<_, BlastMessage>(
            "INSERT INTO blast_messages (id, team_id, sent_by, subject, message, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(blast.team_id)
        .bind(blast.sent_by)
        .bind(blast.subject)
        .bind(blast.message)
        .bind(Utc::now())
        .fetch_one(pool)
        .await?;

        Ok(created)
    }
}
