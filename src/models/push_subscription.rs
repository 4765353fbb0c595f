use crate::database::connection::DbPool;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PushSubscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub endpoint: String,
    pub p256dh_key: String,
    pub auth_key: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPushSubscription {
    pub user_id: Uuid,
    pub endpoint: String,
    pub p256dh_key: String,
    pub auth_key: String,
}

impl PushSubscription {
    /// Endpoints are unique; re-subscribing moves the endpoint to the caller.
    pub async fn upsert(
        pool: &DbPool,
        subscription: NewPushSubscription,
    ) -> Result<Self, sqlx::Error> {
        let saved = sqlx::query_as::<_, PushSubscription>(
            "INSERT INTO push_subscriptions (id, user_id, endpoint, p256dh_key, auth_key, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (endpoint) DO UPDATE
             SET user_id = EXCLUDED.user_id,
                 p256dh_key = EXCLUDED.p256dh_key,
                 auth_key = EXCLUDED.auth_key
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(subscription.user_id)
        .bind(subscription.endpoint)
        .bind(subscription.p256dh_key)
        .bind(subscription.auth_key)
        .bind(Utc::now())
        .fetch_one(pool)
        .await?;

        Ok(saved)
    }

    pub async fn find_by_user(pool: &DbPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let subscriptions = sqlx::query_as::<_, PushSubscription>(
            "SELECT * FROM push_subscriptions WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(subscriptions)
    }

    pub async fn delete(pool: &DbPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM push_subscriptions WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }

    pub async fn delete_for_user(
        pool: &DbPool,
        user_id: Uuid,
        endpoint: &str,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM push_subscriptions WHERE user_id = $1 AND endpoint = $2")
                .bind(user_id)
                .bind(endpoint)
                .execute(pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}
