use futures_util::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::database::store::Store;
use crate::error::ApiError;
use crate::models::blast_message::NewBlastMessage;
use crate::models::notification::{NewNotification, NotificationType};
use crate::models::team::TeamRole;
use crate::services::push::PushService;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlastReceipt {
    pub message_id: Uuid,
    pub recipient_count: usize,
}

/// Team-wide announcements from a coach.
pub struct BlastService {
    store: Arc<dyn Store>,
    push: PushService,
}

impl BlastService {
    pub fn new(store: Arc<dyn Store>, push: PushService) -> Self {
        Self { store, push }
    }

    /// Record the blast, notify every other team member and push to their
    /// devices. Push failures are logged and never fail the blast.
    #[instrument(skip(self, subject, message), fields(%sender_id, %team_id))]
    pub async fn send(
        &self,
        sender_id: Uuid,
        team_id: Uuid,
        subject: &str,
        message: &str,
    ) -> Result<BlastReceipt, ApiError> {
        match self.store.team_role(team_id, sender_id).await? {
            Some(TeamRole::Coach) => {}
            _ => {
                warn!("Blast rejected: sender is not a coach of the team");
                return Err(ApiError::unauthorized("Only coaches can send blast messages"));
            }
        }

        let blast = self
            .store
            .create_blast(NewBlastMessage {
                team_id,
                sent_by: sender_id,
                subject: subject.to_string(),
                message: message.to_string(),
            })
            .await?;

        let recipients: Vec<Uuid> = self
            .store
            .team_members(team_id)
            .await?
            .into_iter()
            .map(|member| member.user_id)
            .filter(|user_id| *user_id != sender_id)
            .collect();

        if !recipients.is_empty() {
            let notifications: Vec<NewNotification> = recipients
                .iter()
                .map(|user_id| NewNotification {
                    user_id: *user_id,
                    team_id: Some(team_id),
                    kind: NotificationType::BlastMessage,
                    title: subject.to_string(),
                    message: message.to_string(),
                })
                .collect();
            if let Err(e) = self.store.insert_notifications(&notifications).await {
                error!(blast_id = %blast.id, "Failed to record blast notifications: {}", e);
            }

            let kind = NotificationType::BlastMessage.as_str();
            let deliveries = recipients
                .iter()
                .map(|user_id| self.push.deliver_to_user(*user_id, subject, message, Some(kind)));
            for (user_id, result) in recipients.iter().zip(join_all(deliveries).await) {
                if let Err(e) = result {
                    warn!(%user_id, "Push for blast failed: {}", e);
                }
            }
        }

        info!(blast_id = %blast.id, recipients = recipients.len(), "Blast message sent");
        Ok(BlastReceipt {
            message_id: blast.id,
            recipient_count: recipients.len(),
        })
    }
}
