use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlastRequest {
    pub team_id: Option<Uuid>,
    pub subject: Option<String>,
    pub message: Option<String>,
}
