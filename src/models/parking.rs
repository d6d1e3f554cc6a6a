use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A live call held in a conference bridge, waiting to be handed to a new
/// agent. Deleted only after the provider confirms the redirect out of the
/// bridge succeeded, so a failed transfer can be retried.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct ParkedCall {
    pub id: Uuid,
    #[serde(rename = "conferenceSid")]
    pub conference_sid: String,
    /// The PSTN leg's call SID; the handle every provider RPC targets.
    #[serde(rename = "participantSid")]
    pub participant_sid: String,
    #[serde(rename = "callerNumber")]
    pub caller_number: String,
    #[serde(rename = "callId")]
    pub call_id: Option<Uuid>,
    pub metadata: serde_json::Value,
    #[serde(rename = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParkRequest {
    #[serde(rename = "callSid")]
    pub call_sid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParkResponse {
    #[serde(rename = "parkedCallId")]
    pub parked_call_id: Uuid,
    #[serde(rename = "conferenceSid")]
    pub conference_sid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnparkRequest {
    #[serde(rename = "parkedCallId")]
    pub parked_call_id: Uuid,
    #[serde(rename = "newAgentId")]
    pub new_agent_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnparkResponse {
    pub success: bool,
    #[serde(rename = "newAgentId")]
    pub new_agent_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinParkedResponse {
    #[serde(rename = "participantSid")]
    pub participant_sid: String,
}
