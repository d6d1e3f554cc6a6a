use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ephemeral per-(call, agent) state backing the ring/active indicator on a
/// specific agent's screen. Kept apart from the durable call ledger so agent
/// clients can poll it cheaply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct ActiveCallPresence {
    pub id: i64,
    #[serde(rename = "callSid")]
    pub call_sid: String,
    #[serde(rename = "agentId")]
    pub agent_id: Uuid,
    #[serde(rename = "callerNumber")]
    pub caller_number: String,
    pub status: PresenceStatus,
    #[serde(rename = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "presence_status", rename_all = "lowercase")]
pub enum PresenceStatus {
    Ringing,
    Active,
    Parked,
    Transferring,
}

/// Append-only ring/transfer signal consumed by agent clients; the serial id
/// doubles as each consumer's poll cursor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct RingEvent {
    pub id: i64,
    #[serde(rename = "callSid")]
    pub call_sid: String,
    #[serde(rename = "agentId")]
    pub agent_id: Uuid,
    #[serde(rename = "eventType")]
    pub event_type: RingEventType,
    #[serde(rename = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "ring_event_type", rename_all = "snake_case")]
pub enum RingEventType {
    RingStart,
    RingCancel,
    TransferStart,
}
