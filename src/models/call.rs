use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Durable call ledger row; one per provider call SID, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Call {
    pub id: Uuid,
    #[serde(rename = "organizationId")]
    pub organization_id: Uuid,
    pub direction: CallDirection,
    pub status: CallStatus,
    #[serde(rename = "fromNumber")]
    pub from_number: String,
    #[serde(rename = "toNumber")]
    pub to_number: String,
    #[serde(rename = "twilioCallSid")]
    pub twilio_call_sid: String,
    #[serde(rename = "assignedTo")]
    pub assigned_to: Option<Uuid>,
    #[serde(rename = "answeredBy")]
    pub answered_by: Option<Uuid>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "answeredAt")]
    pub answered_at: Option<DateTime<Utc>>,
    #[serde(rename = "endedAt")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(rename = "durationSeconds")]
    pub duration_seconds: Option<i32>,
    #[serde(rename = "voicemailTranscription")]
    pub voicemail_transcription: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "call_direction", rename_all = "lowercase")]
pub enum CallDirection {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, sqlx::Type)]
#[serde(rename_all = "kebab-case")]
#[sqlx(type_name = "call_status", rename_all = "kebab-case")]
pub enum CallStatus {
    Ringing,
    InProgress,
    Parked,
    Transferring,
    Completed,
    NoAnswer,
    Busy,
    Canceled,
    Failed,
}

impl CallStatus {
    pub fn display_name(&self) -> &str {
        match self {
            CallStatus::Ringing => "Ringing",
            CallStatus::InProgress => "In Progress",
            CallStatus::Parked => "Parked",
            CallStatus::Transferring => "Transferring",
            CallStatus::Completed => "Completed",
            CallStatus::NoAnswer => "No Answer",
            CallStatus::Busy => "Busy",
            CallStatus::Canceled => "Canceled",
            CallStatus::Failed => "Failed",
        }
    }

    /// Terminal statuses never transition again; a duplicate provider
    /// callback against one of these is a no-op.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CallStatus::Completed
                | CallStatus::NoAnswer
                | CallStatus::Busy
                | CallStatus::Canceled
                | CallStatus::Failed
        )
    }

    /// Maps the `DialCallStatus` reported by the provider's dial action
    /// callback onto the ledger vocabulary. Unknown strings are surfaced to
    /// the caller rather than guessed at.
    pub fn from_dial_outcome(outcome: &str) -> Option<CallStatus> {
        match outcome {
            "completed" | "answered" => Some(CallStatus::Completed),
            "no-answer" => Some(CallStatus::NoAnswer),
            "busy" => Some(CallStatus::Busy),
            "canceled" => Some(CallStatus::Canceled),
            "failed" => Some(CallStatus::Failed),
            _ => None,
        }
    }
}

/// Idempotency guard for the answer race: transitions pending -> claimed
/// exactly once, first writer wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct CallClaim {
    pub id: i64,
    #[serde(rename = "callSid")]
    pub call_sid: String,
    pub status: ClaimStatus,
    #[serde(rename = "claimedBy")]
    pub claimed_by: Option<Uuid>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "claim_status", rename_all = "lowercase")]
pub enum ClaimStatus {
    Pending,
    Claimed,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRequest {
    #[serde(rename = "callSid")]
    pub call_sid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimResponse {
    pub claimed: bool,
    #[serde(rename = "assignedTo")]
    pub assigned_to: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dial_outcomes_map_to_terminal_statuses() {
        for outcome in ["completed", "no-answer", "busy", "canceled", "failed"] {
            let status = CallStatus::from_dial_outcome(outcome).unwrap();
            assert!(status.is_terminal(), "{outcome} should land terminal");
        }
    }

    #[test]
    fn unknown_dial_outcome_is_rejected() {
        assert_eq!(CallStatus::from_dial_outcome("in-progress"), None);
        assert_eq!(CallStatus::from_dial_outcome(""), None);
    }

    #[test]
    fn live_statuses_are_not_terminal() {
        for status in [
            CallStatus::Ringing,
            CallStatus::InProgress,
            CallStatus::Parked,
            CallStatus::Transferring,
        ] {
            assert!(!status.is_terminal());
        }
    }

    #[test]
    fn status_serializes_with_provider_vocabulary() {
        assert_eq!(
            serde_json::to_string(&CallStatus::InProgress).unwrap(),
            "\"in-progress\""
        );
        assert_eq!(
            serde_json::to_string(&CallStatus::NoAnswer).unwrap(),
            "\"no-answer\""
        );
    }
}
