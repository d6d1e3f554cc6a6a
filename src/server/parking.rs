//! Park/Transfer Coordinator.
//!
//! Parking holds a live call's PSTN leg in a conference bridge; unparking
//! redirects that leg to a new agent. The ordering inside `unpark_call` is
//! the contract: the target agent is signalled first, the leg is verified
//! live, the provider redirect happens, and only a confirmed redirect is
//! allowed to touch the park record. A failed redirect leaves the row in
//! place so the same request can be retried.

use serde_json::json;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{
    CallStatus, JoinParkedResponse, ParkedCall, PresenceStatus, RingEventType, UnparkResponse,
};

use super::db;
use super::error::CoordinatorError;
use super::routing::RING_TIMEOUT_SECS;
use super::twilio::twiml::{DialOptions, VoiceResponse};
use super::twilio::{LegStatus, VoiceProvider};

pub fn park_conference_name(call_sid: &str) -> String {
    format!("park-{call_sid}")
}

/// Document that drops a redirected leg into the hold conference.
fn conference_hold_document(conference: &str) -> String {
    VoiceResponse::new().dial_conference(conference).into_xml()
}

/// Document that rings the unpark target and hangs up if unanswered.
fn transfer_document(agent_id: Uuid) -> String {
    VoiceResponse::new()
        .dial_clients(
            &DialOptions {
                timeout_secs: RING_TIMEOUT_SECS,
                action: None,
                caller_id: None,
            },
            &[agent_id],
        )
        .hangup()
        .into_xml()
}

/// Fails unless the provider still considers the leg live. An ended leg is
/// a terminal condition: the park record points at nothing and retrying the
/// redirect can never work.
pub async fn ensure_leg_live(
    provider: &dyn VoiceProvider,
    call_sid: &str,
) -> Result<LegStatus, CoordinatorError> {
    let status = provider
        .fetch_leg_status(call_sid)
        .await
        .map_err(CoordinatorError::UpstreamTransient)?;
    if status.is_ended() {
        return Err(CoordinatorError::UpstreamTerminal(format!(
            "call has already ended ({})",
            status.as_str()
        )));
    }
    Ok(status)
}

/// Moves an active call into the hold conference and records the park.
pub async fn park_call(
    pool: &PgPool,
    provider: &dyn VoiceProvider,
    call_sid: &str,
    agent_id: Uuid,
) -> Result<ParkedCall, CoordinatorError> {
    let call = db::calls::get_by_sid(pool, call_sid)
        .await?
        .ok_or(CoordinatorError::NotFound("call"))?;

    let conference = park_conference_name(call_sid);
    provider
        .redirect_leg(call_sid, &conference_hold_document(&conference))
        .await
        .map_err(CoordinatorError::UpstreamTransient)?;

    let parked = db::parked_calls::create(
        pool,
        &conference,
        call_sid,
        &call.from_number,
        Some(call.id),
        json!({ "parkedBy": agent_id }),
    )
    .await?;

    db::calls::update_status(pool, call.id, CallStatus::Parked).await?;
    if let Err(e) = db::presence::set_status(pool, call_sid, agent_id, PresenceStatus::Parked).await
    {
        warn!(agent = %agent_id, "failed to mark presence parked: {e}");
    }

    info!(call_sid, conference = %parked.conference_sid, "call parked");
    Ok(parked)
}

/// Hands a parked call to a new agent.
///
/// Step order matters and must not be rearranged:
/// 1. load the park record (`NotFound` if already unparked),
/// 2. arm the target agent's client with a transfer_start signal,
/// 3. verify the PSTN leg is still live,
/// 4. redirect the leg to the new agent (the irreversible action),
/// 5. only after the provider confirms: delete the park record, clear
///    presence, and reassign the originating call.
pub async fn unpark_call(
    pool: &PgPool,
    provider: &dyn VoiceProvider,
    parked_call_id: Uuid,
    new_agent_id: Uuid,
) -> Result<UnparkResponse, CoordinatorError> {
    let parked = db::parked_calls::get_by_id(pool, parked_call_id)
        .await?
        .ok_or(CoordinatorError::NotFound("parked call"))?;

    let pstn_sid = parked.participant_sid.clone();
    info!(
        parked_call = %parked_call_id,
        pstn_sid = %pstn_sid,
        new_agent = %new_agent_id,
        "unparking call"
    );

    // The redirect below can land faster than a slow presence poll, so the
    // target's client must be armed before the provider is touched.
    if let Err(e) = db::presence::insert_event(
        pool,
        &parked.conference_sid,
        new_agent_id,
        RingEventType::TransferStart,
    )
    .await
    {
        warn!(agent = %new_agent_id, "failed to create transfer_start event: {e}");
    }

    // The handoff is now in flight; reflect that on the ledger and on any
    // screen still showing the parked call. Neither write moves the
    // authoritative location - only a confirmed redirect does that.
    if let Some(call_id) = parked.call_id {
        if let Err(e) = db::calls::update_status(pool, call_id, CallStatus::Transferring).await {
            warn!(call = %call_id, "failed to mark call transferring: {e}");
        }
    }
    if let Err(e) =
        db::presence::set_status_all(pool, &pstn_sid, PresenceStatus::Transferring).await
    {
        warn!(pstn_sid = %pstn_sid, "failed to mark presence transferring: {e}");
    }

    ensure_leg_live(provider, &pstn_sid).await?;

    // Irreversible from here. On failure the park record is deliberately
    // retained so the caller can retry with the same id.
    provider
        .redirect_leg(&pstn_sid, &transfer_document(new_agent_id))
        .await
        .map_err(CoordinatorError::UpstreamTransient)?;

    // Redirect confirmed; the database may now say the call has moved.
    if let Err(e) = db::parked_calls::delete(pool, parked.id).await {
        warn!(parked_call = %parked.id, "failed to delete park record after redirect: {e}");
    }
    if let Err(e) = db::presence::delete_for_call(pool, &pstn_sid).await {
        warn!(pstn_sid = %pstn_sid, "failed to clear presence after redirect: {e}");
    }
    if let Some(call_id) = parked.call_id {
        if let Err(e) = db::calls::reassign(pool, call_id, new_agent_id).await {
            warn!(call = %call_id, "failed to reassign call after redirect: {e}");
        }
    }

    info!(parked_call = %parked_call_id, new_agent = %new_agent_id, "call unparked");
    Ok(UnparkResponse {
        success: true,
        new_agent_id,
    })
}

/// Dials another agent's client into the hold conference (supervisor
/// consult on a parked call).
pub async fn join_parked(
    pool: &PgPool,
    provider: &dyn VoiceProvider,
    parked_call_id: Uuid,
    agent_id: Uuid,
) -> Result<JoinParkedResponse, CoordinatorError> {
    let parked = db::parked_calls::get_by_id(pool, parked_call_id)
        .await?
        .ok_or(CoordinatorError::NotFound("parked call"))?;

    let call_id = parked.call_id.ok_or_else(|| {
        CoordinatorError::Validation("parked call has no originating call".into())
    })?;
    let call = db::calls::get_by_id(pool, call_id)
        .await?
        .ok_or(CoordinatorError::NotFound("call"))?;
    let organization = db::organizations::get_by_id(pool, call.organization_id)
        .await?
        .ok_or(CoordinatorError::NotFound("organization"))?;

    let participant_sid = provider
        .create_conference_participant(
            &parked.conference_sid,
            &format!("client:{agent_id}"),
            &organization.twilio_number,
        )
        .await
        .map_err(CoordinatorError::UpstreamTransient)?;

    info!(parked_call = %parked_call_id, agent = %agent_id, "agent joined hold conference");
    Ok(JoinParkedResponse { participant_sid })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::twilio::ProviderError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FakeProvider {
        leg_status: Result<LegStatus, ()>,
        redirects: Mutex<Vec<(String, String)>>,
    }

    impl FakeProvider {
        fn with_status(status: LegStatus) -> Self {
            Self {
                leg_status: Ok(status),
                redirects: Mutex::new(Vec::new()),
            }
        }

        fn unreachable() -> Self {
            Self {
                leg_status: Err(()),
                redirects: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl VoiceProvider for FakeProvider {
        async fn fetch_leg_status(&self, _call_sid: &str) -> Result<LegStatus, ProviderError> {
            self.leg_status.map_err(|_| ProviderError::Api {
                message: "connection reset".into(),
            })
        }

        async fn redirect_leg(&self, call_sid: &str, twiml: &str) -> Result<(), ProviderError> {
            self.redirects
                .lock()
                .unwrap()
                .push((call_sid.to_string(), twiml.to_string()));
            Ok(())
        }

        async fn create_conference_participant(
            &self,
            _conference: &str,
            _to: &str,
            _from: &str,
        ) -> Result<String, ProviderError> {
            Ok("CA-participant".into())
        }
    }

    #[tokio::test]
    async fn live_leg_passes_the_precheck() {
        let provider = FakeProvider::with_status(LegStatus::InProgress);
        let status = ensure_leg_live(&provider, "CA456").await.unwrap();
        assert_eq!(status, LegStatus::InProgress);
    }

    #[tokio::test]
    async fn ended_leg_is_a_terminal_error() {
        let provider = FakeProvider::with_status(LegStatus::Completed);
        let err = ensure_leg_live(&provider, "CA456").await.unwrap_err();
        assert!(matches!(err, CoordinatorError::UpstreamTerminal(_)));
        assert!(!err.retryable());
        assert!(err.to_string().contains("completed"));
    }

    #[tokio::test]
    async fn unreachable_provider_is_a_transient_error() {
        let provider = FakeProvider::unreachable();
        let err = ensure_leg_live(&provider, "CA456").await.unwrap_err();
        assert!(matches!(err, CoordinatorError::UpstreamTransient(_)));
        assert!(err.retryable());
    }

    #[test]
    fn transfer_document_rings_the_target_then_hangs_up() {
        let agent = Uuid::new_v4();
        let xml = transfer_document(agent);
        assert!(xml.contains(&format!("<Client>{agent}</Client>")));
        assert!(xml.contains("<Dial timeout=\"30\">"));
        assert!(xml.ends_with("<Hangup/></Response>"));
    }

    #[test]
    fn hold_document_targets_the_park_conference() {
        let xml = conference_hold_document(&park_conference_name("CA123"));
        assert!(xml.contains("<Conference>park-CA123</Conference>"));
    }
}
