//! Call Router: turns inbound webhooks into ring fanout, reconciles dial
//! outcomes, and runs the answer-claim race.
//!
//! Everything here answers the provider with a playable voice-control
//! document; internal faults are absorbed by the webhook handlers into a
//! polite hangup, never a 5xx.

use sqlx::PgPool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{
    Call, CallDirection, CallStatus, ClaimStatus, Organization, PresenceStatus, RingEventType,
};

use super::config::AppConfig;
use super::db;
use super::error::CoordinatorError;
use super::twilio::twiml::{DialOptions, RecordOptions, VoiceResponse};

pub const RING_TIMEOUT_SECS: u32 = 30;
pub const VOICEMAIL_MAX_LENGTH_SECS: u32 = 120;

const ALL_BUSY_GREETING: &str =
    "We are sorry, but all of our agents are currently busy. Please leave a message after the beep.";
const GOODBYE: &str = "Thank you for your message. Goodbye.";
const REJECT_MESSAGE: &str = "Access denied.";
const FAULT_MESSAGE: &str =
    "We are experiencing technical difficulties. Please try again later.";

#[derive(Debug, Clone)]
pub struct InboundCall {
    pub call_sid: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone)]
pub struct OutboundCall {
    pub call_sid: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone)]
pub struct DialStatusUpdate {
    pub call_sid: String,
    pub dial_status: String,
}

#[derive(Debug)]
pub enum ClaimOutcome {
    Won(Box<Call>),
    Lost { assigned_to: Option<Uuid> },
}

/// Played when the webhook signature does not verify.
pub fn reject_document() -> String {
    VoiceResponse::new().say(REJECT_MESSAGE).hangup().into_xml()
}

/// Played when the router itself fails; ends the call cleanly.
pub fn fault_document() -> String {
    VoiceResponse::new().say(FAULT_MESSAGE).hangup().into_xml()
}

fn empty_document() -> String {
    VoiceResponse::new().into_xml()
}

fn voicemail_document(config: &AppConfig) -> String {
    VoiceResponse::new()
        .say(ALL_BUSY_GREETING)
        .record(&RecordOptions {
            timeout_secs: 3,
            max_length_secs: VOICEMAIL_MAX_LENGTH_SECS,
            transcribe_callback: Some(format!(
                "{}/api/twilio/transcription",
                config.webhook_base_url
            )),
        })
        .say(GOODBYE)
        .hangup()
        .into_xml()
}

/// Agent `From` identities arrive as `client:<agent uuid>`.
pub fn parse_client_identity(from: &str) -> Option<Uuid> {
    from.strip_prefix("client:")
        .and_then(|raw| Uuid::parse_str(raw).ok())
}

/// Handles a fresh inbound PSTN call: resolve the organization, pick every
/// available agent, persist the ring state, and answer with a simultaneous
/// dial. Ring events are written before the dial document is returned so
/// agent screens are armed before their endpoints start ringing.
pub async fn route_inbound(
    pool: &PgPool,
    config: &AppConfig,
    inbound: &InboundCall,
) -> Result<String, CoordinatorError> {
    let Some(organization) = resolve_organization(pool, config, &inbound.to).await? else {
        warn!(to = %inbound.to, "no organization for dialed number; routing to voicemail");
        return Ok(voicemail_document(config));
    };

    let agents = db::agents::get_available(pool, organization.id).await?;
    info!(
        call_sid = %inbound.call_sid,
        organization = %organization.name,
        agents = agents.len(),
        "inbound call"
    );

    if agents.is_empty() {
        return Ok(voicemail_document(config));
    }

    db::claims::create(pool, &inbound.call_sid).await?;
    db::calls::create_inbound(
        pool,
        organization.id,
        &inbound.from,
        &inbound.to,
        &inbound.call_sid,
    )
    .await?;

    // Presence and ring events are the fast tier: a failed write degrades
    // the signal but must not kill the call.
    for agent in &agents {
        if let Err(e) =
            db::presence::insert_ringing(pool, &inbound.call_sid, agent.id, &inbound.from).await
        {
            warn!(agent = %agent.id, "failed to create presence row: {e}");
        }
        if let Err(e) =
            db::presence::insert_event(pool, &inbound.call_sid, agent.id, RingEventType::RingStart)
                .await
        {
            warn!(agent = %agent.id, "failed to create ring event: {e}");
        }
    }

    let clients: Vec<Uuid> = agents.iter().map(|a| a.id).collect();
    Ok(VoiceResponse::new()
        .dial_clients(
            &DialOptions {
                timeout_secs: RING_TIMEOUT_SECS,
                action: Some(format!("{}/api/twilio/dial-status", config.webhook_base_url)),
                caller_id: Some(inbound.from.clone()),
            },
            &clients,
        )
        .into_xml())
}

/// Handles the TwiML-app webhook for an agent-originated outbound call:
/// book the ledger row and bridge the agent's client leg to the PSTN number
/// with the organization's number as caller id.
pub async fn route_outbound(
    pool: &PgPool,
    config: &AppConfig,
    outbound: &OutboundCall,
) -> Result<String, CoordinatorError> {
    let agent_id = parse_client_identity(&outbound.from).ok_or_else(|| {
        CoordinatorError::Validation(format!("unrecognized caller identity: {}", outbound.from))
    })?;
    let agent = db::agents::get_by_id(pool, agent_id)
        .await?
        .ok_or(CoordinatorError::NotFound("agent"))?;
    let organization = db::organizations::get_by_id(pool, agent.organization_id)
        .await?
        .ok_or(CoordinatorError::NotFound("organization"))?;

    if outbound.to.is_empty() {
        return Err(CoordinatorError::Validation("missing destination number".into()));
    }

    db::calls::create_outbound(
        pool,
        organization.id,
        agent.id,
        &organization.twilio_number,
        &outbound.to,
        &outbound.call_sid,
    )
    .await?;

    info!(call_sid = %outbound.call_sid, agent = %agent.id, to = %outbound.to, "outbound call");

    Ok(VoiceResponse::new()
        .dial_number(
            &DialOptions {
                timeout_secs: RING_TIMEOUT_SECS,
                action: Some(format!("{}/api/twilio/dial-status", config.webhook_base_url)),
                caller_id: Some(organization.twilio_number.clone()),
            },
            &outbound.to,
        )
        .into_xml())
}

/// Reconciles the terminal dial outcome into the ledger. Idempotent: a
/// duplicate callback finds the call already terminal and changes nothing.
pub async fn handle_dial_status(
    pool: &PgPool,
    config: &AppConfig,
    update: &DialStatusUpdate,
) -> Result<String, CoordinatorError> {
    let Some(status) = CallStatus::from_dial_outcome(&update.dial_status) else {
        warn!(
            call_sid = %update.call_sid,
            outcome = %update.dial_status,
            "unrecognized dial outcome"
        );
        return Ok(empty_document());
    };

    let Some(call) = db::calls::finish(pool, &update.call_sid, status).await? else {
        debug!(call_sid = %update.call_sid, "duplicate terminal callback; nothing to do");
        return Ok(empty_document());
    };

    if let Err(e) = db::claims::expire_pending(pool, &update.call_sid).await {
        warn!(call_sid = %update.call_sid, "failed to expire claim: {e}");
    }

    match db::presence::delete_for_call(pool, &update.call_sid).await {
        Ok(still_armed) => {
            for agent_id in still_armed {
                if let Err(e) = db::presence::insert_event(
                    pool,
                    &update.call_sid,
                    agent_id,
                    RingEventType::RingCancel,
                )
                .await
                {
                    warn!(agent = %agent_id, "failed to create ring cancel event: {e}");
                }
            }
        }
        Err(e) => warn!(call_sid = %update.call_sid, "failed to clear presence rows: {e}"),
    }

    if status == CallStatus::Completed {
        if let Some(agent_id) = counted_agent(&call) {
            if let Err(e) = super::counters::record_call(pool, agent_id, call.direction).await {
                warn!(agent = %agent_id, "failed to record call tally: {e}");
            }
        }
    }

    info!(call_sid = %update.call_sid, status = status.display_name(), "dial outcome reconciled");

    // An unanswered inbound caller is still on the line; offer voicemail.
    match (call.direction, status) {
        (
            CallDirection::Inbound,
            CallStatus::NoAnswer | CallStatus::Busy | CallStatus::Failed,
        ) => Ok(voicemail_document(config)),
        _ => Ok(empty_document()),
    }
}

/// Which agent a completed call counts against.
fn counted_agent(call: &Call) -> Option<Uuid> {
    match call.direction {
        CallDirection::Inbound => call.answered_by,
        CallDirection::Outbound => call.assigned_to,
    }
}

/// The answer race. The pending->claimed transition is a single conditional
/// update, so exactly one of any number of simultaneous claimants wins;
/// the rest learn who did.
pub async fn claim_call(
    pool: &PgPool,
    call_sid: &str,
    agent_id: Uuid,
) -> Result<ClaimOutcome, CoordinatorError> {
    if db::claims::try_claim(pool, call_sid, agent_id).await?.is_none() {
        let existing = db::claims::get_by_sid(pool, call_sid).await?;
        return match existing {
            Some(claim) if claim.status == ClaimStatus::Claimed => Ok(ClaimOutcome::Lost {
                assigned_to: claim.claimed_by,
            }),
            Some(_) => Err(CoordinatorError::Conflict(
                "call is no longer ringing".into(),
            )),
            None => Err(CoordinatorError::NotFound("call claim")),
        };
    }

    let call = db::calls::try_assign(pool, call_sid, agent_id)
        .await?
        .ok_or_else(|| CoordinatorError::Conflict("call is no longer ringing".into()))?;

    if let Err(e) =
        db::presence::set_status(pool, call_sid, agent_id, PresenceStatus::Active).await
    {
        warn!(agent = %agent_id, "failed to mark presence active: {e}");
    }
    match db::presence::delete_except(pool, call_sid, agent_id).await {
        Ok(losers) => {
            for loser in losers {
                if let Err(e) =
                    db::presence::insert_event(pool, call_sid, loser, RingEventType::RingCancel)
                        .await
                {
                    warn!(agent = %loser, "failed to create ring cancel event: {e}");
                }
            }
        }
        Err(e) => warn!(call_sid, "failed to clear losing presence rows: {e}"),
    }

    info!(call_sid, agent = %agent_id, "call claimed");
    Ok(ClaimOutcome::Won(Box::new(call)))
}

async fn resolve_organization(
    pool: &PgPool,
    config: &AppConfig,
    to_number: &str,
) -> Result<Option<Organization>, CoordinatorError> {
    if let Some(organization) = db::organizations::get_by_number(pool, to_number).await? {
        return Ok(Some(organization));
    }

    // Degraded path: numbers that match no organization land on the
    // configured default, when one is configured at all.
    match config.default_organization_id {
        Some(id) => {
            warn!(to = %to_number, fallback = %id, "number lookup missed; using default organization");
            Ok(db::organizations::get_by_id(pool, id).await?)
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        AppConfig {
            database_url: String::new(),
            port: 0,
            environment: super::super::config::Environment::Development,
            twilio_account_sid: "AC123".into(),
            twilio_auth_token: "token".into(),
            webhook_base_url: "https://dispatch.example.com".into(),
            jwt_secret: "secret".into(),
            default_organization_id: None,
        }
    }

    #[test]
    fn client_identity_parses_agent_uuid() {
        let agent = Uuid::new_v4();
        assert_eq!(parse_client_identity(&format!("client:{agent}")), Some(agent));
        assert_eq!(parse_client_identity("+15551230000"), None);
        assert_eq!(parse_client_identity("client:not-a-uuid"), None);
    }

    #[test]
    fn reject_document_ends_the_call() {
        let xml = reject_document();
        assert!(xml.contains("<Say>Access denied.</Say>"));
        assert!(xml.contains("<Hangup/>"));
    }

    #[test]
    fn fault_document_ends_the_call() {
        let xml = fault_document();
        assert!(xml.contains("technical difficulties"));
        assert!(xml.contains("<Hangup/>"));
    }

    #[test]
    fn voicemail_document_points_transcription_at_the_webhook() {
        let xml = voicemail_document(&test_config());
        assert!(xml.contains("<Record"));
        assert!(xml.contains(
            "transcribeCallback=\"https://dispatch.example.com/api/twilio/transcription\""
        ));
        assert!(xml.contains("<Hangup/>"));
    }
}
