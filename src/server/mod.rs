//! Server-side coordination core.
//!
//! This module wires the pieces together:
//! - Database access (PostgreSQL via sqlx)
//! - Twilio provider boundary (REST client + TwiML + webhook signatures)
//! - Call routing, claim race, park/transfer, call tallies
//! - Authentication (JWT validation) for the agent-facing surface
#![allow(dead_code)]

pub mod auth;
pub mod config;
pub mod counters;
pub mod db;
pub mod error;
pub mod parking;
pub mod routing;
pub mod twilio;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Form, Json, Router,
};
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::*;
use config::AppConfig;
use error::CoordinatorError;
use routing::{DialStatusUpdate, InboundCall, OutboundCall};
use twilio::{signature, TwilioClient, VoiceProvider};

/// Application state shared across all routes
pub struct AppState {
    pub db: PgPool,
    pub provider: Arc<dyn VoiceProvider>,
    pub config: AppConfig,
}

impl AppState {
    fn webhook_url(&self, path: &str) -> String {
        format!("{}{}", self.config.webhook_base_url, path)
    }
}

/// Create the Axum router with all API routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/api/health", get(health_check))

        // Provider webhooks (signed; always answered with a voice document)
        .route("/api/twilio/voice", post(twilio_voice))
        .route("/api/twilio/outbound", post(twilio_outbound))
        .route("/api/twilio/dial-status", post(twilio_dial_status))
        .route("/api/twilio/transcription", post(twilio_transcription))

        // Agent-facing call control
        .route("/api/calls/claim", post(claim_call))
        .route("/api/calls/park", post(park_call))
        .route("/api/unpark", post(unpark_call))
        .route("/api/calls/parked", get(list_parked))
        .route("/api/calls/parked/{id}/join", post(join_parked))
        .route("/api/calls/recent", get(recent_calls))

        // Presence channel (pull interface)
        .route("/api/presence/events", get(presence_events))
        .route("/api/presence/active", get(presence_active))

        // Availability toggle
        .route("/api/agents/availability", put(update_availability))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

// Health check
async fn health_check() -> &'static str {
    "OK"
}

// ============== Provider Webhooks ==============

fn twiml_response(document: String) -> Response {
    ([(header::CONTENT_TYPE, "text/xml")], document).into_response()
}

fn form_value<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Signature policy: a present signature must verify; an absent one is only
/// tolerated outside production. Either way the caller gets a playable
/// document, never an application error.
fn verify_webhook(
    state: &AppState,
    headers: &HeaderMap,
    url: &str,
    params: &[(String, String)],
) -> Result<(), CoordinatorError> {
    match headers
        .get("x-twilio-signature")
        .and_then(|value| value.to_str().ok())
    {
        Some(sig) => {
            if signature::verify(&state.config.twilio_auth_token, url, params, sig) {
                Ok(())
            } else {
                Err(CoordinatorError::Authentication)
            }
        }
        None if !state.config.environment.is_production() => Ok(()),
        None => Err(CoordinatorError::Authentication),
    }
}

async fn twilio_voice(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(params): Form<Vec<(String, String)>>,
) -> Response {
    let url = state.webhook_url("/api/twilio/voice");
    if verify_webhook(&state, &headers, &url, &params).is_err() {
        warn!("inbound webhook signature rejected");
        return twiml_response(routing::reject_document());
    }

    let inbound = InboundCall {
        call_sid: form_value(&params, "CallSid").unwrap_or_default().to_string(),
        from: form_value(&params, "From").unwrap_or_default().to_string(),
        to: form_value(&params, "To").unwrap_or_default().to_string(),
    };
    if inbound.call_sid.is_empty() {
        warn!("inbound webhook missing CallSid");
        return twiml_response(routing::fault_document());
    }

    match routing::route_inbound(&state.db, &state.config, &inbound).await {
        Ok(document) => twiml_response(document),
        Err(e) => {
            tracing::error!(call_sid = %inbound.call_sid, "inbound routing failed: {e}");
            twiml_response(routing::fault_document())
        }
    }
}

async fn twilio_outbound(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(params): Form<Vec<(String, String)>>,
) -> Response {
    let url = state.webhook_url("/api/twilio/outbound");
    if verify_webhook(&state, &headers, &url, &params).is_err() {
        warn!("outbound webhook signature rejected");
        return twiml_response(routing::reject_document());
    }

    let outbound = OutboundCall {
        call_sid: form_value(&params, "CallSid").unwrap_or_default().to_string(),
        from: form_value(&params, "From").unwrap_or_default().to_string(),
        to: form_value(&params, "To").unwrap_or_default().to_string(),
    };
    if outbound.call_sid.is_empty() {
        warn!("outbound webhook missing CallSid");
        return twiml_response(routing::fault_document());
    }

    match routing::route_outbound(&state.db, &state.config, &outbound).await {
        Ok(document) => twiml_response(document),
        Err(e) => {
            tracing::error!(call_sid = %outbound.call_sid, "outbound routing failed: {e}");
            twiml_response(routing::fault_document())
        }
    }
}

async fn twilio_dial_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(params): Form<Vec<(String, String)>>,
) -> Response {
    let url = state.webhook_url("/api/twilio/dial-status");
    if verify_webhook(&state, &headers, &url, &params).is_err() {
        warn!("dial-status webhook signature rejected");
        return twiml_response(routing::reject_document());
    }

    let update = DialStatusUpdate {
        call_sid: form_value(&params, "CallSid").unwrap_or_default().to_string(),
        dial_status: form_value(&params, "DialCallStatus")
            .unwrap_or_default()
            .to_string(),
    };

    match routing::handle_dial_status(&state.db, &state.config, &update).await {
        Ok(document) => twiml_response(document),
        Err(e) => {
            tracing::error!(call_sid = %update.call_sid, "dial-status reconciliation failed: {e}");
            twiml_response(routing::fault_document())
        }
    }
}

async fn twilio_transcription(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(params): Form<Vec<(String, String)>>,
) -> StatusCode {
    let url = state.webhook_url("/api/twilio/transcription");
    if verify_webhook(&state, &headers, &url, &params).is_err() {
        warn!("transcription webhook signature rejected");
        return StatusCode::OK;
    }

    let call_sid = form_value(&params, "CallSid").unwrap_or_default();
    let text = form_value(&params, "TranscriptionText").unwrap_or_default();
    if call_sid.is_empty() || text.is_empty() {
        return StatusCode::OK;
    }

    match db::calls::set_transcription(&state.db, call_sid, text).await {
        Ok(0) => warn!(call_sid, "transcription arrived for an unknown call"),
        Ok(_) => info!(call_sid, "voicemail transcription stored"),
        Err(e) => warn!(call_sid, "failed to store transcription: {e}"),
    }
    StatusCode::OK
}

// ============== Agent-Facing Call Control ==============

async fn claim_call(
    State(state): State<Arc<AppState>>,
    claims: auth::Claims,
    Json(req): Json<ClaimRequest>,
) -> Result<Response, CoordinatorError> {
    match routing::claim_call(&state.db, &req.call_sid, claims.sub).await? {
        routing::ClaimOutcome::Won(_) => Ok(Json(ClaimResponse {
            claimed: true,
            assigned_to: Some(claims.sub),
        })
        .into_response()),
        routing::ClaimOutcome::Lost { assigned_to } => Ok((
            StatusCode::CONFLICT,
            Json(ClaimResponse {
                claimed: false,
                assigned_to,
            }),
        )
            .into_response()),
    }
}

async fn park_call(
    State(state): State<Arc<AppState>>,
    claims: auth::Claims,
    Json(req): Json<ParkRequest>,
) -> Result<Json<ParkResponse>, CoordinatorError> {
    let parked =
        parking::park_call(&state.db, state.provider.as_ref(), &req.call_sid, claims.sub).await?;
    Ok(Json(ParkResponse {
        parked_call_id: parked.id,
        conference_sid: parked.conference_sid,
    }))
}

async fn unpark_call(
    State(state): State<Arc<AppState>>,
    _claims: auth::Claims,
    Json(req): Json<UnparkRequest>,
) -> Result<Json<UnparkResponse>, CoordinatorError> {
    let response = parking::unpark_call(
        &state.db,
        state.provider.as_ref(),
        req.parked_call_id,
        req.new_agent_id,
    )
    .await?;
    Ok(Json(response))
}

async fn list_parked(
    State(state): State<Arc<AppState>>,
    _claims: auth::Claims,
) -> Result<Json<Vec<ParkedCall>>, CoordinatorError> {
    Ok(Json(db::parked_calls::get_all(&state.db).await?))
}

async fn join_parked(
    State(state): State<Arc<AppState>>,
    claims: auth::Claims,
    Path(id): Path<Uuid>,
) -> Result<Json<JoinParkedResponse>, CoordinatorError> {
    let response =
        parking::join_parked(&state.db, state.provider.as_ref(), id, claims.sub).await?;
    Ok(Json(response))
}

async fn recent_calls(
    State(state): State<Arc<AppState>>,
    _claims: auth::Claims,
) -> Result<Json<Vec<Call>>, CoordinatorError> {
    Ok(Json(db::calls::get_recent(&state.db, 50).await?))
}

// ============== Presence Channel ==============

#[derive(Debug, Deserialize)]
struct EventsQuery {
    after: Option<i64>,
}

async fn presence_events(
    State(state): State<Arc<AppState>>,
    claims: auth::Claims,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<RingEvent>>, CoordinatorError> {
    let events =
        db::presence::events_after(&state.db, claims.sub, query.after.unwrap_or(0), 100).await?;
    Ok(Json(events))
}

async fn presence_active(
    State(state): State<Arc<AppState>>,
    claims: auth::Claims,
) -> Result<Json<Vec<ActiveCallPresence>>, CoordinatorError> {
    Ok(Json(db::presence::get_for_agent(&state.db, claims.sub).await?))
}

// ============== Availability ==============

async fn update_availability(
    State(state): State<Arc<AppState>>,
    claims: auth::Claims,
    Json(req): Json<UpdateAvailabilityRequest>,
) -> Result<Json<Agent>, CoordinatorError> {
    let agent = db::agents::set_availability(&state.db, claims.sub, req.available)
        .await?
        .ok_or(CoordinatorError::NotFound("agent"))?;
    info!(agent = %agent.id, available = agent.is_available, "availability updated");
    Ok(Json(agent))
}

/// Initialize and start the server
pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    let pool = db::init_pool(&config.database_url).await?;

    // Run migrations (non-fatal if already applied)
    if let Err(e) = db::run_migrations(&pool).await {
        warn!("Migration warning (may be already applied): {}", e);
    }

    let port = config.port;
    let provider: Arc<dyn VoiceProvider> = Arc::new(TwilioClient::new(
        config.twilio_account_sid.clone(),
        config.twilio_auth_token.clone(),
    ));

    let state = AppState {
        db: pool,
        provider,
        config,
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("Server running on http://0.0.0.0:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}
