//! Twilio Voice API client.
//!
//! The coordination core only ever talks to the provider through the
//! [`VoiceProvider`] trait, so everything above this module can run against a
//! fake in tests. `TwilioClient` is the real implementation over the REST
//! API; voice-control documents are built in [`twiml`] and signatures are
//! checked in [`signature`].

pub mod signature;
pub mod twiml;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {message}")]
    Api { message: String },
}

/// Where the provider says a leg currently is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LegStatus {
    Queued,
    Ringing,
    InProgress,
    Completed,
    Busy,
    Failed,
    NoAnswer,
    Canceled,
}

impl LegStatus {
    pub fn parse(raw: &str) -> Option<LegStatus> {
        match raw {
            "queued" => Some(LegStatus::Queued),
            "ringing" => Some(LegStatus::Ringing),
            "in-progress" => Some(LegStatus::InProgress),
            "completed" => Some(LegStatus::Completed),
            "busy" => Some(LegStatus::Busy),
            "failed" => Some(LegStatus::Failed),
            "no-answer" => Some(LegStatus::NoAnswer),
            "canceled" => Some(LegStatus::Canceled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LegStatus::Queued => "queued",
            LegStatus::Ringing => "ringing",
            LegStatus::InProgress => "in-progress",
            LegStatus::Completed => "completed",
            LegStatus::Busy => "busy",
            LegStatus::Failed => "failed",
            LegStatus::NoAnswer => "no-answer",
            LegStatus::Canceled => "canceled",
        }
    }

    /// A leg in one of these states no longer exists on the provider side;
    /// redirecting it can never succeed.
    pub fn is_ended(&self) -> bool {
        matches!(
            self,
            LegStatus::Completed | LegStatus::Canceled | LegStatus::Busy | LegStatus::Failed | LegStatus::NoAnswer
        )
    }
}

/// Narrow provider boundary consumed by the router and park coordinator.
#[async_trait]
pub trait VoiceProvider: Send + Sync {
    /// Current status of a single call leg.
    async fn fetch_leg_status(&self, call_sid: &str) -> Result<LegStatus, ProviderError>;

    /// Re-points a live leg at a new voice-control document. Irreversible:
    /// the previous document stops executing the moment this succeeds.
    async fn redirect_leg(&self, call_sid: &str, twiml: &str) -> Result<(), ProviderError>;

    /// Dials `to` and drops the answered leg into the named conference.
    /// Returns the new participant leg's call SID.
    async fn create_conference_participant(
        &self,
        conference: &str,
        to: &str,
        from: &str,
    ) -> Result<String, ProviderError>;
}

#[derive(Clone)]
pub struct TwilioClient {
    client: Client,
    account_sid: String,
    auth_token: String,
    base_url: String,
}

impl TwilioClient {
    pub fn new(account_sid: String, auth_token: String) -> Self {
        Self::with_base_url(
            account_sid,
            auth_token,
            "https://api.twilio.com/2010-04-01".to_string(),
        )
    }

    pub fn with_base_url(account_sid: String, auth_token: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            account_sid,
            auth_token,
            base_url,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/Accounts/{}{}", self.base_url, self.account_sid, path)
    }

    async fn get<R: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<R, ProviderError> {
        let response = self
            .client
            .get(self.url(path))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api { message: error_text });
        }

        Ok(response.json().await?)
    }

    async fn post_form<R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<R, ProviderError> {
        let response = self
            .client
            .post(self.url(path))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api { message: error_text });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl VoiceProvider for TwilioClient {
    async fn fetch_leg_status(&self, call_sid: &str) -> Result<LegStatus, ProviderError> {
        let resource: CallResource = self.get(&format!("/Calls/{call_sid}.json")).await?;
        LegStatus::parse(&resource.status).ok_or_else(|| ProviderError::Api {
            message: format!("unrecognized call status: {}", resource.status),
        })
    }

    async fn redirect_leg(&self, call_sid: &str, twiml: &str) -> Result<(), ProviderError> {
        let _: CallResource = self
            .post_form(&format!("/Calls/{call_sid}.json"), &[("Twiml", twiml)])
            .await?;
        Ok(())
    }

    async fn create_conference_participant(
        &self,
        conference: &str,
        to: &str,
        from: &str,
    ) -> Result<String, ProviderError> {
        let participant: ParticipantResource = self
            .post_form(
                &format!("/Conferences/{conference}/Participants.json"),
                &[("To", to), ("From", from)],
            )
            .await?;
        Ok(participant.call_sid)
    }
}

// Response shapes

#[derive(Deserialize)]
struct CallResource {
    status: String,
}

#[derive(Deserialize)]
struct ParticipantResource {
    call_sid: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leg_status_round_trips_provider_vocabulary() {
        for raw in [
            "queued",
            "ringing",
            "in-progress",
            "completed",
            "busy",
            "failed",
            "no-answer",
            "canceled",
        ] {
            let status = LegStatus::parse(raw).unwrap();
            assert_eq!(status.as_str(), raw);
        }
        assert_eq!(LegStatus::parse("on-hold"), None);
    }

    #[test]
    fn live_legs_are_not_ended() {
        assert!(!LegStatus::Queued.is_ended());
        assert!(!LegStatus::Ringing.is_ended());
        assert!(!LegStatus::InProgress.is_ended());
        assert!(LegStatus::Completed.is_ended());
        assert!(LegStatus::Canceled.is_ended());
    }
}
