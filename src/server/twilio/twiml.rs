//! Voice-control document builder.
//!
//! Webhook responses are TwiML: a small XML vocabulary of say / record /
//! dial / hangup directives. The builder only knows how to assemble valid
//! documents; which document to play is routing policy and lives with the
//! router and the park coordinator.

use std::fmt::Write;

use uuid::Uuid;

#[derive(Debug, Default)]
pub struct VoiceResponse {
    body: String,
}

#[derive(Debug, Clone, Default)]
pub struct DialOptions {
    pub timeout_secs: u32,
    /// Status-callback URL the provider reports the dial outcome to.
    pub action: Option<String>,
    pub caller_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RecordOptions {
    pub timeout_secs: u32,
    pub max_length_secs: u32,
    pub transcribe_callback: Option<String>,
}

impl VoiceResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn say(mut self, message: &str) -> Self {
        let _ = write!(self.body, "<Say>{}</Say>", escape(message));
        self
    }

    pub fn record(mut self, opts: &RecordOptions) -> Self {
        let _ = write!(
            self.body,
            "<Record timeout=\"{}\" maxLength=\"{}\"",
            opts.timeout_secs, opts.max_length_secs
        );
        if let Some(callback) = &opts.transcribe_callback {
            let _ = write!(
                self.body,
                " transcribe=\"true\" transcribeCallback=\"{}\"",
                escape(callback)
            );
        }
        self.body.push_str("/>");
        self
    }

    /// Simultaneous dial to every listed agent client endpoint; the provider
    /// rings them all and connects the first to answer.
    pub fn dial_clients(mut self, opts: &DialOptions, clients: &[Uuid]) -> Self {
        self.open_dial(opts);
        for client in clients {
            let _ = write!(self.body, "<Client>{client}</Client>");
        }
        self.body.push_str("</Dial>");
        self
    }

    pub fn dial_number(mut self, opts: &DialOptions, number: &str) -> Self {
        self.open_dial(opts);
        let _ = write!(self.body, "<Number>{}</Number>", escape(number));
        self.body.push_str("</Dial>");
        self
    }

    /// Holds the leg in a named conference bridge.
    pub fn dial_conference(mut self, name: &str) -> Self {
        let _ = write!(
            self.body,
            "<Dial><Conference>{}</Conference></Dial>",
            escape(name)
        );
        self
    }

    pub fn hangup(mut self) -> Self {
        self.body.push_str("<Hangup/>");
        self
    }

    pub fn into_xml(self) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>{}</Response>",
            self.body
        )
    }

    fn open_dial(&mut self, opts: &DialOptions) {
        let _ = write!(self.body, "<Dial timeout=\"{}\"", opts.timeout_secs);
        if let Some(action) = &opts.action {
            let _ = write!(self.body, " action=\"{}\"", escape(action));
        }
        if let Some(caller_id) = &opts.caller_id {
            let _ = write!(self.body, " callerId=\"{}\"", escape(caller_id));
        }
        self.body.push('>');
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_valid() {
        assert_eq!(
            VoiceResponse::new().into_xml(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response></Response>"
        );
    }

    #[test]
    fn dial_fans_out_to_every_client() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let xml = VoiceResponse::new()
            .dial_clients(
                &DialOptions {
                    timeout_secs: 30,
                    action: Some("https://dispatch.example.com/api/twilio/dial-status".into()),
                    caller_id: Some("+15551230000".into()),
                },
                &[a, b],
            )
            .into_xml();

        assert!(xml.contains("<Dial timeout=\"30\""));
        assert!(xml.contains("action=\"https://dispatch.example.com/api/twilio/dial-status\""));
        assert!(xml.contains("callerId=\"+15551230000\""));
        assert!(xml.contains(&format!("<Client>{a}</Client>")));
        assert!(xml.contains(&format!("<Client>{b}</Client>")));
    }

    #[test]
    fn voicemail_document_records_with_transcription() {
        let xml = VoiceResponse::new()
            .say("All agents are busy.")
            .record(&RecordOptions {
                timeout_secs: 3,
                max_length_secs: 120,
                transcribe_callback: Some("/api/twilio/transcription".into()),
            })
            .say("Goodbye.")
            .hangup()
            .into_xml();

        assert!(xml.contains("<Say>All agents are busy.</Say>"));
        assert!(xml.contains("<Record timeout=\"3\" maxLength=\"120\""));
        assert!(xml.contains("transcribe=\"true\""));
        assert!(xml.contains("transcribeCallback=\"/api/twilio/transcription\""));
        assert!(xml.ends_with("<Hangup/></Response>"));
    }

    #[test]
    fn conference_hold_document() {
        let xml = VoiceResponse::new().dial_conference("park-CA123").into_xml();
        assert!(xml.contains("<Dial><Conference>park-CA123</Conference></Dial>"));
    }

    #[test]
    fn reserved_characters_are_escaped() {
        let xml = VoiceResponse::new().say("Smith & Sons <call>").into_xml();
        assert!(xml.contains("<Say>Smith &amp; Sons &lt;call&gt;</Say>"));
    }
}
