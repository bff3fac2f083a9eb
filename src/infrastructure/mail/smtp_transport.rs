//! SMTP transport backed by lettre's async connection pool.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::{ContentType, Header, HeaderName, HeaderValue};
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, warn};

use crate::domain::transport::{OutgoingMessage, SendReceipt, Transport, TransportError};

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpTls {
    /// Plain connection upgraded with STARTTLS (port 587).
    StartTls,
    /// TLS from the first byte (port 465).
    Implicit,
    /// No encryption. Local relays and test servers only.
    None,
}

impl std::str::FromStr for SmtpTls {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "starttls" => Ok(Self::StartTls),
            "tls" => Ok(Self::Implicit),
            "none" => Ok(Self::None),
            other => Err(format!("unknown SMTP_TLS mode '{other}'")),
        }
    }
}

/// `List-Unsubscribe` header carrying the one-click opt-out URL.
#[derive(Debug, Clone)]
struct ListUnsubscribe(String);

impl Header for ListUnsubscribe {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("List-Unsubscribe")
    }

    fn parse(s: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Self(
            s.trim().trim_start_matches('<').trim_end_matches('>').to_string(),
        ))
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), format!("<{}>", self.0))
    }
}

/// `List-Unsubscribe-Post: List-Unsubscribe=One-Click`.
#[derive(Debug, Clone)]
struct ListUnsubscribePost;

impl Header for ListUnsubscribePost {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("List-Unsubscribe-Post")
    }

    fn parse(_: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Self)
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), "List-Unsubscribe=One-Click".to_string())
    }
}

/// Connection settings for [`SmtpTransport`].
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: SmtpTls,
    pub timeout: Duration,
    pub from: String,
}

/// Sends messages through an SMTP relay.
///
/// Every call is bounded by the configured timeout. Permanent (5xx) replies
/// map to [`TransportError::Rejected`]; everything else, including timeouts
/// and transient (4xx) replies, maps to [`TransportError::Unavailable`].
pub struct SmtpTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpTransport {
    /// Builds the pooled transport. No connection is opened until the first send.
    ///
    /// # Errors
    ///
    /// Returns an error if the sender mailbox cannot be parsed or the TLS
    /// parameters for `host` cannot be built.
    pub fn new(settings: &SmtpSettings) -> anyhow::Result<Self> {
        let from: Mailbox = settings
            .from
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid MAIL_FROM '{}': {e}", settings.from))?;

        let builder = match settings.tls {
            SmtpTls::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)?,
            SmtpTls::Implicit => AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)?,
            SmtpTls::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host),
        };

        let mut builder = builder
            .port(settings.port)
            .timeout(Some(settings.timeout));

        if let (Some(user), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        debug!(
            host = %settings.host,
            port = settings.port,
            tls = ?settings.tls,
            "SMTP transport configured"
        );

        Ok(Self {
            mailer: builder.build(),
            from,
        })
    }

    fn build_message(&self, message: &OutgoingMessage) -> Result<Message, TransportError> {
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|_| TransportError::InvalidAddress(message.to.clone()))?;

        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.clone());

        if let Some(url) = &message.list_unsubscribe {
            builder = builder
                .header(ListUnsubscribe(url.clone()))
                .header(ListUnsubscribePost);
        }

        let built = match &message.text {
            Some(text) => builder.multipart(MultiPart::alternative_plain_html(
                text.clone(),
                message.html.clone(),
            )),
            None => builder.singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_HTML)
                    .body(message.html.clone()),
            ),
        };

        built.map_err(|e| TransportError::Build(e.to_string()))
    }
}

#[async_trait]
impl Transport for SmtpTransport {
    async fn send(&self, message: OutgoingMessage) -> Result<SendReceipt, TransportError> {
        let email = self.build_message(&message)?;

        match self.mailer.send(email).await {
            Ok(response) => Ok(SendReceipt {
                response: Some(response.code().to_string()),
            }),
            Err(e) if e.is_permanent() => Err(TransportError::Rejected(e.to_string())),
            Err(e) => Err(TransportError::Unavailable(e.to_string())),
        }
    }

    async fn health_check(&self) -> bool {
        match self.mailer.test_connection().await {
            Ok(ok) => ok,
            Err(e) => {
                warn!(error = %e, "SMTP health check failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SmtpSettings {
        SmtpSettings {
            host: "localhost".to_string(),
            port: 2525,
            username: None,
            password: None,
            tls: SmtpTls::None,
            timeout: Duration::from_secs(1),
            from: "Shop <news@shop.example.com>".to_string(),
        }
    }

    fn message(to: &str, text: Option<&str>) -> OutgoingMessage {
        OutgoingMessage {
            to: to.to_string(),
            subject: "Hello".to_string(),
            html: "<p>Hello</p>".to_string(),
            text: text.map(str::to_string),
            list_unsubscribe: None,
        }
    }

    #[test]
    fn test_tls_mode_parsing() {
        assert_eq!("STARTTLS".parse::<SmtpTls>(), Ok(SmtpTls::StartTls));
        assert_eq!("tls".parse::<SmtpTls>(), Ok(SmtpTls::Implicit));
        assert_eq!("none".parse::<SmtpTls>(), Ok(SmtpTls::None));
        assert!("ssl3".parse::<SmtpTls>().is_err());
    }

    #[tokio::test]
    async fn test_invalid_sender_is_rejected() {
        let mut bad = settings();
        bad.from = "not a mailbox".to_string();
        assert!(SmtpTransport::new(&bad).is_err());
    }

    #[tokio::test]
    async fn test_build_message_rejects_bad_recipient() {
        let transport = SmtpTransport::new(&settings()).unwrap();
        let result = transport.build_message(&message("nope", None));
        assert!(matches!(result, Err(TransportError::InvalidAddress(_))));
    }

    #[tokio::test]
    async fn test_build_message_variants() {
        let transport = SmtpTransport::new(&settings()).unwrap();

        let html_only = transport
            .build_message(&message("a@example.com", None))
            .unwrap();
        let formatted = String::from_utf8(html_only.formatted()).unwrap();
        assert!(formatted.contains("text/html"));

        let both = transport
            .build_message(&message("a@example.com", Some("Hello")))
            .unwrap();
        let formatted = String::from_utf8(both.formatted()).unwrap();
        assert!(formatted.contains("multipart/alternative"));
        assert!(formatted.contains("text/plain"));
        assert!(!formatted.contains("List-Unsubscribe"));
    }

    #[tokio::test]
    async fn test_build_message_emits_one_click_headers() {
        let transport = SmtpTransport::new(&settings()).unwrap();
        let mut msg = message("a@example.com", Some("Hello"));
        msg.list_unsubscribe = Some("https://shop.example.com/unsubscribe/tok".to_string());

        let formatted = String::from_utf8(transport.build_message(&msg).unwrap().formatted()).unwrap();

        assert!(
            formatted.contains("List-Unsubscribe: <https://shop.example.com/unsubscribe/tok>")
        );
        assert!(formatted.contains("List-Unsubscribe-Post: List-Unsubscribe=One-Click"));
    }
}
