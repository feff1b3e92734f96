//! Report delivery by email.

pub mod gmail;
pub mod mime;

use async_trait::async_trait;
use thiserror::Error;

pub use gmail::GmailSink;

/// Plain-text part shown by clients that cannot render HTML.
pub const PLAIN_FALLBACK: &str = "This email requires an HTML-compatible client.";

/// A finished message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub subject: String,
    /// Single-division HTML shown in the message body.
    pub inline_html_body: String,
    /// Full report attached as an HTML file.
    pub attachment_html: String,
    pub attachment_filename: String,
    pub recipients: Vec<String>,
}

/// Proof of a successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Provider message id.
    pub message_id: String,
    pub recipients: usize,
}

/// Delivery failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("mail credentials expired and could not be refreshed: {0}")]
    AuthTokenExpired(String),

    #[error("mail quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("network error while sending mail: {0}")]
    Network(String),

    #[error("mail API rejected the message (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("mail token file problem: {0}")]
    Token(String),
}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        DeliveryError::Network(err.to_string())
    }
}

/// Accepts finished messages for delivery.
#[async_trait]
pub trait MailSink: Send {
    async fn send(&mut self, mail: &OutgoingMail) -> Result<DeliveryReceipt, DeliveryError>;
}
