use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The one provider event type that moves money.
pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum WebhookStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl fmt::Display for WebhookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WebhookStatus::Pending => "pending",
            WebhookStatus::Processing => "processing",
            WebhookStatus::Completed => "completed",
            WebhookStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Idempotency and audit record for one provider event id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub event_id: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub status: WebhookStatus,
    pub error_message: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WebhookEvent {
    pub fn new(event: &GatewayEvent) -> Self {
        let now = Utc::now();
        Self {
            event_id: event.id.clone(),
            event_type: event.event_type.clone(),
            payload: event.payload.clone(),
            status: WebhookStatus::Pending,
            error_message: None,
            processed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == WebhookStatus::Completed
    }

    pub fn mark_processing(&mut self) {
        self.status = WebhookStatus::Processing;
        self.updated_at = Utc::now();
    }

    pub fn mark_completed(&mut self) {
        let now = Utc::now();
        self.status = WebhookStatus::Completed;
        self.error_message = None;
        self.processed_at = Some(now);
        self.updated_at = now;
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.status = WebhookStatus::Failed;
        self.error_message = Some(message.into());
        self.updated_at = Utc::now();
    }
}

/// An event whose signature the gateway adapter has already verified.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayEvent {
    pub id: String,
    pub event_type: String,
    /// The full verified body, kept for audit and replay.
    pub payload: serde_json::Value,
}

impl GatewayEvent {
    /// Parses a provider body of the form `{"id", "type", "data": {"object": ..}}`.
    pub fn from_payload(payload: serde_json::Value) -> Result<Self, serde_json::Error> {
        #[derive(Deserialize)]
        struct Envelope {
            id: String,
            #[serde(rename = "type")]
            event_type: String,
        }

        let envelope: Envelope = serde_json::from_value(payload.clone())?;
        Ok(Self {
            id: envelope.id,
            event_type: envelope.event_type,
            payload,
        })
    }

    /// The checkout session object carried by a `checkout.session.completed` event.
    pub fn checkout_session(&self) -> Result<CheckoutSessionObject, serde_json::Error> {
        let object = self
            .payload
            .get("data")
            .and_then(|data| data.get("object"))
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        serde_json::from_value(object)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
}

/// A checkout session opened with the provider for a wallet top-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub session_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentState {
    Open,
    Paid,
    Expired,
}

/// What the provider currently reports about a checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub session_id: String,
    pub state: PaymentState,
    pub payment_intent: Option<String>,
}
