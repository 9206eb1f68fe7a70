use crate::domain::actor::UserId;
use crate::domain::money::Amount;
use crate::domain::ports::PaymentGateway;
use crate::domain::webhook::{
    CHECKOUT_SESSION_COMPLETED, CheckoutSession, GatewayEvent, PaymentState, SessionStatus,
};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_SCHEME: &str = "v1=";

#[derive(Debug, Clone)]
struct SandboxSession {
    user_id: UserId,
    amount: Amount,
    currency: String,
    state: PaymentState,
    payment_intent: Option<String>,
}

/// A local stand-in for the payment provider.
///
/// Sessions live in memory and are paid by calling [`SandboxGateway::complete_session`].
/// Webhook bodies are signed with `v1=<hex hmac-sha256(secret, body)>`.
pub struct SandboxGateway {
    secret: String,
    sessions: DashMap<String, SandboxSession>,
}

impl SandboxGateway {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            sessions: DashMap::new(),
        }
    }

    fn mac(&self, payload: &[u8]) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|err| LedgerError::Gateway(format!("unusable webhook secret: {err}")))?;
        mac.update(payload);
        Ok(mac)
    }

    /// Signature header value for `payload`.
    pub fn sign(&self, payload: &[u8]) -> Result<String> {
        let tag = self.mac(payload)?.finalize().into_bytes();
        Ok(format!("{SIGNATURE_SCHEME}{}", hex::encode(tag)))
    }

    /// Body of a `checkout.session.completed` event for `session_id`.
    pub fn completed_event(&self, event_id: &str, session_id: &str) -> String {
        let payment_intent = self
            .sessions
            .get(session_id)
            .and_then(|session| session.payment_intent.clone());
        json!({
            "id": event_id,
            "type": CHECKOUT_SESSION_COMPLETED,
            "data": {
                "object": {
                    "id": session_id,
                    "payment_intent": payment_intent,
                }
            }
        })
        .to_string()
    }

    /// Marks a session paid, as a customer finishing checkout would, and
    /// returns the body of the event the provider sends for it.
    pub fn complete_session(&self, session_id: &str, event_id: &str) -> Result<String> {
        {
            let mut session = self
                .sessions
                .get_mut(session_id)
                .ok_or_else(|| LedgerError::Gateway(format!("unknown checkout session {session_id}")))?;
            if session.state == PaymentState::Expired {
                return Err(LedgerError::Gateway(format!("checkout session {session_id} expired")));
            }
            if session.payment_intent.is_none() {
                session.payment_intent = Some(format!("pi_{}", Uuid::new_v4().simple()));
            }
            session.state = PaymentState::Paid;
            tracing::debug!(
                session_id,
                user_id = %session.user_id,
                amount = %session.amount,
                currency = %session.currency,
                "sandbox session paid"
            );
        }
        Ok(self.completed_event(event_id, session_id))
    }

    /// Abandons an unpaid session.
    pub fn expire_session(&self, session_id: &str) -> Result<()> {
        let mut session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| LedgerError::Gateway(format!("unknown checkout session {session_id}")))?;
        if session.state == PaymentState::Open {
            session.state = PaymentState::Expired;
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    async fn create_session(&self, user_id: UserId, amount: Amount, currency: &str) -> Result<CheckoutSession> {
        let session_id = format!("cs_{}", Uuid::new_v4().simple());
        let client_secret = format!("{session_id}_secret_{}", Uuid::new_v4().simple());
        self.sessions.insert(
            session_id.clone(),
            SandboxSession {
                user_id,
                amount,
                currency: currency.to_string(),
                state: PaymentState::Open,
                payment_intent: None,
            },
        );
        Ok(CheckoutSession {
            session_id,
            client_secret,
        })
    }

    fn verify_signature(&self, payload: &[u8], signature: &str) -> Result<GatewayEvent> {
        let tag = signature
            .strip_prefix(SIGNATURE_SCHEME)
            .ok_or_else(|| LedgerError::InvalidSignature("unsupported signature scheme".to_string()))?;
        let tag = hex::decode(tag)
            .map_err(|err| LedgerError::InvalidSignature(format!("malformed signature: {err}")))?;
        self.mac(payload)?
            .verify_slice(&tag)
            .map_err(|_| LedgerError::InvalidSignature("signature mismatch".to_string()))?;
        let body = serde_json::from_slice(payload)
            .map_err(|err| LedgerError::InvalidSignature(format!("malformed payload: {err}")))?;
        GatewayEvent::from_payload(body)
            .map_err(|err| LedgerError::InvalidSignature(format!("malformed event: {err}")))
    }

    async fn session_status(&self, session_id: &str) -> Result<SessionStatus> {
        let session = self
            .sessions
            .get(session_id)
            .ok_or_else(|| LedgerError::Gateway(format!("unknown checkout session {session_id}")))?;
        Ok(SessionStatus {
            session_id: session_id.to_string(),
            state: session.state,
            payment_intent: session.payment_intent.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_signature_roundtrip_and_tampering() {
        let gateway = SandboxGateway::new("whsec");
        let body = br#"{"id":"evt_1","type":"checkout.session.completed"}"#;
        let signature = gateway.sign(body).unwrap();

        let event = gateway.verify_signature(body, &signature).unwrap();
        assert_eq!(event.id, "evt_1");
        assert!(matches!(
            gateway.verify_signature(br#"{"id":"evt_2","type":"x"}"#, &signature),
            Err(LedgerError::InvalidSignature(_))
        ));
        assert!(matches!(
            SandboxGateway::new("other").verify_signature(body, &signature),
            Err(LedgerError::InvalidSignature(_))
        ));
        assert!(matches!(
            gateway.verify_signature(body, "sha1=abc"),
            Err(LedgerError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_signature_is_hmac_sha256() {
        let gateway = SandboxGateway::new("Jefe");
        let body = b"what do ya want for nothing?";
        assert_eq!(
            gateway.sign(body).unwrap(),
            "v1=5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_malformed_or_truncated_signature_is_rejected() {
        let gateway = SandboxGateway::new("whsec");
        let body = br#"{"id":"evt_1","type":"checkout.session.completed"}"#;
        let signature = gateway.sign(body).unwrap();

        assert!(matches!(
            gateway.verify_signature(body, "v1=not-hex"),
            Err(LedgerError::InvalidSignature(_))
        ));
        assert!(matches!(
            gateway.verify_signature(body, &signature[..signature.len() - 2]),
            Err(LedgerError::InvalidSignature(_))
        ));
        // a plain keyed digest is not a valid tag
        let legacy = {
            use sha2::Digest;
            let mut hasher = Sha256::new();
            hasher.update(b"whsec:");
            hasher.update(body);
            format!("v1={}", hex::encode(hasher.finalize()))
        };
        assert!(matches!(
            gateway.verify_signature(body, &legacy),
            Err(LedgerError::InvalidSignature(_))
        ));
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let gateway = SandboxGateway::new("whsec");
        let session = gateway
            .create_session(UserId(1), Amount::new(dec!(5)).unwrap(), "usd")
            .await
            .unwrap();
        assert!(session.client_secret.starts_with(&session.session_id));

        let status = gateway.session_status(&session.session_id).await.unwrap();
        assert_eq!(status.state, PaymentState::Open);

        let body = gateway.complete_session(&session.session_id, "evt_9").unwrap();
        let status = gateway.session_status(&session.session_id).await.unwrap();
        assert_eq!(status.state, PaymentState::Paid);

        let event = gateway.verify_signature(body.as_bytes(), &gateway.sign(body.as_bytes()).unwrap()).unwrap();
        let object = event.checkout_session().unwrap();
        assert_eq!(object.id, session.session_id);
        assert_eq!(object.payment_intent, status.payment_intent);
    }

    #[tokio::test]
    async fn test_expired_session_cannot_be_paid() {
        let gateway = SandboxGateway::new("whsec");
        let session = gateway
            .create_session(UserId(1), Amount::new(dec!(5)).unwrap(), "usd")
            .await
            .unwrap();
        gateway.expire_session(&session.session_id).unwrap();
        assert!(matches!(
            gateway.complete_session(&session.session_id, "evt_1"),
            Err(LedgerError::Gateway(_))
        ));
        assert!(gateway.session_status("cs_nope").await.is_err());
    }
}
