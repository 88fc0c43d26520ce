//! Client for the external AI classification service.
//!
//! Classification is advisory: every failure mode here — missing
//! configuration, timeouts, error statuses, malformed payloads — degrades to
//! "no classification" and must never block ticket creation. Unrecognized
//! labels in a payload fall back to safe defaults instead of being rejected.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::tickets::types::{TicketCategory, TicketPriority};

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("classification webhook not configured")]
    NotConfigured,
    #[error("classification service returned HTTP {0}")]
    Status(u16),
    #[error("classification request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Serialize)]
struct ClassificationRequest<'a> {
    ticket_id: i32,
    title: &'a str,
    description: &'a str,
}

/// Category/priority/confidence triple after fallback resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub category: TicketCategory,
    pub priority: TicketPriority,
    pub confidence: f64,
}

/// Resolve a raw classification payload into a usable triple.
///
/// The external system sends free-text labels; anything unrecognized maps to
/// a default rather than an error: category → other, priority → medium,
/// confidence level → 0.7. The confidence table is fixed:
/// high 0.9, medium 0.7, low 0.5.
pub fn parse_classification(payload: &Value) -> Classification {
    let node = payload.get("classification");
    let field = |key: &str| node.and_then(|c| c.get(key)).and_then(Value::as_str);

    let category = field("category")
        .and_then(|s| s.parse().ok())
        .unwrap_or(TicketCategory::Other);
    let priority = field("priority")
        .and_then(|s| s.parse().ok())
        .unwrap_or(TicketPriority::Medium);
    let confidence = match field("confidence") {
        Some("high") => 0.9,
        Some("low") => 0.5,
        _ => 0.7,
    };

    Classification {
        category,
        priority,
        confidence,
    }
}

#[derive(Debug, Clone)]
pub struct ClassifierClient {
    http: Client,
    webhook_url: Option<String>,
}

impl ClassifierClient {
    pub fn new(webhook_url: Option<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, webhook_url })
    }

    pub fn is_configured(&self) -> bool {
        self.webhook_url.is_some()
    }

    /// Submit a ticket's text for classification and return the raw response
    /// payload. The caller runs this off the request path; the client's
    /// timeout bounds how long a slow service can hold the task.
    pub async fn classify(
        &self,
        ticket_id: i32,
        title: &str,
        description: &str,
    ) -> Result<Value, ClassifierError> {
        let url = self
            .webhook_url
            .as_deref()
            .ok_or(ClassifierError::NotConfigured)?;
        debug!(ticket_id, "submitting ticket for classification");
        let response = self
            .http
            .post(url)
            .json(&ClassificationRequest {
                ticket_id,
                title,
                description,
            })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ClassifierError::Status(response.status().as_u16()));
        }
        Ok(response.json().await?)
    }
}
