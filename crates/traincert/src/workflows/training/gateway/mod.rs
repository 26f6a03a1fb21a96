//! Seams to the collaborators the engine consumes but does not implement:
//! document storage, notification delivery, template rendering, and the
//! approval workflow gating mutations.

mod drive;

pub use drive::GoogleDriveStore;

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::domain::{Request, RequestId, UserId};

/// Blob storage for rendered certificate artifacts.
pub trait DocumentStore: Send + Sync {
    fn upload(
        &self,
        container: &str,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, DocumentStoreError>;
    fn read_url(&self, url: &str, ttl: Duration) -> Result<String, DocumentStoreError>;
    fn delete(&self, url: &str) -> Result<(), DocumentStoreError>;
}

/// Document store dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum DocumentStoreError {
    #[error("document backend failed: {0}")]
    Backend(String),
    #[error("document not found for url {0}")]
    NotFound(String),
}

/// Classification attached to outbound notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationCategory {
    CertificateIssued,
    CertificateExpiring,
    DecisionSignoff,
}

/// A single outbound notification payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: UserId,
    pub title: String,
    pub body: String,
    pub category: NotificationCategory,
}

/// Outbound notification hook, injected per service so no process-wide
/// subscriber list exists.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification) -> Result<(), NotificationError>;
}

/// Notification dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Placeholder-substitution rendering; unresolved placeholders stay verbatim.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, template: &str, substitutions: &BTreeMap<String, String>) -> String;
}

/// Default renderer replacing `{{key}}` tokens.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderRenderer;

impl TemplateRenderer for PlaceholderRenderer {
    fn render(&self, template: &str, substitutions: &BTreeMap<String, String>) -> String {
        let mut rendered = template.to_string();
        for (key, value) in substitutions {
            rendered = rendered.replace(&format!("{{{{{key}}}}}"), value);
        }
        rendered
    }
}

/// Outcome requested for a pending approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalDecision {
    Approve,
    Reject,
}

/// Narrow interface for approval requesting so services depend on the
/// capability rather than on each other.
pub trait ApprovalGate: Send + Sync {
    fn submit(&self, request: Request) -> Result<Request, ApprovalError>;
    fn resolve(
        &self,
        id: &RequestId,
        decision: ApprovalDecision,
        approver: UserId,
    ) -> Result<Request, ApprovalError>;
}

/// Approval workflow error.
#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    #[error("request not found")]
    UnknownRequest,
    #[error("request already resolved")]
    AlreadyResolved,
    #[error("approval transport unavailable: {0}")]
    Transport(String),
}
