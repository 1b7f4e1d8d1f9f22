use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use tollgate_domain::clock::Clock;
use tollgate_domain::id::IdGenerator;

use crate::domain::repository::AuditLogRepository;
use crate::domain::types::{AuditAction, AuditEntry, ClientMeta};

/// A security event about to be recorded. Metadata must never carry OTPs, passkeys or
/// tokens.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub user_id: Option<Uuid>,
    pub action: AuditAction,
    pub identifier: String,
    pub metadata: Option<Value>,
    pub success: bool,
}

impl AuditEvent {
    pub fn success(action: AuditAction, identifier: impl Into<String>) -> Self {
        Self {
            user_id: None,
            action,
            identifier: identifier.into(),
            metadata: None,
            success: true,
        }
    }

    pub fn failure(action: AuditAction, identifier: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::success(action, identifier)
        }
    }

    pub fn user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

pub struct AuditTrail<A: AuditLogRepository> {
    pub logs: A,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<IdGenerator>,
}

impl<A: AuditLogRepository> AuditTrail<A> {
    /// Append one entry. Never fails the enclosing flow: write errors are logged.
    pub async fn record(&self, event: AuditEvent, client: &ClientMeta) {
        let entry = AuditEntry {
            id: self.ids.next_id(),
            user_id: event.user_id,
            action: event.action,
            identifier: event.identifier,
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
            metadata: event.metadata,
            success: event.success,
            created_at: self.clock.now(),
        };
        if let Err(e) = self.logs.append(&entry).await {
            tracing::warn!(action = entry.action.as_str(), error = %e, "failed to write audit log");
        }
    }
}
