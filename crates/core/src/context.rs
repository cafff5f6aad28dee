//! Typed request context attached to errors.

use serde::{Deserialize, Serialize};

use crate::error::Details;

/// Where and for whom an error happened.
///
/// Every field is optional; lower layers fill in what they know
/// (operation, component) and the HTTP boundary adds the request side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Details::is_empty")]
    pub metadata: Details,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Overlay `other` on top of `self`: fields set in `other` win, metadata merges.
    pub fn merge(mut self, other: ErrorContext) -> Self {
        fn pick(a: &mut Option<String>, b: Option<String>) {
            if b.is_some() {
                *a = b;
            }
        }

        pick(&mut self.operation, other.operation);
        pick(&mut self.component, other.component);
        pick(&mut self.user_id, other.user_id);
        pick(&mut self.request_id, other.request_id);
        pick(&mut self.session_id, other.session_id);
        pick(&mut self.trace_id, other.trace_id);
        pick(&mut self.ip, other.ip);
        pick(&mut self.user_agent, other.user_agent);
        self.metadata.extend(other.metadata);
        self
    }
}
