//! Identities for the watched queue and the scaled service.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The logical job queue whose backlog drives scaling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueIdentity {
    pub name_prefix: String,
    pub name: String,
}

impl QueueIdentity {
    pub fn new(name_prefix: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name_prefix: name_prefix.into(),
            name: name.into(),
        }
    }

    /// `<prefix>:<name>`, the legacy key and the base of every other key.
    pub fn base_key(&self) -> String {
        format!("{}:{}", self.name_prefix, self.name)
    }

    /// Key for a named queue state, e.g. `bull:jobs:active`.
    pub fn state_key(&self, state: &str) -> String {
        format!("{}:{}:{state}", self.name_prefix, self.name)
    }

    /// Candidate backlog keys in probe order.
    pub fn candidate_keys(&self) -> Vec<String> {
        QueueKeyPattern::ALL.iter().map(|p| p.key(self)).collect()
    }
}

impl fmt::Display for QueueIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name_prefix, self.name)
    }
}

/// Historical naming conventions for the waiting-jobs list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKeyPattern {
    /// `<prefix>:<name>:wait`
    Wait,
    /// `<prefix>:<name>:waiting`
    Waiting,
    /// `<prefix>:<name>` with no suffix.
    Legacy,
}

impl QueueKeyPattern {
    /// Probe order. Earlier patterns win.
    pub const ALL: [QueueKeyPattern; 3] = [Self::Wait, Self::Waiting, Self::Legacy];

    pub fn key(self, queue: &QueueIdentity) -> String {
        match self {
            Self::Wait => queue.state_key("wait"),
            Self::Waiting => queue.state_key("waiting"),
            Self::Legacy => queue.base_key(),
        }
    }
}

/// The orchestrator-managed service being counted and scaled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceIdentity {
    /// Compose project name (`com.docker.compose.project`).
    pub project: String,
    /// Compose service name (`com.docker.compose.service`).
    pub service: String,
}

impl ServiceIdentity {
    pub fn new(project: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            service: service.into(),
        }
    }
}

impl fmt::Display for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project, self.service)
    }
}
