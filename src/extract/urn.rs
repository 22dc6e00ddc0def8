use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Namespace token of every resource URN. Permission data is keyed on it, so
/// it never changes.
pub const URN_NAMESPACE: &str = "infratrographer";

const MAX_SEGMENT_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum UrnError {
    #[error("invalid namespace '{0}'")]
    InvalidNamespace(String),

    #[error("invalid resource type '{0}'")]
    InvalidResourceType(String),
}

/// `urn:<namespace>:<resource type>:<uuid>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Urn {
    namespace: String,
    resource_type: String,
    id: Uuid,
}

impl Urn {
    pub fn build(namespace: &str, resource_type: &str, id: Uuid) -> Result<Self, UrnError> {
        if !valid_segment(namespace) {
            return Err(UrnError::InvalidNamespace(namespace.to_string()));
        }
        if !valid_segment(resource_type) {
            return Err(UrnError::InvalidResourceType(resource_type.to_string()));
        }
        Ok(Self {
            namespace: namespace.to_string(),
            resource_type: resource_type.to_string(),
            id,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "urn:{}:{}:{}",
            self.namespace,
            self.resource_type,
            self.id.hyphenated()
        )
    }
}

fn valid_segment(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= MAX_SEGMENT_LEN
        && !s.starts_with('-')
        && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}
