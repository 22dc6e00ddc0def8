use uuid::Uuid;

use crate::authz::AuthzError;
use crate::header::canonical_param;
use crate::logs::Logger;
use crate::request::RequestView;

use super::urn::{Urn, URN_NAMESPACE};
use super::SubjectExtractor;

/// Builds a resource URN from the id found in a route or query param.
#[derive(Debug, Clone)]
pub struct ResourceExtractor {
    resource_type: String,
    /// Param key as stored by the request view, first character upper-cased.
    param_key: String,
}

impl ResourceExtractor {
    pub fn new(resource_type: &str, resource_param: &str) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            param_key: canonical_param(resource_param),
        }
    }
}

impl SubjectExtractor for ResourceExtractor {
    fn extract<R>(&self, req: &R, logger: &dyn Logger) -> Result<String, AuthzError>
    where
        R: RequestView + ?Sized,
    {
        let value = match req.params().get(&self.param_key) {
            Some(value) if !value.is_empty() => value,
            _ => return Err(AuthzError::NoValidResourceID(self.param_key.clone())),
        };

        let id = Uuid::parse_str(value).map_err(|err| AuthzError::InvalidResourceUUID {
            value: value.clone(),
            reason: err.to_string(),
        })?;

        match Urn::build(URN_NAMESPACE, &self.resource_type, id) {
            Ok(urn) => Ok(urn.to_string()),
            Err(err) => {
                logger.error(format_args!(
                    "Failed to build urn for '{}' of type '{}': {err}",
                    value, self.resource_type
                ));
                Err(AuthzError::InvalidResourceUUID {
                    value: value.clone(),
                    reason: err.to_string(),
                })
            }
        }
    }
}
