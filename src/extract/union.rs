use crate::authz::AuthzError;
use crate::config::Scope;
use crate::logs::Logger;
use crate::request::RequestView;

use super::resource::ResourceExtractor;
use super::tenant::TenantExtractor;
use super::SubjectExtractor;

#[derive(Debug, Clone)]
pub enum UnionExtractor {
    Resource(ResourceExtractor),
    Tenant(TenantExtractor),
}

impl UnionExtractor {
    pub fn new(scope: &Scope) -> Self {
        match scope {
            Scope::Resource {
                resource_type,
                resource_param,
            } => Self::Resource(ResourceExtractor::new(resource_type, resource_param)),
            Scope::Tenant { source } => Self::Tenant(TenantExtractor::new(*source)),
        }
    }
}

impl SubjectExtractor for UnionExtractor {
    fn extract<R>(&self, req: &R, logger: &dyn Logger) -> Result<String, AuthzError>
    where
        R: RequestView + ?Sized,
    {
        match self {
            UnionExtractor::Resource(r) => r.extract(req, logger),
            UnionExtractor::Tenant(t) => t.extract(req, logger),
        }
    }
}
