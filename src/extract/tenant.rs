use crate::authz::AuthzError;
use crate::config::TenantSource;
use crate::header::HEADER_TENANT_ID;
use crate::logs::Logger;
use crate::request::RequestView;

use super::SubjectExtractor;

const TENANTS_SEGMENT: &str = "tenants";

/// Reads an opaque tenant id from the `X-Tenant-Id` header or from the path
/// segment after `tenants`.
#[derive(Debug, Clone, Copy)]
pub struct TenantExtractor {
    source: TenantSource,
}

impl TenantExtractor {
    pub fn new(source: TenantSource) -> Self {
        Self { source }
    }
}

impl SubjectExtractor for TenantExtractor {
    fn extract<R>(&self, req: &R, _logger: &dyn Logger) -> Result<String, AuthzError>
    where
        R: RequestView + ?Sized,
    {
        let tenant = match self.source {
            TenantSource::Header => req.header(HEADER_TENANT_ID),
            TenantSource::Path => tenant_from_path(req.path()),
        };
        if tenant.is_empty() {
            return Err(AuthzError::NoValidTenant);
        }
        Ok(tenant.to_string())
    }
}

fn tenant_from_path(path: &str) -> &str {
    let mut segments = path.split('/');
    while let Some(segment) = segments.next() {
        if segment == TENANTS_SEGMENT {
            return segments.next().unwrap_or_default();
        }
    }
    ""
}
