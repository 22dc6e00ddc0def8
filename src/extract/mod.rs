mod resource;
mod tenant;
mod token;
mod union;

pub mod urn;

pub use resource::ResourceExtractor;
pub use tenant::TenantExtractor;
pub use token::bearer_token;
pub use union::UnionExtractor;

use crate::authz::AuthzError;
use crate::logs::Logger;
use crate::request::RequestView;

/// Derives the authorization subject from a request.
pub trait SubjectExtractor: Send + Sync {
    fn extract<R>(&self, req: &R, logger: &dyn Logger) -> Result<String, AuthzError>
    where
        R: RequestView + ?Sized;
}
