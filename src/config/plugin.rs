use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Namespace key the filter reads its section from.
pub const PLUGIN_NAME: &str = "porton";

pub const AUTHZ_SERVICE_KEY: &str = "authz_service";
pub const ENDPOINT_KEY: &str = "endpoint";
pub const TIMEOUT_KEY: &str = "timeout";
pub const ACTION_KEY: &str = "action";
pub const RESOURCE_TYPE_KEY: &str = "resource_type";
pub const RESOURCE_PARAM_KEY: &str = "resource_param";
pub const TENANT_SOURCE_KEY: &str = "tenant_source";

pub const DEFAULT_TIMEOUT_MILLIS: u64 = 1000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration not found")]
    ConfigurationNotFound,

    #[error("invalid config: {}", join_fields(.0))]
    InvalidConfig(Vec<FieldError>),
}

impl ConfigError {
    /// Keys of every offending field, in the order they were checked.
    pub fn keys(&self) -> Vec<&str> {
        match self {
            ConfigError::ConfigurationNotFound => vec![],
            ConfigError::InvalidConfig(fields) => fields.iter().map(|f| f.key.as_str()).collect(),
        }
    }
}

fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// One problem found with one configuration key.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{key} {problem}")]
pub struct FieldError {
    /// Dotted path of the key, e.g. `authz_service.endpoint`.
    pub key: String,
    pub problem: Problem,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Problem {
    Missing,
    Empty,
    WrongType(&'static str),
    InvalidUrl(String),
    UnsupportedScheme(String),
    Negative,
    NotOneOf(&'static [&'static str]),
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Problem::Missing => write!(f, "is missing"),
            Problem::Empty => write!(f, "is empty"),
            Problem::WrongType(expect) => write!(f, "should be of type {expect}"),
            Problem::InvalidUrl(err) => write!(f, "is not a valid URL: {err}"),
            Problem::UnsupportedScheme(scheme) => {
                write!(f, "should use http or https, not '{scheme}'")
            }
            Problem::Negative => write!(f, "cannot be negative"),
            Problem::NotOneOf(allowed) => write!(f, "should be one of {}", allowed.join(", ")),
        }
    }
}

/// Which identity strategy a deployment uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    #[default]
    Resource,
    Tenant,
}

/// Where the tenant-scoped variant finds the tenant identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TenantSource {
    Header,
    #[default]
    Path,
}

impl TenantSource {
    pub const VALUES: &'static [&'static str] = &["header", "path"];

    pub fn as_str(&self) -> &'static str {
        match self {
            TenantSource::Header => "header",
            TenantSource::Path => "path",
        }
    }
}

impl FromStr for TenantSource {
    type Err = Problem;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "header" => Ok(TenantSource::Header),
            "path" => Ok(TenantSource::Path),
            _ => Err(Problem::NotOneOf(Self::VALUES)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthzService {
    /// URL of the permissions service
    pub endpoint: Url,
    /// Timeout for one permission check, in milliseconds. Defaults to 1000.
    pub timeout_millis: u64,
}

impl AuthzService {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_millis)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Scope {
    /// The subject is a URN built from a resource id found in the request.
    Resource {
        resource_type: String,
        /// Name of the route or query parameter holding the resource id.
        resource_param: String,
    },
    /// The subject is a tenant id found in a header or in the path.
    Tenant { source: TenantSource },
}

/// Validated filter configuration. Built once, then only read.
#[derive(Debug, Clone, PartialEq)]
pub struct PortonConfig {
    pub authz_service: AuthzService,
    /// The action being authorized, e.g. "read".
    pub action: String,
    pub scope: Scope,
}

impl PortonConfig {
    /// Validates the raw configuration tree. `raw` is the mapping holding the
    /// [`PLUGIN_NAME`] section, usually a gateway's `extra_config`.
    ///
    /// Every problem is collected before returning, so one run reports all of
    /// them.
    pub fn parse(raw: Option<&Value>, variant: Variant) -> Result<Self, ConfigError> {
        let section = match raw.and_then(|v| v.get(PLUGIN_NAME)) {
            Some(Value::Object(section)) => section,
            _ => return Err(ConfigError::ConfigurationNotFound),
        };

        let mut errors = Vec::new();
        let mut fields = Fields::new(section, None, &mut errors);

        let authz_service = fields.map_required(AUTHZ_SERVICE_KEY);
        let action = fields.string_required(ACTION_KEY);
        let scope = match variant {
            Variant::Resource => {
                let resource_type = fields.string_required(RESOURCE_TYPE_KEY);
                let resource_param = fields.string_required(RESOURCE_PARAM_KEY);
                match (resource_type, resource_param) {
                    (Some(resource_type), Some(resource_param)) => Some(Scope::Resource {
                        resource_type,
                        resource_param,
                    }),
                    _ => None,
                }
            }
            Variant::Tenant => fields
                .enum_or_default::<TenantSource>(TENANT_SOURCE_KEY)
                .map(|source| Scope::Tenant { source }),
        };

        let authz_service = authz_service.and_then(|svc| {
            let mut fields = Fields::new(svc, Some(AUTHZ_SERVICE_KEY), &mut errors);
            let endpoint = fields.url_required(ENDPOINT_KEY);
            let timeout = fields.integer_or_default(TIMEOUT_KEY, DEFAULT_TIMEOUT_MILLIS);
            Some(AuthzService {
                endpoint: endpoint?,
                timeout_millis: timeout?,
            })
        });

        match (authz_service, action, scope) {
            (Some(authz_service), Some(action), Some(scope)) if errors.is_empty() => Ok(Self {
                authz_service,
                action,
                scope,
            }),
            _ => Err(ConfigError::InvalidConfig(errors)),
        }
    }
}

/// Field-by-field reader over one mapping of the raw tree. Each getter
/// records a [`FieldError`] and returns `None` when the field is unusable.
struct Fields<'a, 'e> {
    map: &'a Map<String, Value>,
    prefix: Option<&'static str>,
    errors: &'e mut Vec<FieldError>,
}

impl<'a, 'e> Fields<'a, 'e> {
    fn new(
        map: &'a Map<String, Value>,
        prefix: Option<&'static str>,
        errors: &'e mut Vec<FieldError>,
    ) -> Self {
        Self {
            map,
            prefix,
            errors,
        }
    }

    /// An explicit null counts as absent.
    fn get(&self, key: &str) -> Option<&'a Value> {
        match self.map.get(key) {
            Some(Value::Null) | None => None,
            Some(value) => Some(value),
        }
    }

    fn fail<T>(&mut self, key: &str, problem: Problem) -> Option<T> {
        let key = match self.prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key.to_string(),
        };
        self.errors.push(FieldError { key, problem });
        None
    }

    fn map_required(&mut self, key: &str) -> Option<&'a Map<String, Value>> {
        match self.get(key) {
            Some(Value::Object(map)) => Some(map),
            Some(_) => self.fail(key, Problem::WrongType("map")),
            None => self.fail(key, Problem::Missing),
        }
    }

    fn string_required(&mut self, key: &str) -> Option<String> {
        match self.get(key) {
            Some(Value::String(s)) if s.is_empty() => self.fail(key, Problem::Empty),
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => self.fail(key, Problem::WrongType("string")),
            None => self.fail(key, Problem::Missing),
        }
    }

    fn url_required(&mut self, key: &str) -> Option<Url> {
        let raw = self.string_required(key)?;
        let url = match Url::parse(&raw) {
            Ok(url) => url,
            Err(err) => return self.fail(key, Problem::InvalidUrl(err.to_string())),
        };
        match url.scheme() {
            "http" | "https" => Some(url),
            scheme => self.fail(key, Problem::UnsupportedScheme(scheme.to_string())),
        }
    }

    /// Absent or zero means `default`.
    fn integer_or_default(&mut self, key: &str, default: u64) -> Option<u64> {
        let value = match self.get(key) {
            Some(value) => value,
            None => return Some(default),
        };
        match value {
            Value::Number(n) if n.as_u64() == Some(0) => Some(default),
            Value::Number(n) if n.as_u64().is_some() => n.as_u64(),
            Value::Number(n) if n.as_i64().is_some() => self.fail(key, Problem::Negative),
            _ => self.fail(key, Problem::WrongType("integer")),
        }
    }

    /// Absent or empty means `T::default()`.
    fn enum_or_default<T>(&mut self, key: &str) -> Option<T>
    where
        T: FromStr<Err = Problem> + Default,
    {
        match self.get(key) {
            None => Some(T::default()),
            Some(Value::String(s)) if s.is_empty() => Some(T::default()),
            Some(Value::String(s)) => match s.parse() {
                Ok(value) => Some(value),
                Err(problem) => self.fail(key, problem),
            },
            Some(_) => self.fail(key, Problem::WrongType("string")),
        }
    }
}
