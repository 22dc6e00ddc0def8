use std::sync::Arc;

use tokio::time::{self, Instant};

use crate::config::PortonConfig;
use crate::extract::{bearer_token, SubjectExtractor, UnionExtractor};
use crate::logs::{Logger, NoopLogger};
use crate::request::RequestView;
use crate::response::HttpResponseError;

use super::client::{ClientFactory, HttpClientFactory};
use super::{AuthzError, CheckError};

/// Runs one authorization decision per request: token check, subject
/// extraction, then a single timed call to the permissions service.
///
/// The pipeline holds no per-request state and is shared by every in-flight
/// request.
pub struct DecisionPipeline {
    cfg: Arc<PortonConfig>,
    extractor: UnionExtractor,
    factory: Arc<dyn ClientFactory>,
    logger: Arc<dyn Logger>,
}

impl DecisionPipeline {
    pub fn new(cfg: PortonConfig) -> Self {
        let extractor = UnionExtractor::new(&cfg.scope);
        Self {
            cfg: Arc::new(cfg),
            extractor,
            factory: Arc::new(HttpClientFactory),
            logger: Arc::new(NoopLogger),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_client_factory(mut self, factory: Arc<dyn ClientFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn config(&self) -> &PortonConfig {
        &self.cfg
    }

    /// Returns the request untouched when it is allowed. Otherwise returns the
    /// outcome to render: 403 on a deny, 500 on any failure. Failures are only
    /// logged, never exposed.
    pub async fn check<R>(&self, req: R) -> Result<R, HttpResponseError>
    where
        R: RequestView,
    {
        self.logger
            .debug(format_args!("Checking {} {}", req.method(), req.path()));

        match self.decide(&req).await {
            Ok(true) => Ok(req),
            Ok(false) => {
                self.logger.info(format_args!(
                    "Request {} {} is not allowed to {}",
                    req.method(),
                    req.path(),
                    self.cfg.action
                ));
                Err(HttpResponseError::not_allowed())
            }
            Err(err) => {
                self.logger.error(format_args!(
                    "Failed to check {} {}: {err}",
                    req.method(),
                    req.path()
                ));
                Err(HttpResponseError::request_error())
            }
        }
    }

    /// The raw verdict, with the failure reason kept.
    pub async fn decide<R>(&self, req: &R) -> Result<bool, AuthzError>
    where
        R: RequestView + ?Sized,
    {
        let timeout = self.cfg.authz_service.timeout();
        let deadline = Instant::now() + timeout;

        let token = bearer_token(req)?;
        let subject = self.extractor.extract(req, self.logger.as_ref())?;

        let remaining = deadline.saturating_duration_since(Instant::now());
        let client = self
            .factory
            .build(&self.cfg.authz_service.endpoint, token, remaining)
            .map_err(AuthzError::CreatingAuthzClient)?;

        self.logger.debug(format_args!(
            "Asking permissions service whether '{}' is allowed on '{subject}'",
            self.cfg.action
        ));
        match time::timeout_at(deadline, client.allowed(&self.cfg.action, &subject)).await {
            Ok(result) => result.map_err(AuthzError::CheckingPermissions),
            Err(_) => Err(AuthzError::CheckingPermissions(CheckError::Timeout(
                timeout,
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use log::Level;
    use reqwest::Url;

    use crate::authz::PermissionsClient;
    use crate::config::{AuthzService, Scope, TenantSource};
    use crate::logs::MemoryLogger;
    use crate::request::GatewayRequest;

    use super::*;

    const ID: &str = "3f3f3f3f-3f3f-4f3f-8f3f-3f3f3f3f3f3f";

    #[derive(Clone, Copy)]
    enum Verdict {
        Allow,
        Deny,
        Fail,
        Hang,
    }

    struct StubFactory {
        verdict: Verdict,
        refuse_build: bool,
        builds: AtomicUsize,
        calls: Arc<Mutex<Vec<(String, String, String)>>>,
        finished: Arc<AtomicBool>,
    }

    impl StubFactory {
        fn new(verdict: Verdict) -> Arc<Self> {
            Arc::new(Self {
                verdict,
                refuse_build: false,
                builds: AtomicUsize::new(0),
                calls: Arc::new(Mutex::new(Vec::new())),
                finished: Arc::new(AtomicBool::new(false)),
            })
        }

        fn refusing() -> Arc<Self> {
            Arc::new(Self {
                verdict: Verdict::Allow,
                refuse_build: true,
                builds: AtomicUsize::new(0),
                calls: Arc::new(Mutex::new(Vec::new())),
                finished: Arc::new(AtomicBool::new(false)),
            })
        }

        fn builds(&self) -> usize {
            self.builds.load(Ordering::SeqCst)
        }

        fn calls(&self) -> Vec<(String, String, String)> {
            self.calls.lock().unwrap().clone()
        }

        /// Whether any remote call ran to completion.
        fn finished(&self) -> bool {
            self.finished.load(Ordering::SeqCst)
        }
    }

    impl ClientFactory for StubFactory {
        fn build(
            &self,
            _endpoint: &Url,
            token: &str,
            _timeout: Duration,
        ) -> Result<Box<dyn PermissionsClient>, CheckError> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            if self.refuse_build {
                return Err(CheckError::InvalidToken);
            }
            Ok(Box::new(StubClient {
                verdict: self.verdict,
                token: token.to_string(),
                calls: self.calls.clone(),
                finished: self.finished.clone(),
            }))
        }
    }

    struct StubClient {
        verdict: Verdict,
        token: String,
        calls: Arc<Mutex<Vec<(String, String, String)>>>,
        finished: Arc<AtomicBool>,
    }

    #[async_trait]
    impl PermissionsClient for StubClient {
        async fn allowed(&self, action: &str, subject: &str) -> Result<bool, CheckError> {
            self.calls.lock().unwrap().push((
                self.token.clone(),
                action.to_string(),
                subject.to_string(),
            ));
            let result = match self.verdict {
                Verdict::Allow => Ok(true),
                Verdict::Deny => Ok(false),
                Verdict::Fail => Err(CheckError::Status {
                    status: 502,
                    body: "upstream exploded".to_string(),
                }),
                Verdict::Hang => {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    Ok(true)
                }
            };
            self.finished.store(true, Ordering::SeqCst);
            result
        }
    }

    fn resource_config(timeout_millis: u64) -> PortonConfig {
        PortonConfig {
            authz_service: AuthzService {
                endpoint: Url::parse("http://authz").unwrap(),
                timeout_millis,
            },
            action: "read".to_string(),
            scope: Scope::Resource {
                resource_type: "widget".to_string(),
                resource_param: "id".to_string(),
            },
        }
    }

    fn tenant_config(source: TenantSource) -> PortonConfig {
        PortonConfig {
            scope: Scope::Tenant { source },
            ..resource_config(1000)
        }
    }

    fn widget_request(token: Option<&str>, id: &str) -> GatewayRequest {
        let url = Url::parse(&format!("http://gateway/v1/widgets/{id}")).unwrap();
        let mut builder = GatewayRequest::builder("GET", url)
            .param("id", id)
            .header("Content-Type", "application/json")
            .body("{\"name\":\"w\"}");
        if let Some(token) = token {
            builder = builder.header("Authorization", token);
        }
        builder.build()
    }

    #[tokio::test]
    async fn test_allowed_passes_request_through() {
        let factory = StubFactory::new(Verdict::Allow);
        let pipeline = DecisionPipeline::new(resource_config(1000)).with_client_factory(factory.clone());

        let req = widget_request(Some("Bearer abc"), ID);
        let out = pipeline.check(req.clone()).await.unwrap();

        assert_eq!(out.method(), req.method());
        assert_eq!(out.url(), req.url());
        assert_eq!(out.headers(), req.headers());
        assert_eq!(out.params(), req.params());
        assert_eq!(out.body(), req.body());

        assert_eq!(
            factory.calls(),
            vec![(
                "Bearer abc".to_string(),
                "read".to_string(),
                format!("urn:infratrographer:widget:{ID}"),
            )]
        );
    }

    #[tokio::test]
    async fn test_denied() {
        let factory = StubFactory::new(Verdict::Deny);
        let logger = Arc::new(MemoryLogger::new());
        let pipeline = DecisionPipeline::new(resource_config(1000))
            .with_client_factory(factory.clone())
            .with_logger(logger.clone());

        let err = pipeline
            .check(widget_request(Some("Bearer abc"), ID))
            .await
            .unwrap_err();
        assert_eq!(err, HttpResponseError::not_allowed());
        assert!(logger.contains(Level::Info, "is not allowed to read"));
        assert_eq!(factory.builds(), 1);
    }

    #[tokio::test]
    async fn test_remote_error_only_logged() {
        let factory = StubFactory::new(Verdict::Fail);
        let logger = Arc::new(MemoryLogger::new());
        let pipeline = DecisionPipeline::new(resource_config(1000))
            .with_client_factory(factory)
            .with_logger(logger.clone());

        let err = pipeline
            .check(widget_request(Some("Bearer abc"), ID))
            .await
            .unwrap_err();
        assert_eq!(err, HttpResponseError::request_error());
        assert!(!err.message.contains("exploded"));
        assert!(logger.contains(Level::Error, "upstream exploded"));
    }

    #[tokio::test]
    async fn test_no_token() {
        let factory = StubFactory::new(Verdict::Allow);
        let pipeline = DecisionPipeline::new(resource_config(1000)).with_client_factory(factory.clone());

        for token in [None, Some("")] {
            // Invalid id too, the token check has to win
            let req = widget_request(token, "not-a-uuid");
            let err = pipeline.decide(&req).await.unwrap_err();
            assert!(matches!(err, AuthzError::NoValidToken), "token {token:?}");

            let err = pipeline.check(req).await.unwrap_err();
            assert_eq!(err, HttpResponseError::request_error());
        }
        assert_eq!(factory.builds(), 0);
    }

    #[tokio::test]
    async fn test_invalid_uuid_no_remote_call() {
        let factory = StubFactory::new(Verdict::Allow);
        let pipeline = DecisionPipeline::new(resource_config(1000)).with_client_factory(factory.clone());

        let req = widget_request(Some("Bearer abc"), "not-a-uuid");
        let err = pipeline.decide(&req).await.unwrap_err();
        assert!(matches!(err, AuthzError::InvalidResourceUUID { .. }));
        assert_eq!(factory.builds(), 0);
        assert!(factory.calls().is_empty());
    }

    #[tokio::test]
    async fn test_client_construction_error() {
        let factory = StubFactory::refusing();
        let pipeline = DecisionPipeline::new(resource_config(1000)).with_client_factory(factory.clone());

        let err = pipeline
            .decide(&widget_request(Some("Bearer abc"), ID))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::CreatingAuthzClient(_)));
        assert_eq!(factory.builds(), 1);
    }

    #[tokio::test]
    async fn test_timeout() {
        let factory = StubFactory::new(Verdict::Hang);
        let pipeline = DecisionPipeline::new(resource_config(50)).with_client_factory(factory);

        let start = Instant::now();
        let err = pipeline
            .decide(&widget_request(Some("Bearer abc"), ID))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuthzError::CheckingPermissions(CheckError::Timeout(t)) if t == Duration::from_millis(50)
        ));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_dropped_decision_aborts_call() {
        let factory = StubFactory::new(Verdict::Hang);
        let pipeline = DecisionPipeline::new(resource_config(10_000)).with_client_factory(factory.clone());
        let req = widget_request(Some("Bearer abc"), ID);

        // The host gives up long before the pipeline's own deadline
        let dropped = time::timeout(Duration::from_millis(50), pipeline.decide(&req)).await;
        assert!(dropped.is_err());
        assert_eq!(factory.calls().len(), 1);

        // Give an orphaned call more than enough time to finish
        time::sleep(Duration::from_millis(800)).await;
        assert!(!factory.finished());
    }

    #[tokio::test]
    async fn test_idempotent() {
        for (verdict, expect) in [(Verdict::Allow, true), (Verdict::Deny, false)] {
            let factory = StubFactory::new(verdict);
            let pipeline =
                DecisionPipeline::new(resource_config(1000)).with_client_factory(factory.clone());
            let req = widget_request(Some("Bearer abc"), ID);
            for _ in 0..5 {
                assert_eq!(pipeline.decide(&req).await.unwrap(), expect);
            }
            assert_eq!(factory.builds(), 5);
        }
    }

    #[tokio::test]
    async fn test_tenant_variant() {
        let factory = StubFactory::new(Verdict::Allow);
        let pipeline = DecisionPipeline::new(tenant_config(TenantSource::Path))
            .with_client_factory(factory.clone());

        let req = GatewayRequest::builder(
            "POST",
            Url::parse("http://gateway/v1/tenants/abc123/widgets").unwrap(),
        )
        .header("Authorization", "Bearer t")
        .build();
        assert!(pipeline.check(req).await.is_ok());

        let req = GatewayRequest::builder("GET", Url::parse("http://gateway/v1/widgets").unwrap())
            .header("Authorization", "Bearer t")
            .build();
        let err = pipeline.decide(&req).await.unwrap_err();
        assert!(matches!(err, AuthzError::NoValidTenant));

        let calls = factory.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].2, "abc123");

        let factory = StubFactory::new(Verdict::Deny);
        let pipeline = DecisionPipeline::new(tenant_config(TenantSource::Header))
            .with_client_factory(factory.clone());
        let req = GatewayRequest::builder("GET", Url::parse("http://gateway/v1/widgets").unwrap())
            .header("Authorization", "Bearer t")
            .header("X-Tenant-Id", "abc123")
            .build();
        assert_eq!(
            pipeline.check(req).await.unwrap_err(),
            HttpResponseError::not_allowed()
        );
        assert_eq!(factory.calls()[0].2, "abc123");
    }
}
