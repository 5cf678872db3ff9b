//! Per-request orchestration.
//!
//! # Responsibilities
//! - Compile declared routes into the route table at startup
//! - Run each request through early middleware, match, middleware, auth,
//!   rate check, binding, invocation and rendering
//! - Emit the audit event of audited routes once the status is known
//! - Turn every failure into the JSON error envelope
//!
//! # Design Decisions
//! - Everything shared is built once by `DispatcherBuilder` and only read
//!   while serving; the rate limiter and upload registry are the only
//!   mutable state, and both are concurrent maps
//! - Listener-agnostic: input is a `RequestContext`, output an HTTP response

use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use crate::auth::{AuthResolver, Authenticator};
use crate::binding::{
    BindInput, FormData, ParamSource, ParameterBinder, ParameterHandler, UploadRegistry,
};
use crate::clock::{Clock, SystemClock};
use crate::dispatch::{ConfigurationError, DispatchError, Flow, Middleware, Phase};
use crate::http::{Reply, RequestContext, ResponseEntity, ResponseHandle};
use crate::observability::{metrics, AuditEvent};
use crate::routing::{PathParams, PathPattern, RouteDescriptor, RouteMatch, RouteSpec, RouteTable};
use crate::security::{
    authorize, AccessRequirements, RateKey, RateLimitPolicy, RateLimiter, RoleGraph,
};

/// Pipeline stage, for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStage {
    Matching,
    Middleware,
    Authenticating,
    Authorizing,
    RateCheck,
    Binding,
    Invoking,
    Responding,
}

impl fmt::Display for DispatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DispatchStage::Matching => "matching",
            DispatchStage::Middleware => "middleware",
            DispatchStage::Authenticating => "authenticating",
            DispatchStage::Authorizing => "authorizing",
            DispatchStage::RateCheck => "rate_check",
            DispatchStage::Binding => "binding",
            DispatchStage::Invoking => "invoking",
            DispatchStage::Responding => "responding",
        };
        f.write_str(name)
    }
}

type StageError = (DispatchStage, DispatchError);

fn at(stage: DispatchStage) -> impl FnOnce(DispatchError) -> StageError {
    move |err| (stage, err)
}

const UNMATCHED: &str = "unmatched";

/// Assembles a [`Dispatcher`].
pub struct DispatcherBuilder {
    routes: Vec<RouteSpec>,
    middleware: Vec<Arc<dyn Middleware>>,
    auth: AuthResolver,
    roles: RoleGraph,
    limiter: Option<Arc<RateLimiter>>,
    uploads: Option<Arc<UploadRegistry>>,
    parameter_handlers: Vec<Arc<dyn ParameterHandler>>,
    strict_duplicates: bool,
    clock: Arc<dyn Clock>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            middleware: Vec::new(),
            auth: AuthResolver::new(),
            roles: RoleGraph::default(),
            limiter: None,
            uploads: None,
            parameter_handlers: Vec::new(),
            strict_duplicates: false,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn route(mut self, route: RouteSpec) -> Self {
        self.routes.push(route);
        self
    }

    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.auth.register(authenticator);
        self
    }

    pub fn roles(mut self, roles: RoleGraph) -> Self {
        self.roles = roles;
        self
    }

    pub fn rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn uploads(mut self, uploads: Arc<UploadRegistry>) -> Self {
        self.uploads = Some(uploads);
        self
    }

    /// Add a parameter handler after the built-in ones.
    pub fn parameter_handler(mut self, handler: Arc<dyn ParameterHandler>) -> Self {
        self.parameter_handlers.push(handler);
        self
    }

    pub fn strict_duplicates(mut self, strict: bool) -> Self {
        self.strict_duplicates = strict;
        self
    }

    /// Clock for the default rate limiter and upload registry.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Compile every route. Any declaration problem aborts the build.
    pub fn build(self) -> Result<Dispatcher, ConfigurationError> {
        let uploads = self
            .uploads
            .unwrap_or_else(|| Arc::new(UploadRegistry::new(Arc::clone(&self.clock))));
        let limiter = self
            .limiter
            .unwrap_or_else(|| Arc::new(RateLimiter::new(Arc::clone(&self.clock))));

        let mut binder = ParameterBinder::with_defaults(Arc::clone(&uploads));
        for handler in self.parameter_handlers {
            binder.register(handler);
        }

        let mut table = RouteTable::new(self.strict_duplicates);
        for spec in self.routes {
            let descriptor = compile_route(spec, &binder, &self.roles)?;
            table.register(descriptor)?;
        }

        let mut middleware = self.middleware;
        middleware.sort_by_key(|m| m.priority());
        let (received, matched): (Vec<_>, Vec<_>) =
            middleware.into_iter().partition(|m| m.phase() == Phase::Received);

        tracing::info!(
            routes = table.len(),
            middleware = received.len() + matched.len(),
            schemes = ?self.auth.schemes(),
            roles = self.roles.len(),
            "Dispatcher ready"
        );

        Ok(Dispatcher {
            routes: table,
            received,
            matched,
            auth: self.auth,
            roles: self.roles,
            limiter,
            binder,
            uploads,
        })
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn compile_route(
    spec: RouteSpec,
    binder: &ParameterBinder,
    roles: &RoleGraph,
) -> Result<RouteDescriptor, ConfigurationError> {
    let label = spec.label();
    let pattern = PathPattern::compile(&spec.template)?;
    let plan = binder.plan(&label, &pattern, &spec.params)?;

    if let Some(role) = spec.roles.iter().find(|r| !roles.has_role(r)) {
        return Err(ConfigurationError::Roles(format!(
            "route {} requires unknown role `{}`",
            label, role
        )));
    }

    let access = AccessRequirements {
        roles: spec.roles,
        permissions: spec.permissions,
        identity: spec
            .params
            .iter()
            .any(|p| p.required && matches!(p.source, ParamSource::Identity)),
    };

    Ok(RouteDescriptor {
        id: Arc::from(label),
        method: spec.method,
        pattern,
        handler: spec.handler,
        params: spec.params,
        access,
        auth_schemes: spec.auth_schemes,
        rate_limit: spec.rate_limit,
        audit: spec.audit,
        plan,
    })
}

/// The request pipeline.
pub struct Dispatcher {
    routes: RouteTable,
    received: Vec<Arc<dyn Middleware>>,
    matched: Vec<Arc<dyn Middleware>>,
    auth: AuthResolver,
    roles: RoleGraph,
    limiter: Arc<RateLimiter>,
    binder: ParameterBinder,
    uploads: Arc<UploadRegistry>,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn roles(&self) -> &RoleGraph {
        &self.roles
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn uploads(&self) -> &Arc<UploadRegistry> {
        &self.uploads
    }

    /// Handle one request end to end. Never fails; errors become envelopes.
    pub async fn dispatch(&self, request: RequestContext) -> Response {
        let start = Instant::now();
        let method = request.method.clone();
        let path = request.path().to_string();
        let request_id = request.request_id.clone();
        let client_ip = request.client_ip.clone();

        let (route, entity) = match AssertUnwindSafe(self.run(request)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::error!(request_id = %request_id, path = %path, "Handler panicked");
                let err = DispatchError::internal("handler panicked");
                (Arc::from(UNMATCHED), ResponseEntity::error(&path, &err))
            }
        };

        let status = entity.status.as_u16();
        metrics::record_request(method.as_str(), &route, status, start);
        tracing::info!(
            request_id = %request_id,
            client_ip = %client_ip,
            method = %method,
            path = %path,
            route = %route,
            status,
            latency_ms = start.elapsed().as_millis() as u64,
            "Request dispatched"
        );

        entity.into_response()
    }

    async fn run(&self, mut request: RequestContext) -> (Arc<str>, ResponseEntity) {
        if let Some(entity) = run_middleware(&self.received, &mut request) {
            return (Arc::from(UNMATCHED), entity);
        }

        let path = request.path().to_string();

        let (route, captures) = match self.routes.lookup(&request.method, &path) {
            RouteMatch::Found { route, params } => (Arc::clone(route), params),
            RouteMatch::MethodNotAllowed(allowed) => {
                let err = DispatchError::MethodNotAllowed { allowed };
                return (Arc::from(UNMATCHED), self.fail(&request, DispatchStage::Matching, err));
            }
            RouteMatch::NotFound => {
                let err = DispatchError::not_found(format!("No handler found for path: {}", path));
                return (Arc::from(UNMATCHED), self.fail(&request, DispatchStage::Matching, err));
            }
        };

        tracing::debug!(request_id = %request.request_id, route = %route.id, "Route matched");

        if let Some(entity) = run_middleware(&self.matched, &mut request) {
            return (Arc::clone(&route.id), entity);
        }

        if route.authenticates() {
            request.principal = self.auth.resolve(&request, route.auth_schemes.as_deref());
            tracing::debug!(
                request_id = %request.request_id,
                subject = ?request.subject(),
                "Authentication resolved"
            );
        }

        let audit = route
            .audit
            .as_ref()
            .map(|policy| AuditEvent::capture(policy, &route.id, &request, &captures));

        let request_id = request.request_id.clone();
        let client_ip = request.client_ip.clone();
        let outcome = AssertUnwindSafe(self.guarded(request, &route, captures))
            .catch_unwind()
            .await;
        let entity = match outcome {
            Ok(Ok(entity)) => entity,
            Ok(Err((stage, err))) => {
                log_failure(&request_id, &client_ip, &route.id, stage, &err);
                ResponseEntity::error(&path, &err)
            }
            Err(_) => {
                tracing::error!(request_id = %request_id, route = %route.id, "Handler panicked");
                ResponseEntity::error(&path, &DispatchError::internal("handler panicked"))
            }
        };

        if let Some(event) = audit {
            event.emit(entity.status);
        }
        (Arc::clone(&route.id), entity)
    }

    /// Authorization through rendering for a matched route.
    async fn guarded(
        &self,
        request: RequestContext,
        route: &RouteDescriptor,
        captures: PathParams,
    ) -> Result<ResponseEntity, StageError> {
        authorize(&route.access, request.principal.as_ref(), &self.roles)
            .map_err(at(DispatchStage::Authorizing))?;

        let rate_key = match &route.rate_limit {
            Some(policy) => {
                let key = rate_key(&request, route, policy);
                if let Err(err) = self.limiter.attempt(&key, policy) {
                    metrics::record_rate_limited(&route.id);
                    return Err((DispatchStage::RateCheck, err));
                }
                Some(key)
            }
            None => None,
        };

        let path = request.path().to_string();
        let request = Arc::new(request);
        let response = ResponseHandle::new();

        let form = if route.plan.needs_form() {
            FormData::parse(&request).await.map_err(at(DispatchStage::Binding))?
        } else {
            None
        };
        let args = self
            .binder
            .bind(
                &route.plan,
                &route.params,
                &BindInput {
                    request: &request,
                    response: &response,
                    path: &captures,
                    form: form.as_ref(),
                },
            )
            .map_err(at(DispatchStage::Binding))?;

        let reply = route
            .handler
            .call(args)
            .await
            .map_err(at(DispatchStage::Invoking))?;

        let honour_status = !matches!(reply, Reply::Entity(_));
        let mut entity = reply.into_entity(&path);
        response.apply(&mut entity, honour_status);

        if entity.status.is_success() {
            if let Some(key) = rate_key {
                self.limiter.reset(&key);
            }
        }
        Ok(entity)
    }

    fn fail(&self, request: &RequestContext, stage: DispatchStage, err: DispatchError) -> ResponseEntity {
        log_failure(&request.request_id, &request.client_ip, UNMATCHED, stage, &err);
        ResponseEntity::error(request.path(), &err)
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.routes.len())
            .field("received", &self.received.iter().map(|m| m.name()).collect::<Vec<_>>())
            .field("matched", &self.matched.iter().map(|m| m.name()).collect::<Vec<_>>())
            .field("auth", &self.auth)
            .field("binder", &self.binder)
            .finish_non_exhaustive()
    }
}

/// Run one middleware phase; `Some` when a middleware answered.
fn run_middleware(chain: &[Arc<dyn Middleware>], request: &mut RequestContext) -> Option<ResponseEntity> {
    for middleware in chain {
        if let Flow::Stop(entity) = middleware.handle(request) {
            tracing::debug!(
                request_id = %request.request_id,
                middleware = middleware.name(),
                status = entity.status.as_u16(),
                "Middleware answered the request"
            );
            return Some(entity);
        }
    }
    None
}

fn rate_key(request: &RequestContext, route: &RouteDescriptor, policy: &RateLimitPolicy) -> RateKey {
    RateKey::new(policy.key.caller(request), Arc::clone(&route.id))
}

fn log_failure(request_id: &str, client_ip: &str, route: &str, stage: DispatchStage, err: &DispatchError) {
    match err {
        DispatchError::Internal(source) => tracing::error!(
            request_id = %request_id,
            client_ip = %client_ip,
            route = %route,
            stage = %stage,
            error = %source,
            "Request failed"
        ),
        other => tracing::debug!(
            request_id = %request_id,
            client_ip = %client_ip,
            route = %route,
            stage = %stage,
            kind = other.kind(),
            message = %other,
            "Request rejected"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthScheme, Identity, Principal};
    use crate::binding::{Arguments, ParamType, ParameterDescriptor};
    use crate::clock::ManualClock;
    use crate::security::RoleDefinition;
    use axum::body::to_bytes;
    use axum::http::{Method, StatusCode};
    use chrono::Duration;

    /// Accepts `Authorization: Test <user-id>:<role>`.
    struct TestAuth;

    impl Authenticator for TestAuth {
        fn scheme(&self) -> AuthScheme {
            AuthScheme::Custom("test")
        }

        fn authenticate(&self, request: &RequestContext) -> Option<Principal> {
            let (id, role) = request.header("authorization")?.strip_prefix("Test ")?.split_once(':')?;
            Some(Principal::resolved(Identity::new(id, id, role), self.scheme()))
        }
    }

    struct Teapot;

    impl Middleware for Teapot {
        fn name(&self) -> &'static str {
            "teapot"
        }

        fn handle(&self, request: &mut RequestContext) -> Flow {
            if request.path() == "/teapot" {
                Flow::Stop(ResponseEntity::new(StatusCode::IM_A_TEAPOT))
            } else {
                Flow::Continue
            }
        }
    }

    /// Blocks any request carrying `x-blocked`, matched or not.
    struct Gate;

    impl Middleware for Gate {
        fn name(&self) -> &'static str {
            "gate"
        }

        fn phase(&self) -> Phase {
            Phase::Received
        }

        fn handle(&self, request: &mut RequestContext) -> Flow {
            if request.header("x-blocked").is_some() {
                Flow::Stop(ResponseEntity::new(StatusCode::URI_TOO_LONG))
            } else {
                Flow::Continue
            }
        }
    }

    async fn hello(_args: Arguments) -> Result<Reply, DispatchError> {
        Ok(Reply::text("hello"))
    }

    async fn echo_id(args: Arguments) -> Result<Reply, DispatchError> {
        Reply::json(&serde_json::json!({ "id": args.i64("id")? }))
    }

    async fn always_fails(_args: Arguments) -> Result<Reply, DispatchError> {
        Err(DispatchError::bad_request("nope"))
    }

    async fn panics(_args: Arguments) -> Result<Reply, DispatchError> {
        panic!("boom")
    }

    fn roles() -> RoleGraph {
        let mut builder = RoleGraph::builder();
        builder
            .register(&RoleDefinition::new("user").permission("profile.read"))
            .register(&RoleDefinition::new("admin").permission("users.read").parent("user"));
        builder.build()
    }

    fn dispatcher(clock: Arc<ManualClock>) -> Dispatcher {
        Dispatcher::builder()
            .clock(clock)
            .roles(roles())
            .authenticator(Arc::new(TestAuth))
            .middleware(Arc::new(Teapot))
            .middleware(Arc::new(Gate))
            .route(RouteSpec::get("/hello", hello))
            .route(RouteSpec::get("/teapot", hello))
            .route(RouteSpec::get("/users/{id}", echo_id).param(ParameterDescriptor::path("id", ParamType::I64)))
            .route(RouteSpec::get("/admin", hello).require_role("admin"))
            .route(RouteSpec::get("/profile", hello).require_permission("profile.read"))
            .route(
                RouteSpec::post("/login", always_fails)
                    .rate_limit(RateLimitPolicy::new(2, Duration::minutes(15)).message("slow down")),
            )
            .route(RouteSpec::post("/ping", hello).rate_limit(RateLimitPolicy::new(1, Duration::minutes(15))))
            .route(RouteSpec::get("/panic", panics))
            .route(RouteSpec::post("/audited", always_fails).audit("SIGN_IN"))
            .build()
            .unwrap()
    }

    async fn send(dispatcher: &Dispatcher, method: Method, uri: &str, auth: Option<&str>) -> (StatusCode, serde_json::Value) {
        let mut builder = RequestContext::builder(method, uri).client_ip("10.0.0.1");
        if let Some(auth) = auth {
            builder = builder.header("authorization", auth);
        }
        let response = dispatcher.dispatch(builder.build()).await;
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_match_and_envelopes() {
        let d = dispatcher(Arc::new(ManualClock::default()));

        let (status, body) = send(&d, Method::GET, "/hello", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "hello");
        assert_eq!(body["uri"], "/hello");

        let (status, body) = send(&d, Method::GET, "/users/42", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], 42);

        let (status, body) = send(&d, Method::GET, "/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], 404);

        let (status, _) = send(&d, Method::DELETE, "/hello", None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

        let (status, body) = send(&d, Method::GET, "/users/abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid parameter format for: id");
    }

    #[tokio::test]
    async fn test_middleware_can_stop_the_pipeline() {
        let d = dispatcher(Arc::new(ManualClock::default()));
        let (status, _) = send(&d, Method::GET, "/teapot", None).await;
        assert_eq!(status, StatusCode::IM_A_TEAPOT);
    }

    #[tokio::test]
    async fn test_authentication_before_authorization() {
        let d = dispatcher(Arc::new(ManualClock::default()));

        let (status, _) = send(&d, Method::GET, "/admin", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(&d, Method::GET, "/admin", Some("Test 7:user")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Insufficient role");

        let (status, _) = send(&d, Method::GET, "/admin", Some("Test 1:admin")).await;
        assert_eq!(status, StatusCode::OK);

        // Permissions follow the hierarchy, roles do not.
        let (status, _) = send(&d, Method::GET, "/profile", Some("Test 1:admin")).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&d, Method::GET, "/profile", Some("Test 9:ghost")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "No valid role");
    }

    #[tokio::test]
    async fn test_rate_limit_counts_failures_and_success_resets() {
        let clock = Arc::new(ManualClock::default());
        let d = dispatcher(clock.clone());

        assert_eq!(send(&d, Method::POST, "/login", None).await.0, StatusCode::BAD_REQUEST);
        assert_eq!(send(&d, Method::POST, "/login", None).await.0, StatusCode::BAD_REQUEST);
        let (status, body) = send(&d, Method::POST, "/login", None).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["message"], "slow down");

        clock.advance(Duration::minutes(16));
        assert_eq!(send(&d, Method::POST, "/login", None).await.0, StatusCode::BAD_REQUEST);

        // Success clears the window, so a max of one never trips.
        for _ in 0..3 {
            assert_eq!(send(&d, Method::POST, "/ping", None).await.0, StatusCode::OK);
        }
        assert!(d.rate_limiter().attempts(&RateKey::new("10.0.0.1", Arc::from("POST /ping"))).is_none());
    }

    #[tokio::test]
    async fn test_panic_becomes_generic_500() {
        let d = dispatcher(Arc::new(ManualClock::default()));
        let (status, body) = send(&d, Method::GET, "/panic", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");
    }

    #[tokio::test]
    async fn test_panic_keeps_route_label() {
        let d = dispatcher(Arc::new(ManualClock::default()));
        let request = RequestContext::builder(Method::GET, "/panic").build();
        let (route, entity) = d.run(request).await;
        assert_eq!(&*route, "GET /panic");
        assert_eq!(entity.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_received_middleware_runs_before_matching() {
        let d = dispatcher(Arc::new(ManualClock::default()));
        let request = RequestContext::builder(Method::GET, "/nowhere")
            .header("x-blocked", "1")
            .build();
        let (route, entity) = d.run(request).await;
        assert_eq!(&*route, UNMATCHED);
        assert_eq!(entity.status, StatusCode::URI_TOO_LONG);

        // Matched-phase middleware still sees only routed requests.
        let (status, _) = send(&d, Method::GET, "/nowhere", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_audited_route_emits_event_after_response() {
        let (captured, _guard) = crate::observability::audit::capture::install();
        let d = dispatcher(Arc::new(ManualClock::default()));

        let request = RequestContext::builder(Method::POST, "/audited")
            .client_ip("10.0.0.1")
            .header("authorization", "Test 7:user")
            .body(r#"{"value":"alice","secret":"s3cr3t-value"}"#)
            .build();
        let response = d.dispatch(request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let _ = send(&d, Method::GET, "/hello", None).await;

        let events = captured.events();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event["action"], "SIGN_IN");
        assert_eq!(event["outcome"], "failure");
        assert_eq!(event["status"], "400");
        assert_eq!(event["route"], "POST /audited");
        assert_eq!(event["subject"], "7");
        assert!(event["parameters"].contains(r#""secret":"****""#));
        assert!(event["parameters"].contains(r#""value":"al****ce""#));
        assert!(!event["parameters"].contains("s3cr3t"));
    }

    #[test]
    fn test_build_rejects_bad_declarations() {
        let unknown_role = Dispatcher::builder()
            .route(RouteSpec::get("/x", hello).require_role("wizard"))
            .build();
        assert!(matches!(unknown_role, Err(ConfigurationError::Roles(_))));

        let strict = Dispatcher::builder()
            .strict_duplicates(true)
            .route(RouteSpec::get("/x", hello))
            .route(RouteSpec::get("/x", hello))
            .build();
        assert!(matches!(strict, Err(ConfigurationError::DuplicateRoute { .. })));

        let lenient = Dispatcher::builder()
            .route(RouteSpec::get("/x", hello))
            .route(RouteSpec::get("/x", hello))
            .build()
            .unwrap();
        assert_eq!(lenient.routes().len(), 1);

        let custom = Dispatcher::builder()
            .route(RouteSpec::get("/x", hello).param(ParameterDescriptor::custom("t", "tenant", ParamType::Str)))
            .build();
        assert!(matches!(custom, Err(ConfigurationError::UnhandledParameter { .. })));
    }

    #[test]
    fn test_identity_parameter_makes_route_authenticated() {
        async fn me(args: Arguments) -> Result<Reply, DispatchError> {
            Reply::json(args.identity()?)
        }
        let d = Dispatcher::builder()
            .route(RouteSpec::get("/me", me).param(ParameterDescriptor::identity("me")))
            .build()
            .unwrap();
        let route = d.routes().iter().next().unwrap();
        assert!(route.access.identity);
        assert!(route.authenticates());
    }
}
