//! Parameter handler chain.
//!
//! # Responsibilities
//! - Assign every declared parameter to exactly one handler at startup
//! - Resolve arguments per request using the precomputed assignment
//!
//! # Data Flow
//! ```text
//! RouteSpec params ──plan()──► BindingPlan (handler index per param)
//!
//! request + captures + form ──bind()──► Arguments
//! ```
//!
//! # Design Decisions
//! - Claims are checked once at build time; a parameter claimed by zero or by
//!   several handlers is a `ConfigurationError`
//! - Path and query values share one conversion and constraint path
//! - Constraint failures across parameters are reported together

use std::fmt;
use std::sync::Arc;

use crate::binding::args::{ArgValue, Arguments};
use crate::binding::convert::{convert, numeric};
use crate::binding::descriptor::{ParamSource, ParamType, ParameterDescriptor};
use crate::binding::upload::{check_part, ChunkInfo, FormData, UploadOutcome, UploadRegistry, UploadedFile};
use crate::dispatch::{ConfigurationError, DispatchError};
use crate::http::{RequestContext, ResponseHandle};
use crate::routing::pattern::{PathParams, PathPattern};

/// Everything a handler may read while resolving one parameter.
#[derive(Debug, Clone, Copy)]
pub struct BindInput<'a> {
    pub request: &'a Arc<RequestContext>,
    pub response: &'a ResponseHandle,
    pub path: &'a PathParams,
    pub form: Option<&'a FormData>,
}

/// Resolves one kind of handler parameter.
pub trait ParameterHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn can_handle(&self, param: &ParameterDescriptor) -> bool;

    /// Build-time check of a claimed parameter.
    fn check(&self, _param: &ParameterDescriptor, _pattern: &PathPattern) -> Result<(), String> {
        Ok(())
    }

    /// Whether this handler reads form fields or file parts.
    fn needs_form(&self) -> bool {
        false
    }

    fn resolve(&self, param: &ParameterDescriptor, input: &BindInput<'_>) -> Result<ArgValue, DispatchError>;
}

fn require_scalar(param: &ParameterDescriptor) -> Result<(), String> {
    if param.ty.is_scalar() {
        Ok(())
    } else {
        Err(format!("{} values must be string, int64, float64 or bool, not {}", param.source.label(), param.ty.label()))
    }
}

/// Shared conversion and constraint check for path and query values.
fn resolve_scalar(param: &ParameterDescriptor, raw: Option<String>) -> Result<ArgValue, DispatchError> {
    let raw = raw.or_else(|| param.default.clone());

    let value = match raw.as_deref() {
        Some(raw) => convert(&param.name, raw, &param.ty)?,
        None if param.required => {
            return Err(DispatchError::bad_request(format!(
                "Missing required parameter: {}",
                param.name
            )))
        }
        None => ArgValue::Missing,
    };

    let errors: Vec<String> = param
        .constraints
        .iter()
        .filter_map(|c| c.check(&param.name, raw.as_deref(), numeric(&value)).err())
        .collect();
    if errors.is_empty() {
        Ok(value)
    } else {
        Err(DispatchError::Validation(errors))
    }
}

#[derive(Debug, Default)]
pub struct PathVariableHandler;

impl ParameterHandler for PathVariableHandler {
    fn name(&self) -> &'static str {
        "path"
    }

    fn can_handle(&self, param: &ParameterDescriptor) -> bool {
        matches!(param.source, ParamSource::Path)
    }

    fn check(&self, param: &ParameterDescriptor, pattern: &PathPattern) -> Result<(), String> {
        if !pattern.has_variable(&param.name) {
            return Err(format!("template `{}` has no variable `{}`", pattern.template(), param.name));
        }
        require_scalar(param)
    }

    fn resolve(&self, param: &ParameterDescriptor, input: &BindInput<'_>) -> Result<ArgValue, DispatchError> {
        let raw = input
            .path
            .get(&param.name)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        resolve_scalar(param, raw)
    }
}

/// Query string first, then urlencoded or multipart text fields.
#[derive(Debug, Default)]
pub struct QueryHandler;

impl ParameterHandler for QueryHandler {
    fn name(&self) -> &'static str {
        "query"
    }

    fn can_handle(&self, param: &ParameterDescriptor) -> bool {
        matches!(param.source, ParamSource::Query)
    }

    fn check(&self, param: &ParameterDescriptor, _pattern: &PathPattern) -> Result<(), String> {
        require_scalar(param)
    }

    fn needs_form(&self) -> bool {
        true
    }

    fn resolve(&self, param: &ParameterDescriptor, input: &BindInput<'_>) -> Result<ArgValue, DispatchError> {
        let raw = input.request.query_param(&param.name).or_else(|| {
            input
                .form
                .and_then(|form| form.field(&param.name))
                .map(str::to_string)
        });
        resolve_scalar(param, raw)
    }
}

#[derive(Debug, Default)]
pub struct BodyHandler;

impl ParameterHandler for BodyHandler {
    fn name(&self) -> &'static str {
        "body"
    }

    fn can_handle(&self, param: &ParameterDescriptor) -> bool {
        matches!(param.source, ParamSource::Body)
    }

    fn check(&self, param: &ParameterDescriptor, _pattern: &PathPattern) -> Result<(), String> {
        match param.ty {
            ParamType::Json(_) => Ok(()),
            _ => Err(format!("body parameters need a JSON type, not {}", param.ty.label())),
        }
    }

    fn resolve(&self, param: &ParameterDescriptor, input: &BindInput<'_>) -> Result<ArgValue, DispatchError> {
        let ParamType::Json(decoder) = &param.ty else {
            return Err(DispatchError::internal(format!("body parameter `{}` lost its decoder", param.name)));
        };
        let body = &input.request.body;
        if body.is_empty() && !param.required {
            return Ok(ArgValue::Missing);
        }
        decoder.decode(body).map(ArgValue::Body)
    }
}

/// Raw request and response objects.
#[derive(Debug, Default)]
pub struct InjectedHandler;

impl ParameterHandler for InjectedHandler {
    fn name(&self) -> &'static str {
        "injected"
    }

    fn can_handle(&self, param: &ParameterDescriptor) -> bool {
        matches!(param.source, ParamSource::Injected)
    }

    fn check(&self, param: &ParameterDescriptor, _pattern: &PathPattern) -> Result<(), String> {
        match param.ty {
            ParamType::Request | ParamType::Response => Ok(()),
            _ => Err(format!("only request or response can be injected, not {}", param.ty.label())),
        }
    }

    fn resolve(&self, param: &ParameterDescriptor, input: &BindInput<'_>) -> Result<ArgValue, DispatchError> {
        match param.ty {
            ParamType::Response => Ok(ArgValue::Response(input.response.clone())),
            _ => Ok(ArgValue::Request(Arc::clone(input.request))),
        }
    }
}

/// The authenticated caller, loaded on first use.
#[derive(Debug, Default)]
pub struct IdentityHandler;

impl ParameterHandler for IdentityHandler {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn can_handle(&self, param: &ParameterDescriptor) -> bool {
        matches!(param.source, ParamSource::Identity)
    }

    fn check(&self, param: &ParameterDescriptor, _pattern: &PathPattern) -> Result<(), String> {
        match param.ty {
            ParamType::Identity => Ok(()),
            _ => Err(format!("type {} cannot hold the caller identity", param.ty.label())),
        }
    }

    fn resolve(&self, param: &ParameterDescriptor, input: &BindInput<'_>) -> Result<ArgValue, DispatchError> {
        let identity = input
            .request
            .principal
            .as_ref()
            .and_then(|principal| principal.identity())
            .cloned();
        match identity {
            Some(identity) => Ok(ArgValue::Identity(identity)),
            None if param.required => Err(DispatchError::Unauthenticated("Authentication required".into())),
            None => Ok(ArgValue::Missing),
        }
    }
}

/// Multipart file parts, single-shot or chunked.
#[derive(Debug)]
pub struct FileHandler {
    uploads: Arc<UploadRegistry>,
}

impl FileHandler {
    pub fn new(uploads: Arc<UploadRegistry>) -> Self {
        Self { uploads }
    }
}

impl ParameterHandler for FileHandler {
    fn name(&self) -> &'static str {
        "file"
    }

    fn can_handle(&self, param: &ParameterDescriptor) -> bool {
        matches!(param.source, ParamSource::File(_))
    }

    fn check(&self, param: &ParameterDescriptor, _pattern: &PathPattern) -> Result<(), String> {
        match param.ty {
            ParamType::Upload => Ok(()),
            _ => Err(format!("file parameters must be uploads, not {}", param.ty.label())),
        }
    }

    fn needs_form(&self) -> bool {
        true
    }

    fn resolve(&self, param: &ParameterDescriptor, input: &BindInput<'_>) -> Result<ArgValue, DispatchError> {
        let ParamSource::File(spec) = &param.source else {
            return Err(DispatchError::internal(format!("file parameter `{}` lost its spec", param.name)));
        };

        let part = input.form.and_then(|form| form.file(&param.name).map(|part| (form, part)));
        let Some((form, part)) = part else {
            if param.required {
                return Err(DispatchError::bad_request(format!("Missing required file: {}", param.name)));
            }
            return Ok(ArgValue::Missing);
        };

        match ChunkInfo::from_form(form)? {
            Some(_) if !spec.chunked => Err(DispatchError::bad_request(format!(
                "Chunked upload is not accepted for: {}",
                param.name
            ))),
            Some(chunk) => self
                .uploads
                .accept_chunk(&chunk, part, spec, input.request.subject())
                .map(ArgValue::Upload),
            None => {
                check_part(part, spec, part.data.len())?;
                Ok(ArgValue::Upload(UploadOutcome::Complete(UploadedFile {
                    file_name: part.file_name.clone(),
                    content_type: part.content_type.clone(),
                    data: part.data.clone(),
                    upload_id: None,
                })))
            }
        }
    }
}

/// Handler index per parameter, computed once per route.
#[derive(Debug, Clone, Default)]
pub struct BindingPlan {
    handlers: Vec<usize>,
    needs_form: bool,
}

impl BindingPlan {
    /// Whether the form body must be parsed before binding.
    pub fn needs_form(&self) -> bool {
        self.needs_form
    }
}

/// Ordered handler chain.
#[derive(Clone)]
pub struct ParameterBinder {
    handlers: Vec<Arc<dyn ParameterHandler>>,
}

impl ParameterBinder {
    /// An empty chain. Most callers want [`ParameterBinder::with_defaults`].
    pub fn empty() -> Self {
        Self { handlers: Vec::new() }
    }

    pub fn with_defaults(uploads: Arc<UploadRegistry>) -> Self {
        let mut binder = Self::empty();
        binder
            .register(Arc::new(InjectedHandler))
            .register(Arc::new(BodyHandler))
            .register(Arc::new(QueryHandler))
            .register(Arc::new(PathVariableHandler))
            .register(Arc::new(IdentityHandler))
            .register(Arc::new(FileHandler::new(uploads)));
        binder
    }

    pub fn register(&mut self, handler: Arc<dyn ParameterHandler>) -> &mut Self {
        self.handlers.push(handler);
        self
    }

    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Assign each parameter of `route` to its handler.
    pub fn plan(
        &self,
        route: &str,
        pattern: &PathPattern,
        params: &[ParameterDescriptor],
    ) -> Result<BindingPlan, ConfigurationError> {
        let mut plan = BindingPlan::default();

        for (i, param) in params.iter().enumerate() {
            let invalid = |reason: String| ConfigurationError::InvalidParameter {
                route: route.to_string(),
                param: param.name.clone(),
                reason,
            };

            if params[..i].iter().any(|p| p.name == param.name) {
                return Err(invalid("declared twice".to_string()));
            }

            let claims: Vec<usize> = self
                .handlers
                .iter()
                .enumerate()
                .filter(|(_, h)| h.can_handle(param))
                .map(|(index, _)| index)
                .collect();

            let index = match claims.as_slice() {
                [] => {
                    return Err(ConfigurationError::UnhandledParameter {
                        route: route.to_string(),
                        param: param.name.clone(),
                    })
                }
                [index] => *index,
                several => {
                    let handlers = several
                        .iter()
                        .map(|&index| self.handlers[index].name())
                        .collect::<Vec<_>>()
                        .join(", ");
                    return Err(ConfigurationError::AmbiguousParameter {
                        route: route.to_string(),
                        param: param.name.clone(),
                        handlers,
                    });
                }
            };

            let handler = &self.handlers[index];
            handler.check(param, pattern).map_err(invalid)?;
            plan.needs_form |= handler.needs_form();
            plan.handlers.push(index);
        }

        Ok(plan)
    }

    /// Resolve all arguments for one request.
    pub fn bind(
        &self,
        plan: &BindingPlan,
        params: &[ParameterDescriptor],
        input: &BindInput<'_>,
    ) -> Result<Arguments, DispatchError> {
        let mut args = Arguments::new();
        let mut invalid: Vec<String> = Vec::new();

        for (param, &index) in params.iter().zip(&plan.handlers) {
            let handler = self.handlers.get(index).ok_or_else(|| {
                DispatchError::internal(format!("binding plan points at missing handler {}", index))
            })?;
            match handler.resolve(param, input) {
                Ok(value) => args.push(param.name.clone(), value),
                Err(DispatchError::Validation(errors)) => invalid.extend(errors),
                Err(err) => return Err(err),
            }
        }

        if invalid.is_empty() {
            Ok(args)
        } else {
            Err(DispatchError::Validation(invalid))
        }
    }
}

impl fmt::Debug for ParameterBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterBinder")
            .field("handlers", &self.handler_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthScheme, Identity, Principal};
    use crate::binding::validate::Constraint;
    use crate::clock::ManualClock;
    use axum::http::{Method, StatusCode};

    fn binder() -> ParameterBinder {
        ParameterBinder::with_defaults(Arc::new(UploadRegistry::new(Arc::new(ManualClock::default()))))
    }

    fn pattern(template: &str) -> PathPattern {
        PathPattern::compile(template).unwrap()
    }

    fn bind(
        binder: &ParameterBinder,
        template: &str,
        params: &[ParameterDescriptor],
        request: RequestContext,
    ) -> Result<Arguments, DispatchError> {
        let pattern = pattern(template);
        let plan = binder.plan("test", &pattern, params).unwrap();
        let captures = pattern.matches(request.path()).unwrap();
        let request = Arc::new(request);
        let response = ResponseHandle::new();
        binder.bind(
            &plan,
            params,
            &BindInput {
                request: &request,
                response: &response,
                path: &captures,
                form: None,
            },
        )
    }

    /// Claims every query parameter, overlapping the built-in handler.
    struct GreedyQuery;

    impl ParameterHandler for GreedyQuery {
        fn name(&self) -> &'static str {
            "greedy"
        }

        fn can_handle(&self, param: &ParameterDescriptor) -> bool {
            matches!(param.source, ParamSource::Query)
        }

        fn resolve(&self, _param: &ParameterDescriptor, _input: &BindInput<'_>) -> Result<ArgValue, DispatchError> {
            Ok(ArgValue::Missing)
        }
    }

    #[test]
    fn test_path_and_query_conversion() {
        let params = [
            ParameterDescriptor::path("id", ParamType::I64),
            ParameterDescriptor::query("verbose", ParamType::Bool).default_value("false"),
            ParameterDescriptor::query("page", ParamType::I64).with(Constraint::Min(1.0)).optional(),
        ];
        let request = RequestContext::builder(Method::GET, "/users/42?verbose=true").build();
        let args = bind(&binder(), "/users/{id}", &params, request).unwrap();

        assert_eq!(args.i64("id").unwrap(), 42);
        assert!(args.bool("verbose").unwrap());
        assert_eq!(args.opt_i64("page").unwrap(), None);
    }

    #[test]
    fn test_constraint_failures_are_collected() {
        let params = [
            ParameterDescriptor::query("page", ParamType::I64).with(Constraint::Min(1.0)),
            ParameterDescriptor::query("to", ParamType::Str).with(Constraint::Email),
        ];
        let request = RequestContext::builder(Method::GET, "/mail?page=0&to=nobody").build();
        match bind(&binder(), "/mail", &params, request) {
            Err(DispatchError::Validation(errors)) => assert_eq!(
                errors,
                vec![
                    "page must be greater than or equal to 1".to_string(),
                    "to must be a valid email address".to_string(),
                ]
            ),
            other => panic!("expected validation errors, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_and_malformed_values_are_400() {
        let params = [ParameterDescriptor::query("limit", ParamType::I64)];

        let missing = RequestContext::builder(Method::GET, "/items").build();
        let err = bind(&binder(), "/items", &params, missing).unwrap_err();
        assert_eq!(err.client_message(), "Missing required parameter: limit");

        let malformed = RequestContext::builder(Method::GET, "/items?limit=ten").build();
        let err = bind(&binder(), "/items", &params, malformed).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_ambiguous_claim_is_rejected_at_plan_time() {
        let mut binder = binder();
        binder.register(Arc::new(GreedyQuery));
        let params = [ParameterDescriptor::query("q", ParamType::Str)];

        let err = binder.plan("GET /search", &pattern("/search"), &params).unwrap_err();
        match err {
            ConfigurationError::AmbiguousParameter { handlers, .. } => assert_eq!(handlers, "query, greedy"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unclaimed_and_invalid_params_are_rejected() {
        let params = [ParameterDescriptor::custom("tenant", "tenant", ParamType::Str)];
        assert!(matches!(
            binder().plan("GET /", &pattern("/"), &params),
            Err(ConfigurationError::UnhandledParameter { .. })
        ));

        let params = [ParameterDescriptor::path("id", ParamType::I64)];
        assert!(matches!(
            binder().plan("GET /users", &pattern("/users"), &params),
            Err(ConfigurationError::InvalidParameter { .. })
        ));

        let params = [ParameterDescriptor::new("me", ParamSource::Identity, ParamType::Str)];
        assert!(matches!(
            binder().plan("GET /me", &pattern("/me"), &params),
            Err(ConfigurationError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_identity_and_injected_values() {
        let params = [ParameterDescriptor::identity("me"), ParameterDescriptor::request()];
        let mut request = RequestContext::builder(Method::GET, "/me").build();
        request.principal = Some(Principal::resolved(Identity::new("1", "alice", "user"), AuthScheme::Bearer));

        let args = bind(&binder(), "/me", &params, request).unwrap();
        assert_eq!(args.identity().unwrap().username, "alice");
        assert_eq!(args.request().unwrap().path(), "/me");

        let anonymous = RequestContext::builder(Method::GET, "/me").build();
        let err = bind(&binder(), "/me", &params[..1], anonymous).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_query_falls_back_to_form_fields() {
        let binder = binder();
        let params = [ParameterDescriptor::query("title", ParamType::Str)];
        let pattern = pattern("/notes");
        let plan = binder.plan("POST /notes", &pattern, &params).unwrap();
        assert!(plan.needs_form());

        let request = Arc::new(RequestContext::builder(Method::POST, "/notes").build());
        let form = FormData::default().with_field("title", "groceries");
        let args = binder
            .bind(
                &plan,
                &params,
                &BindInput {
                    request: &request,
                    response: &ResponseHandle::new(),
                    path: &PathParams::default(),
                    form: Some(&form),
                },
            )
            .unwrap();
        assert_eq!(args.str("title").unwrap(), "groceries");
    }
}
