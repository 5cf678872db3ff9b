//! Declarative description of handler parameters.

use serde::de::DeserializeOwned;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::binding::upload::FileUploadSpec;
use crate::binding::validate::{Constraint, Validate};
use crate::dispatch::DispatchError;

pub const INVALID_BODY: &str = "Invalid request body format";

pub type DecodedBody = Box<dyn Any + Send + Sync>;
type DecodeFn = dyn Fn(&[u8]) -> Result<DecodedBody, DispatchError> + Send + Sync;

/// Type-erased JSON decoder for one body type, validation included.
#[derive(Clone)]
pub struct BodyDecoder {
    type_name: &'static str,
    decode: Arc<DecodeFn>,
}

impl BodyDecoder {
    pub fn json<T>() -> Self
    where
        T: DeserializeOwned + Validate + Send + Sync + 'static,
    {
        Self {
            type_name: std::any::type_name::<T>(),
            decode: Arc::new(|bytes: &[u8]| {
                let value: T = serde_json::from_slice(bytes)
                    .map_err(|_| DispatchError::Validation(vec![INVALID_BODY.to_string()]))?;
                value.validate().into_result()?;
                Ok(Box::new(value) as DecodedBody)
            }),
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<DecodedBody, DispatchError> {
        (self.decode)(bytes)
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for BodyDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BodyDecoder").field(&self.type_name).finish()
    }
}

/// Where a parameter's value comes from.
#[derive(Debug, Clone)]
pub enum ParamSource {
    Path,
    Query,
    Body,
    /// Raw request or response object.
    Injected,
    /// The authenticated caller.
    Identity,
    File(FileUploadSpec),
    /// Claimed by an application-registered handler.
    Custom(&'static str),
}

impl ParamSource {
    pub fn label(&self) -> &'static str {
        match self {
            ParamSource::Path => "path",
            ParamSource::Query => "query",
            ParamSource::Body => "body",
            ParamSource::Injected => "injected",
            ParamSource::Identity => "identity",
            ParamSource::File(_) => "file",
            ParamSource::Custom(name) => name,
        }
    }
}

/// Declared type of a parameter.
#[derive(Debug, Clone)]
pub enum ParamType {
    Str,
    I64,
    F64,
    Bool,
    Json(BodyDecoder),
    Request,
    Response,
    Identity,
    Upload,
}

impl ParamType {
    pub fn json<T>() -> Self
    where
        T: DeserializeOwned + Validate + Send + Sync + 'static,
    {
        ParamType::Json(BodyDecoder::json::<T>())
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, ParamType::Str | ParamType::I64 | ParamType::F64 | ParamType::Bool)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ParamType::Str => "string",
            ParamType::I64 => "int64",
            ParamType::F64 => "float64",
            ParamType::Bool => "bool",
            ParamType::Json(decoder) => decoder.type_name(),
            ParamType::Request => "request",
            ParamType::Response => "response",
            ParamType::Identity => "identity",
            ParamType::Upload => "upload",
        }
    }
}

/// One handler argument.
#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    pub name: String,
    pub source: ParamSource,
    pub ty: ParamType,
    pub required: bool,
    pub default: Option<String>,
    pub constraints: Vec<Constraint>,
}

impl ParameterDescriptor {
    pub fn new(name: impl Into<String>, source: ParamSource, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            source,
            ty,
            required: true,
            default: None,
            constraints: Vec::new(),
        }
    }

    pub fn path(name: impl Into<String>, ty: ParamType) -> Self {
        Self::new(name, ParamSource::Path, ty)
    }

    pub fn query(name: impl Into<String>, ty: ParamType) -> Self {
        Self::new(name, ParamSource::Query, ty)
    }

    pub fn body<T>(name: impl Into<String>) -> Self
    where
        T: DeserializeOwned + Validate + Send + Sync + 'static,
    {
        Self::new(name, ParamSource::Body, ParamType::json::<T>())
    }

    pub fn request() -> Self {
        Self::new("request", ParamSource::Injected, ParamType::Request)
    }

    pub fn response() -> Self {
        Self::new("response", ParamSource::Injected, ParamType::Response)
    }

    pub fn identity(name: impl Into<String>) -> Self {
        Self::new(name, ParamSource::Identity, ParamType::Identity)
    }

    pub fn file(name: impl Into<String>, spec: FileUploadSpec) -> Self {
        Self::new(name, ParamSource::File(spec), ParamType::Upload)
    }

    pub fn custom(name: impl Into<String>, kind: &'static str, ty: ParamType) -> Self {
        Self::new(name, ParamSource::Custom(kind), ty)
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Value used when the parameter is absent. Implies optional.
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self.required = false;
        self
    }

    pub fn with(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }
}
