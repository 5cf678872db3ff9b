//! Bound argument values handed to handlers.

use std::fmt;
use std::sync::Arc;

use crate::auth::Identity;
use crate::binding::descriptor::DecodedBody;
use crate::binding::upload::UploadOutcome;
use crate::dispatch::DispatchError;
use crate::http::{RequestContext, ResponseHandle};

pub enum ArgValue {
    Str(String),
    I64(i64),
    F64(f64),
    Bool(bool),
    Body(DecodedBody),
    Request(Arc<RequestContext>),
    Response(ResponseHandle),
    Identity(Identity),
    Upload(UploadOutcome),
    /// Optional parameter that was not supplied.
    Missing,
    /// Value produced by an application-registered handler.
    Custom(Box<dyn std::any::Any + Send + Sync>),
}

impl fmt::Debug for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Str(v) => f.debug_tuple("Str").field(v).finish(),
            ArgValue::I64(v) => f.debug_tuple("I64").field(v).finish(),
            ArgValue::F64(v) => f.debug_tuple("F64").field(v).finish(),
            ArgValue::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            ArgValue::Body(_) => f.write_str("Body(..)"),
            ArgValue::Request(_) => f.write_str("Request(..)"),
            ArgValue::Response(_) => f.write_str("Response(..)"),
            ArgValue::Identity(v) => f.debug_tuple("Identity").field(&v.id).finish(),
            ArgValue::Upload(v) => f.debug_tuple("Upload").field(v).finish(),
            ArgValue::Missing => f.write_str("Missing"),
            ArgValue::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Arguments in declaration order, looked up by name.
#[derive(Debug, Default)]
pub struct Arguments {
    values: Vec<(String, ArgValue)>,
}

fn missing(name: &str) -> DispatchError {
    DispatchError::internal(format!("handler asked for undeclared or mistyped argument `{}`", name))
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: ArgValue) {
        self.values.push((name.into(), value));
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    fn take(&mut self, name: &str) -> Option<ArgValue> {
        let index = self.values.iter().position(|(n, _)| n == name)?;
        Some(self.values.remove(index).1)
    }

    pub fn str(&self, name: &str) -> Result<&str, DispatchError> {
        self.opt_str(name)?.ok_or_else(|| missing(name))
    }

    pub fn opt_str(&self, name: &str) -> Result<Option<&str>, DispatchError> {
        match self.get(name) {
            Some(ArgValue::Str(v)) => Ok(Some(v.as_str())),
            Some(ArgValue::Missing) => Ok(None),
            _ => Err(missing(name)),
        }
    }

    pub fn i64(&self, name: &str) -> Result<i64, DispatchError> {
        self.opt_i64(name)?.ok_or_else(|| missing(name))
    }

    pub fn opt_i64(&self, name: &str) -> Result<Option<i64>, DispatchError> {
        match self.get(name) {
            Some(ArgValue::I64(v)) => Ok(Some(*v)),
            Some(ArgValue::Missing) => Ok(None),
            _ => Err(missing(name)),
        }
    }

    pub fn f64(&self, name: &str) -> Result<f64, DispatchError> {
        match self.get(name) {
            Some(ArgValue::F64(v)) => Ok(*v),
            _ => Err(missing(name)),
        }
    }

    pub fn bool(&self, name: &str) -> Result<bool, DispatchError> {
        match self.get(name) {
            Some(ArgValue::Bool(v)) => Ok(*v),
            _ => Err(missing(name)),
        }
    }

    pub fn body<T: 'static>(&self, name: &str) -> Result<&T, DispatchError> {
        match self.get(name) {
            Some(ArgValue::Body(body)) => body.downcast_ref::<T>().ok_or_else(|| missing(name)),
            _ => Err(missing(name)),
        }
    }

    pub fn opt_body<T: 'static>(&self, name: &str) -> Result<Option<&T>, DispatchError> {
        match self.get(name) {
            Some(ArgValue::Missing) => Ok(None),
            _ => self.body(name).map(Some),
        }
    }

    /// The caller's identity (first identity argument).
    pub fn identity(&self) -> Result<&Identity, DispatchError> {
        self.values
            .iter()
            .find_map(|(_, v)| match v {
                ArgValue::Identity(identity) => Some(identity),
                _ => None,
            })
            .ok_or_else(|| missing("identity"))
    }

    pub fn request(&self) -> Result<&RequestContext, DispatchError> {
        self.values
            .iter()
            .find_map(|(_, v)| match v {
                ArgValue::Request(request) => Some(request.as_ref()),
                _ => None,
            })
            .ok_or_else(|| missing("request"))
    }

    pub fn response(&self) -> Result<ResponseHandle, DispatchError> {
        self.values
            .iter()
            .find_map(|(_, v)| match v {
                ArgValue::Response(handle) => Some(handle.clone()),
                _ => None,
            })
            .ok_or_else(|| missing("response"))
    }

    /// Move an upload out of the arguments.
    pub fn upload(&mut self, name: &str) -> Result<UploadOutcome, DispatchError> {
        match self.take(name) {
            Some(ArgValue::Upload(upload)) => Ok(upload),
            _ => Err(missing(name)),
        }
    }

    pub fn custom<T: 'static>(&self, name: &str) -> Result<&T, DispatchError> {
        match self.get(name) {
            Some(ArgValue::Custom(value)) => value.downcast_ref::<T>().ok_or_else(|| missing(name)),
            _ => Err(missing(name)),
        }
    }
}
