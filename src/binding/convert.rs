//! String to scalar conversion shared by path and query parameters.

use crate::binding::args::ArgValue;
use crate::binding::descriptor::ParamType;
use crate::dispatch::DispatchError;

fn invalid(name: &str) -> DispatchError {
    DispatchError::bad_request(format!("Invalid parameter format for: {}", name))
}

fn parse_bool(raw: &str) -> Option<bool> {
    if raw.eq_ignore_ascii_case("true") || raw == "1" {
        Some(true)
    } else if raw.eq_ignore_ascii_case("false") || raw == "0" {
        Some(false)
    } else {
        None
    }
}

/// Convert `raw` to the declared scalar type.
pub fn convert(name: &str, raw: &str, ty: &ParamType) -> Result<ArgValue, DispatchError> {
    match ty {
        ParamType::Str => Ok(ArgValue::Str(raw.to_string())),
        ParamType::I64 => raw.trim().parse().map(ArgValue::I64).map_err(|_| invalid(name)),
        ParamType::F64 => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(ArgValue::F64)
            .ok_or_else(|| invalid(name)),
        ParamType::Bool => parse_bool(raw.trim()).map(ArgValue::Bool).ok_or_else(|| invalid(name)),
        other => Err(DispatchError::internal(format!(
            "parameter `{}` has non-scalar type {}",
            name,
            other.label()
        ))),
    }
}

/// Numeric reading of a converted value, for `Min` checks.
pub fn numeric(value: &ArgValue) -> Option<f64> {
    match value {
        ArgValue::I64(v) => Some(*v as f64),
        ArgValue::F64(v) => Some(*v),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_conversions() {
        assert!(matches!(convert("id", "42", &ParamType::I64), Ok(ArgValue::I64(42))));
        assert!(matches!(convert("x", "-1.5", &ParamType::F64), Ok(ArgValue::F64(v)) if v == -1.5));
        assert!(matches!(convert("b", "TRUE", &ParamType::Bool), Ok(ArgValue::Bool(true))));
        assert!(matches!(convert("b", "0", &ParamType::Bool), Ok(ArgValue::Bool(false))));
        assert!(matches!(convert("s", " a ", &ParamType::Str), Ok(ArgValue::Str(ref s)) if s == " a "));
    }

    #[test]
    fn test_bad_input_is_400() {
        for (raw, ty) in [("abc", ParamType::I64), ("NaN", ParamType::F64), ("yes", ParamType::Bool)] {
            let err = convert("p", raw, &ty).unwrap_err();
            assert_eq!(err.status(), StatusCode::BAD_REQUEST);
            assert_eq!(err.client_message(), "Invalid parameter format for: p");
        }
    }
}
