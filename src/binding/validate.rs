//! Field and parameter validation rules.
//!
//! The same rules back scalar parameters (`Constraint`) and request bodies
//! (`Validate` + `ValidationReport`).

use regex::Regex;
use std::sync::OnceLock;

use crate::dispatch::DispatchError;

const EMAIL_PATTERN: &str = r"^[A-Za-z0-9+_.-]+@(.+)$";

fn email_regex() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(EMAIL_PATTERN).ok()).as_ref()
}

pub fn is_email(value: &str) -> bool {
    email_regex().is_some_and(|re| re.is_match(value))
}

/// A rule attached to a path or query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    NotBlank,
    NotNull,
    Min(f64),
    Email,
}

impl Constraint {
    /// Check a raw (unconverted) value. `None` means the parameter was absent.
    pub fn check(&self, name: &str, raw: Option<&str>, numeric: Option<f64>) -> Result<(), String> {
        match self {
            Constraint::NotNull => match raw {
                Some(_) => Ok(()),
                None => Err(format!("{} must not be null", name)),
            },
            Constraint::NotBlank => match raw {
                Some(v) if !v.trim().is_empty() => Ok(()),
                _ => Err(format!("{} must not be blank", name)),
            },
            Constraint::Min(min) => match numeric {
                Some(v) if v < *min => Err(format!("{} must be greater than or equal to {}", name, min)),
                _ => Ok(()),
            },
            Constraint::Email => match raw {
                Some(v) if !is_email(v) => Err(format!("{} must be a valid email address", name)),
                _ => Ok(()),
            },
        }
    }
}

/// Collected field errors for one value.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    errors: Vec<String>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn not_blank(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.errors.push(format!("{} must not be blank", field));
        }
        self
    }

    pub fn not_null<T>(&mut self, field: &str, value: &Option<T>) -> &mut Self {
        if value.is_none() {
            self.errors.push(format!("{} must not be null", field));
        }
        self
    }

    pub fn min(&mut self, field: &str, value: f64, min: f64) -> &mut Self {
        if value < min {
            self.errors
                .push(format!("{} must be greater than or equal to {}", field, min));
        }
        self
    }

    pub fn email(&mut self, field: &str, value: &str) -> &mut Self {
        if !is_email(value) {
            self.errors.push(format!("{} must be a valid email address", field));
        }
        self
    }

    /// Record a custom failure.
    pub fn error(&mut self, message: impl Into<String>) -> &mut Self {
        self.errors.push(message.into());
        self
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn into_result(self) -> Result<(), DispatchError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(DispatchError::Validation(self.errors))
        }
    }
}

/// Implemented by request body types. The default accepts everything.
pub trait Validate {
    fn validate(&self) -> ValidationReport {
        ValidationReport::default()
    }
}

impl Validate for serde_json::Value {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_shape() {
        assert!(is_email("alice@example.com"));
        assert!(is_email("a.b+c@x"));
        assert!(!is_email("alice"));
        assert!(!is_email("@example.com"));
    }

    #[test]
    fn test_constraints_on_raw_values() {
        assert!(Constraint::NotBlank.check("q", Some("  "), None).is_err());
        assert!(Constraint::NotBlank.check("q", None, None).is_err());
        assert!(Constraint::NotNull.check("q", Some(""), None).is_ok());
        assert_eq!(
            Constraint::Min(1.0).check("page", Some("0"), Some(0.0)),
            Err("page must be greater than or equal to 1".to_string())
        );
        assert!(Constraint::Min(1.0).check("page", None, None).is_ok());
        assert!(Constraint::Email.check("to", Some("nope"), None).is_err());
    }

    #[test]
    fn test_report_collects_all_errors() {
        let mut report = ValidationReport::new();
        report
            .not_blank("username", "")
            .email("email", "bad")
            .min("age", 12.0, 18.0)
            .not_null::<u8>("nickname", &None);
        assert_eq!(report.errors().len(), 4);

        match report.into_result() {
            Err(DispatchError::Validation(errors)) => assert_eq!(errors[0], "username must not be blank"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
