//! Route template compilation.
//!
//! # Responsibilities
//! - Compile `/users/{id}` style templates into an anchored matcher
//! - Extract captured values in declaration order
//!
//! # Design Decisions
//! - Literal text is escaped; `{name}` becomes one non-`/` segment
//! - A trailing `*` captures the rest of the path under the name `*`
//! - Captures are returned raw (no percent-decoding)
//! - The empty template matches `/` only

use regex::Regex;

use crate::dispatch::ConfigurationError;

/// Capture name used for a trailing wildcard.
pub const WILDCARD: &str = "*";

/// Values captured from a concrete path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    values: Vec<(String, String)>,
}

impl PathParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn wildcard(&self) -> Option<&str> {
        self.get(WILDCARD)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A compiled route template.
#[derive(Debug, Clone)]
pub struct PathPattern {
    template: String,
    regex: Regex,
    variables: Vec<String>,
}

impl PathPattern {
    pub fn compile(template: &str) -> Result<Self, ConfigurationError> {
        let invalid = |reason: &str| ConfigurationError::InvalidTemplate {
            template: template.to_string(),
            reason: reason.to_string(),
        };

        let normalized = if template.starts_with('/') {
            template.to_string()
        } else {
            format!("/{}", template)
        };

        let mut source = String::from("^");
        let mut variables: Vec<String> = Vec::new();
        let mut literal = String::new();
        let mut chars = normalized.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            match c {
                '{' => {
                    source.push_str(&regex::escape(&literal));
                    literal.clear();

                    let rest = &normalized[i + 1..];
                    let close = rest.find('}').ok_or_else(|| invalid("unclosed '{'"))?;
                    let name = &rest[..close];
                    if name.is_empty() {
                        return Err(invalid("empty variable name"));
                    }
                    if !name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
                        return Err(invalid("variable names may only contain letters, digits and '_'"));
                    }
                    if variables.iter().any(|v| v == name) {
                        return Err(invalid(&format!("variable '{}' declared twice", name)));
                    }
                    variables.push(name.to_string());
                    source.push_str("([^/]+)");

                    // Skip past the name and the closing brace.
                    for _ in 0..=close {
                        chars.next();
                    }
                }
                '}' => return Err(invalid("unmatched '}'")),
                '*' => {
                    if chars.peek().is_some() {
                        return Err(invalid("'*' is only allowed at the end"));
                    }
                    source.push_str(&regex::escape(&literal));
                    literal.clear();
                    variables.push(WILDCARD.to_string());
                    source.push_str("(.*)");
                }
                other => literal.push(other),
            }
        }
        source.push_str(&regex::escape(&literal));
        source.push('$');

        let regex = Regex::new(&source).map_err(|e| invalid(&e.to_string()))?;
        Ok(Self {
            template: template.to_string(),
            regex,
            variables,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.iter().any(|v| v == name)
    }

    /// Match a concrete path, returning the captures on success.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let captures = self.regex.captures(path)?;
        let values = self
            .variables
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let value = captures.get(i + 1).map(|m| m.as_str()).unwrap_or_default();
                (name.clone(), value.to_string())
            })
            .collect();
        Some(PathParams { values })
    }

    /// Anchored regex source, for diagnostics.
    pub fn as_regex(&self) -> &str {
        self.regex.as_str()
    }
}
