//! Request validation: typed ingress checks with per-field feedback.
//!
//! Payloads arrive as untyped JSON. A [`PayloadReader`] walks the required
//! fields, records every problem it sees, and only hands back a typed value
//! once the whole payload has been checked.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// One rejected field and why.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldIssue {
    pub field: String,
    pub reason: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid request: {}", summarize(.issues))]
pub struct ValidationError {
    pub issues: Vec<FieldIssue>,
}

impl ValidationError {
    pub fn single(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            issues: vec![FieldIssue::new(field, reason)],
        }
    }

    /// Names of the rejected fields, in the order they were checked.
    pub fn fields(&self) -> Vec<&str> {
        self.issues.iter().map(|i| i.field.as_str()).collect()
    }
}

fn summarize(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(|i| format!("{}: {}", i.field, i.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

// ---------------------------------------------------------------------------
// PayloadReader
// ---------------------------------------------------------------------------

/// Accumulating reader over a JSON object payload.
#[derive(Debug)]
pub struct PayloadReader<'a> {
    object: Option<&'a Map<String, Value>>,
    issues: Vec<FieldIssue>,
}

impl<'a> PayloadReader<'a> {
    pub fn new(payload: &'a Value) -> Self {
        match payload.as_object() {
            Some(object) => Self {
                object: Some(object),
                issues: Vec::new(),
            },
            None => Self {
                object: None,
                issues: vec![FieldIssue::new("body", "expected a JSON object")],
            },
        }
    }

    /// Read a required, non-empty string field.
    pub fn string(&mut self, field: &str) -> String {
        self.checked_string(field, |_| Ok(()))
    }

    /// Read a required, non-empty string field and run `check` on it.
    pub fn checked_string(
        &mut self,
        field: &str,
        check: impl FnOnce(&str) -> Result<(), String>,
    ) -> String {
        let Some(object) = self.object else {
            return String::new();
        };
        match object.get(field) {
            None | Some(Value::Null) => {
                self.issues.push(FieldIssue::new(field, "field required"));
                String::new()
            }
            Some(Value::String(s)) if s.is_empty() => {
                self.issues.push(FieldIssue::new(field, "must not be empty"));
                String::new()
            }
            Some(Value::String(s)) => {
                if let Err(reason) = check(s) {
                    self.issues.push(FieldIssue::new(field, reason));
                }
                s.clone()
            }
            Some(_) => {
                self.issues.push(FieldIssue::new(field, "expected a string"));
                String::new()
            }
        }
    }

    /// Read an optional boolean field, falling back to `default` when absent.
    pub fn bool_or(&mut self, field: &str, default: bool) -> bool {
        let Some(object) = self.object else {
            return default;
        };
        match object.get(field) {
            None | Some(Value::Null) => default,
            Some(Value::Bool(b)) => *b,
            Some(_) => {
                self.issues.push(FieldIssue::new(field, "expected a boolean"));
                default
            }
        }
    }

    pub fn finish(self) -> Result<(), ValidationError> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                issues: self.issues,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Allow-lists for values that end up inside statement text
// ---------------------------------------------------------------------------

const MAX_IDENTIFIER_LEN: usize = 255;

/// Unquoted-safe warehouse identifier: `[A-Za-z_][A-Za-z0-9_$]*`.
pub fn check_identifier(value: &str) -> Result<(), String> {
    let mut chars = value.chars();
    let first_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !first_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$') {
        return Err("must match [A-Za-z_][A-Za-z0-9_$]*".into());
    }
    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(format!("must be at most {MAX_IDENTIFIER_LEN} characters"));
    }
    Ok(())
}

/// GCS bucket naming: 3-63 chars of `[a-z0-9._-]`, alphanumeric at both ends.
pub fn check_bucket(value: &str) -> Result<(), String> {
    let len_ok = (3..=63).contains(&value.len());
    let chars_ok = value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'));
    let ends_ok = value
        .chars()
        .next()
        .zip(value.chars().last())
        .is_some_and(|(a, b)| a.is_ascii_alphanumeric() && b.is_ascii_alphanumeric());
    if len_ok && chars_ok && ends_ok {
        Ok(())
    } else {
        Err("must be a valid bucket name (3-63 chars of a-z, 0-9, '.', '_', '-')".into())
    }
}

fn check_segment(segment: &str) -> Result<(), String> {
    if segment.is_empty() || segment == "." || segment == ".." {
        return Err(format!("invalid path segment '{segment}'"));
    }
    if !segment
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(format!(
            "path segment '{segment}' may only contain A-Z, a-z, 0-9, '.', '_', '-'"
        ));
    }
    Ok(())
}

/// A `/`-separated object folder. Leading and trailing slashes are rejected.
pub fn check_folder(value: &str) -> Result<(), String> {
    value.split('/').try_for_each(check_segment)
}

/// A single object name segment.
pub fn check_file_name(value: &str) -> Result<(), String> {
    if value.contains('/') {
        return Err("must not contain '/'".into());
    }
    check_segment(value)
}

pub fn check_single_char(value: &str) -> Result<(), String> {
    if value.chars().count() == 1 {
        Ok(())
    } else {
        Err("must be a single character".into())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
