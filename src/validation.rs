use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::contact::{ContactFormData, ContactPatch};
use crate::error::{ContactError, Result};

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9 ()\-]+$").expect("phone pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    FullName,
    Email,
    Phone,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FullName => write!(f, "fullName"),
            Self::Email => write!(f, "email"),
            Self::Phone => write!(f, "phone"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    Required,
    InvalidFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub kind: ErrorKind,
    pub message: &'static str,
}

impl FieldError {
    fn required(message: &'static str) -> Self {
        Self {
            kind: ErrorKind::Required,
            message,
        }
    }

    fn invalid(message: &'static str) -> Self {
        Self {
            kind: ErrorKind::InvalidFormat,
            message,
        }
    }
}

/// Field errors of a form submission. Empty means the submission is acceptable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<Field, FieldError>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: Field) -> Option<&FieldError> {
        self.0.get(&field)
    }

    pub fn kind(&self, field: Field) -> Option<ErrorKind> {
        self.get(field).map(|e| e.kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Field, &FieldError)> {
        self.0.iter()
    }

    fn record(&mut self, field: Field, error: Option<FieldError>) {
        if let Some(error) = error {
            self.0.insert(field, error);
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, error) in &self.0 {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", field, error.message)?;
            first = false;
        }
        Ok(())
    }
}

fn check_full_name(value: &str) -> Option<FieldError> {
    if value.trim().is_empty() {
        return Some(FieldError::required("Full name is required"));
    }
    None
}

fn check_email(value: &str) -> Option<FieldError> {
    if value.trim().is_empty() {
        Some(FieldError::required("Email is required"))
    } else if !EMAIL_PATTERN.is_match(value) {
        Some(FieldError::invalid("Invalid email format"))
    } else {
        None
    }
}

fn check_phone(value: &str) -> Option<FieldError> {
    if value.trim().is_empty() {
        Some(FieldError::required("Phone number is required"))
    } else if !PHONE_PATTERN.is_match(value) {
        Some(FieldError::invalid("Invalid phone number format"))
    } else {
        None
    }
}

/// Checks every field independently; optional fields are always accepted.
pub fn validate(form: &ContactFormData) -> ValidationErrors {
    let mut errors = ValidationErrors::default();
    errors.record(Field::FullName, check_full_name(&form.full_name));
    errors.record(Field::Email, check_email(&form.email));
    errors.record(Field::Phone, check_phone(&form.phone));
    errors
}

/// Same rules as [`validate`], applied only to the required fields a patch supplies.
pub fn validate_patch(patch: &ContactPatch) -> ValidationErrors {
    let mut errors = ValidationErrors::default();
    if let Some(full_name) = &patch.full_name {
        errors.record(Field::FullName, check_full_name(full_name));
    }
    if let Some(email) = &patch.email {
        errors.record(Field::Email, check_email(email));
    }
    if let Some(phone) = &patch.phone {
        errors.record(Field::Phone, check_phone(phone));
    }
    errors
}

pub fn ensure_valid(form: &ContactFormData) -> Result<()> {
    into_result(validate(form))
}

pub fn ensure_valid_patch(patch: &ContactPatch) -> Result<()> {
    into_result(validate_patch(patch))
}

fn into_result(errors: ValidationErrors) -> Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ContactError::ValidationFailed(errors))
    }
}
