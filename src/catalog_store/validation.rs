//! Validation of admin catalog edits, applied before anything reaches the store.

use super::models::{Category, CategoryFields};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Field '{field}' is required but was empty")]
    EmptyField { field: &'static str },

    #[error("A category named '{0}' already exists")]
    DuplicateName(String),

    #[error("No {0} selected")]
    EmptySelection(&'static str),
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Checks trimmed category fields. `existing` is the current category list and
/// `editing` the code being updated, if any, so a category may keep its name.
pub fn validate_category_fields(
    fields: &CategoryFields,
    existing: &[Category],
    editing: Option<i64>,
) -> ValidationResult<()> {
    if fields.name.is_empty() {
        return Err(ValidationError::EmptyField { field: "name" });
    }
    if fields.description.is_empty() {
        return Err(ValidationError::EmptyField {
            field: "description",
        });
    }
    if fields.logo.is_empty() {
        return Err(ValidationError::EmptyField { field: "logo" });
    }
    let taken = existing
        .iter()
        .any(|c| c.name == fields.name && Some(c.code) != editing);
    if taken {
        return Err(ValidationError::DuplicateName(fields.name.clone()));
    }
    Ok(())
}

pub fn validate_selection(codes: &[i64], what: &'static str) -> ValidationResult<()> {
    if codes.is_empty() {
        return Err(ValidationError::EmptySelection(what));
    }
    Ok(())
}
