// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Request data validation.
//!
//! Length limits follow the account columns:
//! - username and display name shorter than 30 characters
//! - email shorter than 50 characters and containing `@`
//! - phone shorter than 10 characters
//! - edited profile fields at most 30 characters each
//! - guard identities at most 39 characters

use crate::connection::MAX_TARGET_LEN;
use thiserror::Error;
use tracing::debug;

const MAX_USERNAME_LEN: usize = 30;
const MAX_DISPLAY_NAME_LEN: usize = 30;
const MAX_EMAIL_LEN: usize = 50;
const MAX_PHONE_LEN: usize = 10;
const MAX_PROFILE_FIELD_LEN: usize = 31;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("{field} invalid: must be shorter than {limit} characters")]
    TooLong { field: &'static str, limit: usize },

    #[error("Email invalid")]
    InvalidEmail,

    #[error("Identity invalid: {0}")]
    InvalidTarget(String),
}

/// Registration form as submitted.
#[derive(Debug, Clone)]
pub struct Registration<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub display_name: &'a str,
    pub email: &'a str,
    pub phone: &'a str,
}

/// Validate a registration form.
pub fn validate_registration(form: &Registration<'_>) -> Result<(), ValidationError> {
    require("username", form.username)?;
    require("password", form.password)?;
    require("display_name", form.display_name)?;
    require("email", form.email)?;
    require("phone", form.phone)?;

    shorter_than("Username", form.username, MAX_USERNAME_LEN)?;
    shorter_than("Display name", form.display_name, MAX_DISPLAY_NAME_LEN)?;
    shorter_than("Email", form.email, MAX_EMAIL_LEN)?;
    if !form.email.contains('@') {
        debug!(email = %form.email, "Email without @");
        return Err(ValidationError::InvalidEmail);
    }
    shorter_than("Phone", form.phone, MAX_PHONE_LEN)?;

    debug!(username = %form.username, "Registration valid");
    Ok(())
}

/// Profile fields a member may change after registering.
#[derive(Debug, Clone)]
pub struct ProfileEdit<'a> {
    pub display_name: &'a str,
    pub email: &'a str,
    pub phone: &'a str,
}

/// Validate a profile edit.
pub fn validate_profile(edit: &ProfileEdit<'_>) -> Result<(), ValidationError> {
    require("display_name", edit.display_name)?;
    require("email", edit.email)?;
    require("phone", edit.phone)?;

    shorter_than("Display name", edit.display_name, MAX_PROFILE_FIELD_LEN)?;
    shorter_than("Email", edit.email, MAX_PROFILE_FIELD_LEN)?;
    if !edit.email.contains('@') {
        debug!(email = %edit.email, "Email without @");
        return Err(ValidationError::InvalidEmail);
    }
    shorter_than("Phone", edit.phone, MAX_PROFILE_FIELD_LEN)?;
    Ok(())
}

/// Validate a replacement password.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    require("new_password", password)
}

/// Validate an identity handed to the guard from outside.
pub fn validate_target(target: &str) -> Result<(), ValidationError> {
    let trimmed = target.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField("target"));
    }
    if trimmed != target {
        return Err(ValidationError::InvalidTarget(
            "surrounding whitespace".to_string(),
        ));
    }
    if target.chars().count() > MAX_TARGET_LEN {
        return Err(ValidationError::InvalidTarget(format!(
            "longer than {MAX_TARGET_LEN} characters"
        )));
    }
    Ok(())
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        debug!(field, "Missing field");
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}

fn shorter_than(field: &'static str, value: &str, limit: usize) -> Result<(), ValidationError> {
    if value.chars().count() >= limit {
        debug!(field, limit, "Field too long");
        return Err(ValidationError::TooLong { field, limit });
    }
    Ok(())
}
