//! Registration payload rules. Checked in a fixed order; the first failure wins.
//!
//! The email check is a shallow `local@domain.tld` shape test, not RFC 5322
//! validation. Addresses such as `a@b.c` pass and quoted local parts fail.

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use super::dto::RegisterRequest;
use crate::users::Role;

/// Minimum password length, counted in Unicode scalar values (`char`s), not
/// UTF-16 units or bytes.
pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required fields: email, password, firstName and lastName are required")]
    MissingRequiredFields,

    #[error("Invalid email format")]
    InvalidEmail,

    #[error("Password must be at least {min} characters long")]
    PasswordTooShort { min: usize },

    #[error("Invalid role: must be one of admin, teacher, student, parent")]
    InvalidRole(String),

    #[error("{0} is required for student registration")]
    MissingStudentField(&'static str),
}

/// A registration payload that passed every rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidRegistration {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub grade: Option<String>,
    pub student_id: Option<String>,
    pub phone_number: Option<String>,
}

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn present(field: Option<String>) -> Option<String> {
    field.filter(|v| !v.trim().is_empty())
}

pub fn validate_registration(req: RegisterRequest) -> Result<ValidRegistration, ValidationError> {
    let (Some(email), Some(password), Some(first_name), Some(last_name)) = (
        present(req.email),
        req.password.filter(|p| !p.is_empty()),
        present(req.first_name),
        present(req.last_name),
    ) else {
        return Err(ValidationError::MissingRequiredFields);
    };

    if !is_valid_email(&email) {
        return Err(ValidationError::InvalidEmail);
    }

    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort {
            min: MIN_PASSWORD_LEN,
        });
    }

    let role = match req.role {
        None => Role::default(),
        Some(raw) => raw.parse::<Role>().map_err(ValidationError::InvalidRole)?,
    };

    let grade = present(req.grade);
    let student_id = present(req.student_id);
    if role == Role::Student {
        if grade.is_none() {
            return Err(ValidationError::MissingStudentField("grade"));
        }
        if student_id.is_none() {
            return Err(ValidationError::MissingStudentField("studentId"));
        }
    }

    Ok(ValidRegistration {
        email,
        password,
        first_name,
        last_name,
        role,
        grade,
        student_id,
        phone_number: req.phone_number,
    })
}
