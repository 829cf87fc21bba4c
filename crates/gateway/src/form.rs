use serde::{Deserialize, Serialize};
use shelf_protocol::Credentials;

pub const MIN_PASSWORD_LEN: usize = 4;
pub const MAX_PASSWORD_LEN: usize = 128;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Per-field validation messages; a field is absent when it passed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl FieldErrors {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.password.is_none()
    }
}

/// Strips surrounding whitespace only. Case is kept: the upstream compares
/// emails as typed and the session subject is the email as submitted.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_string()
}

pub fn is_reasonable_email(email: &str) -> bool {
    if email.len() < 5 || email.len() > 254 {
        return false;
    }
    let mut parts = email.split('@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().unwrap_or_default();
    parts.next().is_none()
        && !local.is_empty()
        && !email.chars().any(char::is_whitespace)
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

impl LoginForm {
    /// Checks the form before anything goes over the network.
    pub fn validate(&self) -> Result<Credentials, FieldErrors> {
        let email = normalize_email(&self.email);
        let mut errors = FieldErrors::default();

        if email.is_empty() {
            errors.email = Some("Email is required".to_string());
        } else if !is_reasonable_email(&email) {
            errors.email = Some("Invalid email address".to_string());
        }

        let len = self.password.chars().count();
        if self.password.is_empty() {
            errors.password = Some("Password is required".to_string());
        } else if len < MIN_PASSWORD_LEN {
            errors.password =
                Some(format!("Password must be at least {MIN_PASSWORD_LEN} characters"));
        } else if len > MAX_PASSWORD_LEN {
            errors.password =
                Some(format!("Password must be at most {MAX_PASSWORD_LEN} characters"));
        }

        if errors.is_empty() {
            Ok(Credentials::new(email, self.password.clone()))
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(email: &str, password: &str) -> LoginForm {
        LoginForm {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn valid_form_trims_but_keeps_email_case() {
        let creds = form("  Admin@Shop.COM ", "changeme").validate().unwrap();
        assert_eq!(creds.email, "Admin@Shop.COM");
        assert_eq!(creds.password, "changeme");
    }

    #[test]
    fn empty_fields_are_reported_individually() {
        let errors = form("", "").validate().unwrap_err();
        assert_eq!(errors.email.as_deref(), Some("Email is required"));
        assert_eq!(errors.password.as_deref(), Some("Password is required"));
    }

    #[test]
    fn malformed_email_and_short_password() {
        let errors = form("not-an-email", "abc").validate().unwrap_err();
        assert_eq!(errors.email.as_deref(), Some("Invalid email address"));
        assert_eq!(errors.password.as_deref(), Some("Password must be at least 4 characters"));
    }

    #[test]
    fn only_failing_field_is_reported() {
        let errors = form("a@b.com", "x".repeat(129).as_str()).validate().unwrap_err();
        assert!(errors.email.is_none());
        assert!(errors.password.is_some());
    }

    #[test]
    fn email_shapes() {
        assert!(is_reasonable_email("a@b.co"));
        assert!(!is_reasonable_email("a@b@c.com"));
        assert!(!is_reasonable_email("a@.com"));
        assert!(!is_reasonable_email("a b@c.com"));
    }
}
