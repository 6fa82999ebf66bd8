use serde::Serialize;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FormValidation {
    pub is_valid: bool,
    pub error: Option<String>,
}

impl FormValidation {
    fn valid() -> Self {
        Self {
            is_valid: true,
            error: None,
        }
    }

    fn invalid(error: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            error: Some(error.into()),
        }
    }

    pub fn into_result(self) -> Result<(), String> {
        match self.error {
            Some(error) if !self.is_valid => Err(error),
            _ => Ok(()),
        }
    }
}

/// Checks run in order and the first failure is reported.
pub fn validate_login_credentials(email: &str, password: &str) -> FormValidation {
    let email = email.trim();
    let password = password.trim();

    if email.is_empty() {
        return FormValidation::invalid("Email is required");
    }
    if !is_valid_email(email) {
        return FormValidation::invalid("Please enter a valid email address");
    }
    if password.is_empty() {
        return FormValidation::invalid("Password is required");
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return FormValidation::invalid(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        ));
    }

    FormValidation::valid()
}

pub fn validate_password_change(current: &str, new: &str, confirm: &str) -> FormValidation {
    if current.is_empty() {
        return FormValidation::invalid("Current password is required");
    }
    if new.is_empty() {
        return FormValidation::invalid("New password is required");
    }
    if new.chars().count() < MIN_PASSWORD_LEN {
        return FormValidation::invalid(format!(
            "New password must be at least {MIN_PASSWORD_LEN} characters"
        ));
    }
    if confirm != new {
        return FormValidation::invalid("Passwords do not match");
    }
    if new == current {
        return FormValidation::invalid("New password must be different from current password");
    }

    FormValidation::valid()
}

fn is_valid_email(email: &str) -> bool {
    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };

    !local.is_empty() && !email.chars().any(char::is_whitespace) && domain.contains('.')
}

#[cfg(test)]
mod tests {
    use super::{validate_login_credentials, validate_password_change};

    #[test]
    fn empty_email_is_required_error() {
        let result = validate_login_credentials("", "secret123");
        assert!(!result.is_valid);
        let error = result.error.unwrap();
        assert!(error.contains("Email") && error.contains("required"));
    }

    #[test]
    fn malformed_emails_are_rejected() {
        for email in ["driver", "driver@fleet", "a@b@c.com", "@fleet.io"] {
            let result = validate_login_credentials(email, "secret123");
            assert!(result.error.unwrap().contains("valid"), "{email}");
        }
    }

    #[test]
    fn password_checks() {
        let missing = validate_login_credentials("d@fleet.io", "   ");
        let error = missing.error.unwrap();
        assert!(error.contains("Password") && error.contains("required"));

        let short = validate_login_credentials("d@fleet.io", "abc");
        assert!(short.error.unwrap().contains("6 characters"));
    }

    #[test]
    fn surrounding_whitespace_does_not_change_validity() {
        assert!(validate_login_credentials("d@fleet.io", "secret1").is_valid);
        assert!(validate_login_credentials("  d@fleet.io \n", " secret1 ").is_valid);
    }

    #[test]
    fn password_change_rules() {
        assert!(validate_password_change("old-pass", "new-pass", "new-pass").is_valid);
        assert_eq!(
            validate_password_change("", "new-pass", "new-pass").error.as_deref(),
            Some("Current password is required")
        );
        assert!(validate_password_change("old-pass", "short", "short")
            .error
            .unwrap()
            .contains("6 characters"));
        assert_eq!(
            validate_password_change("old-pass", "new-pass", "other-pass").error.as_deref(),
            Some("Passwords do not match")
        );
        assert!(!validate_password_change("same-pass", "same-pass", "same-pass").is_valid);
    }
}
