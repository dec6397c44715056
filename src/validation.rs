//! Registration payload rules enforced by the backend, mirrored here so the
//! console can check a payload and report the same messages.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

pub const USERNAME_MESSAGE: &str = "Username must contain 8-16 characters";
pub const PASSWORD_MESSAGE: &str = "Password must contain 10-12 characters";
pub const EMAIL_MESSAGE: &str = "Invalid email";

const EMAIL_PATTERN: &str = r"(?i)^[A-Z0-9_'+\-.]*[A-Z0-9_+\-]@([A-Z0-9][A-Z0-9\-]*\.)+[A-Z]{2,}$";

static EMAIL_REGEX: OnceLock<Result<Regex, ValidationFailure>> = OnceLock::new();

/// Error body returned for a rejected payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationFailure {
    #[serde(skip)]
    pub status: u16,
    pub msg: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ValidationFailure {
    fn rejected(errors: Vec<String>) -> Self {
        Self {
            status: 400,
            msg: "Validation failed".to_string(),
            success: false,
            errors,
        }
    }

    fn internal() -> Self {
        Self {
            status: 500,
            msg: "Internal server error".to_string(),
            success: false,
            errors: Vec::new(),
        }
    }
}

/// Compiles an address pattern; a bad pattern is an internal failure.
fn compile_email(pattern: &str) -> Result<Regex, ValidationFailure> {
    Regex::new(pattern).map_err(|err| {
        log::error!("email pattern failed to compile: {err}");
        ValidationFailure::internal()
    })
}

fn email_regex() -> Result<&'static Regex, ValidationFailure> {
    EMAIL_REGEX
        .get_or_init(|| compile_email(EMAIL_PATTERN))
        .as_ref()
        .map_err(Clone::clone)
}

pub fn validate_registration(payload: &Value) -> Result<(), ValidationFailure> {
    let email = email_regex()?;
    check_fields(payload, email)
}

fn check_fields(payload: &Value, email: &Regex) -> Result<(), ValidationFailure> {
    let Some(fields) = payload.as_object() else {
        return Err(ValidationFailure::rejected(vec![format!(
            "Expected object, received {}",
            type_name(payload)
        )]));
    };

    let mut errors = Vec::new();

    match string_field(fields.get("username")) {
        Ok(username) => {
            if !(8..=16).contains(&username.chars().count()) {
                errors.push(USERNAME_MESSAGE.to_string());
            }
        }
        Err(message) => errors.push(message),
    }

    match string_field(fields.get("password")) {
        Ok(password) => {
            if !(10..=12).contains(&password.chars().count()) {
                errors.push(PASSWORD_MESSAGE.to_string());
            }
        }
        Err(message) => errors.push(message),
    }

    match string_field(fields.get("college_email")) {
        Ok(address) => {
            if address.starts_with('.') || address.contains("..") || !email.is_match(address) {
                errors.push(EMAIL_MESSAGE.to_string());
            }
        }
        Err(message) => errors.push(message),
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationFailure::rejected(errors))
    }
}

fn string_field(value: Option<&Value>) -> Result<&str, String> {
    match value {
        None | Some(Value::Null) => Err("Required".to_string()),
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(format!("Expected string, received {}", type_name(other))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_well_formed_payload() {
        let payload = json!({
            "username": "averylee01",
            "password": "abcdefghij",
            "college_email": "avery.lee@campus.edu"
        });
        assert!(validate_registration(&payload).is_ok());
    }

    #[test]
    fn reports_every_failing_field_in_order() {
        let payload = json!({
            "username": "short",
            "password": "waytoolongpassword",
            "college_email": "not-an-email"
        });
        let failure = validate_registration(&payload).unwrap_err();
        assert_eq!(failure.status, 400);
        assert_eq!(
            failure.errors,
            vec![USERNAME_MESSAGE, PASSWORD_MESSAGE, EMAIL_MESSAGE]
        );
    }

    #[test]
    fn length_bounds_are_inclusive() {
        let payload = json!({
            "username": "a".repeat(16),
            "password": "p".repeat(10),
            "college_email": "x@campus.edu"
        });
        assert!(validate_registration(&payload).is_ok());

        let payload = json!({
            "username": "a".repeat(17),
            "password": "p".repeat(13),
            "college_email": "x@campus.edu"
        });
        assert_eq!(validate_registration(&payload).unwrap_err().errors.len(), 2);
    }

    #[test]
    fn missing_and_mistyped_fields() {
        let payload = json!({ "username": 12345678, "password": "abcdefghij" });
        let failure = validate_registration(&payload).unwrap_err();
        assert_eq!(
            failure.errors,
            vec!["Expected string, received number".to_string(), "Required".to_string()]
        );
    }

    #[test]
    fn rejects_dotted_edge_cases() {
        for address in [".lead@campus.edu", "two..dots@campus.edu", "me@campus"] {
            let payload = json!({
                "username": "averylee01",
                "password": "abcdefghij",
                "college_email": address
            });
            let failure = validate_registration(&payload).unwrap_err();
            assert_eq!(failure.errors, vec![EMAIL_MESSAGE], "{address}");
        }
    }

    #[test]
    fn failure_body_matches_backend_shape() {
        let failure = validate_registration(&json!({})).unwrap_err();
        let body = serde_json::to_value(&failure).unwrap();
        assert_eq!(body["msg"], "Validation failed");
        assert_eq!(body["success"], false);
        assert_eq!(body["errors"].as_array().unwrap().len(), 3);
        assert!(body.get("status").is_none());
    }

    #[test]
    fn broken_pattern_is_an_internal_failure() {
        let failure = compile_email(r"([A-Z").unwrap_err();
        assert_eq!(failure.status, 500);
        let body = serde_json::to_value(&failure).unwrap();
        assert_eq!(body, json!({"msg": "Internal server error", "success": false}));

        assert!(email_regex().is_ok());
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let failure = validate_registration(&json!("hello")).unwrap_err();
        assert_eq!(failure.status, 400);
        assert_eq!(failure.errors, vec!["Expected object, received string"]);
    }
}
