use anyhow::{anyhow, Context};
use http::StatusCode;
use serde_json::json;

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("{0} must not be empty")]
    EmptyField(String),

    #[error("Invalid email address {0:?}")]
    InvalidEmail(String),

    #[error("{field} is longer than {max} characters")]
    TooLong { field: String, max: usize },

    #[error("At most {} tags can be attached to a thread, got {0}", crate::MAX_TAGS_PER_THREAD)]
    TooManyTags(usize),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Permission denied")]
    Forbidden,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{message}")]
    Unknown { status: u16, message: String },
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_)
            | Error::EmptyField(_)
            | Error::InvalidEmail(_)
            | Error::TooLong { .. }
            | Error::TooManyTags(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Unknown { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    /// Whether the server refused the session token
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, Error::Unauthorized | Error::Forbidden)
    }

    fn name(&self) -> &'static str {
        match self {
            Error::Validation(_)
            | Error::EmptyField(_)
            | Error::InvalidEmail(_)
            | Error::TooLong { .. }
            | Error::TooManyTags(_) => "ValidationError",
            Error::Unauthorized => "UnauthorizedError",
            Error::Forbidden => "ForbiddenError",
            Error::NotFound(_) => "NotFoundError",
            Error::Unknown { .. } => "ApplicationError",
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        let details = match self {
            Error::EmptyField(field) => json!({ "field": field }),
            Error::TooLong { field, max } => json!({ "field": field, "max": max }),
            Error::InvalidEmail(email) => json!({ "email": email }),
            Error::TooManyTags(n) => json!({ "tags": n }),
            _ => json!({}),
        };
        serde_json::to_vec(&json!({
            "data": null,
            "error": {
                "status": self.status_code().as_u16(),
                "name": self.name(),
                "message": self.to_string(),
                "details": details,
            },
        }))
        .expect("serializing error envelope")
    }

    /// Recovers the error from a non-2xx response
    ///
    /// Bodies that are not an error envelope still yield an error, carrying the
    /// HTTP status only.
    pub fn parse(status: StatusCode, body: &[u8]) -> Error {
        match Self::parse_envelope(status, body) {
            Ok(err) => err,
            Err(_) => Error::Unknown {
                status: status.as_u16(),
                message: format!("HTTP error {}", status.as_u16()),
            },
        }
    }

    fn parse_envelope(status: StatusCode, body: &[u8]) -> anyhow::Result<Error> {
        let data: serde_json::Value =
            serde_json::from_slice(body).context("parsing error contents")?;
        let error = data
            .get("error")
            .ok_or_else(|| anyhow!("error envelope has no error field"))?;
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .map(String::from)
            .ok_or_else(|| anyhow!("error message is not a string"))?;
        let details = error.get("details");
        let detail = |key: &str| {
            details
                .and_then(|d| d.get(key))
                .and_then(|v| v.as_str())
                .map(String::from)
        };
        let status = error
            .get("status")
            .and_then(|s| s.as_u64())
            .and_then(|s| u16::try_from(s).ok())
            .unwrap_or(status.as_u16());
        Ok(
            match error.get("name").and_then(|n| n.as_str()).unwrap_or("") {
                "ValidationError" => match (detail("field"), detail("email")) {
                    (Some(field), None)
                        if details.and_then(|d| d.get("max")).is_none() =>
                    {
                        Error::EmptyField(field)
                    }
                    (Some(field), None) => Error::TooLong {
                        field,
                        max: details
                            .and_then(|d| d.get("max"))
                            .and_then(|m| m.as_u64())
                            .unwrap_or(0) as usize,
                    },
                    (None, Some(email)) => Error::InvalidEmail(email),
                    _ => match details.and_then(|d| d.get("tags")).and_then(|t| t.as_u64()) {
                        Some(n) => Error::TooManyTags(n as usize),
                        None => Error::Validation(message),
                    },
                },
                "UnauthorizedError" => Error::Unauthorized,
                "ForbiddenError" => Error::Forbidden,
                "NotFoundError" => Error::NotFound(message),
                _ => match status {
                    401 => Error::Unauthorized,
                    403 => Error::Forbidden,
                    _ => Error::Unknown { status, message },
                },
            },
        )
    }
}
