use hyper::StatusCode;
use thiserror::Error;

/// Errors that can end a credential flow
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Could not listen on {addr}: {source}")]
    ListenerBind {
        addr: std::net::SocketAddr,
        #[source]
        source: hyper::Error,
    },

    #[error("Malformed callback request: {message}")]
    BadCallback { message: String },

    #[error("Could not parse SAML assertion: {message}")]
    AssertionParse { message: String },

    #[error("SAML assertion is outside its validity window")]
    AssertionExpired,

    #[error("SAML assertion was not issued for audience {expected}")]
    AudienceMismatch { expected: String },

    #[error("SAML assertion does not carry the role attribute")]
    RoleAttributeMissing,

    #[error("SAML assertion does not grant role {role_arn}")]
    RoleNotAsserted { role_arn: String },

    #[error("SAML session duration {value:?} is not an integer")]
    MalformedDuration { value: String },

    #[error("Could not assume role {role_arn}: {message}")]
    TokenExchange { role_arn: String, message: String },

    #[error("Credential store error: {message}")]
    Store { message: String },

    #[error("More than one credential entry found for {key}, remove the duplicates manually")]
    AmbiguousEntry { key: String },

    #[error("Could not write credentials: {source}")]
    Output {
        #[from]
        source: std::io::Error,
    },

    #[error("Serialization/deserialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },

    #[error("Callback server error: {message}")]
    Server { message: String },
}

impl AuthError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn bad_callback(message: impl Into<String>) -> Self {
        Self::BadCallback {
            message: message.into(),
        }
    }

    pub fn assertion_parse(message: impl Into<String>) -> Self {
        Self::AssertionParse {
            message: message.into(),
        }
    }

    pub fn token_exchange(role_arn: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TokenExchange {
            role_arn: role_arn.into(),
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
        }
    }

    /// Status returned to the identity provider's POST when this error ends the flow
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadCallback { .. } => StatusCode::BAD_REQUEST,
            Self::AssertionParse { .. }
            | Self::AssertionExpired
            | Self::AudienceMismatch { .. }
            | Self::RoleAttributeMissing
            | Self::RoleNotAsserted { .. }
            | Self::MalformedDuration { .. } => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assertion_failures_are_forbidden() {
        assert_eq!(AuthError::AssertionExpired.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AuthError::RoleNotAsserted {
                role_arn: "arn:aws:iam::111:role/Dev".to_string()
            }
            .status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AuthError::MalformedDuration {
                value: "soon".to_string()
            }
            .status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_exchange_failure_is_internal() {
        let err = AuthError::token_exchange("arn:aws:iam::111:role/Dev", "AccessDenied");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("AccessDenied"));
    }
}
