use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Per-invocation options, merged from the profile config and CLI flags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOptions {
    /// Requested credential lifetime in seconds, 0 when neither flag nor config set it
    pub session_duration: i64,

    /// Role to assume
    pub role_arn: String,

    /// Region of the STS endpoint
    pub region: String,

    /// Profile name, also the cache key
    pub profile: String,

    /// Identity provider entry URL opened in the browser
    pub idp_url: String,

    /// Audience the assertion must be addressed to
    pub audience: String,
}

/// Temporary AWS credentials returned by STS
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: DateTime<Utc>,
}

impl Credentials {
    /// Whether the credentials may still be handed to a caller at `now`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expiration
    }

    /// Expiration in the RFC 3339 form used by the output and the confirmation page
    pub fn expiration_rfc3339(&self) -> String {
        self.expiration.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

// Secret and session token stay out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

/// Validity problems found while parsing an assertion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssertionWarnings {
    /// Current time falls outside NotBefore/NotOnOrAfter
    pub invalid_time: bool,

    /// Expected audience missing from the audience restriction
    pub not_in_audience: bool,
}

/// Parsed content of a SAML assertion
#[derive(Debug, Clone, Default)]
pub struct AssertionInfo {
    pub name_id: Option<String>,

    /// Attribute name to values, values kept in document order
    pub values: HashMap<String, Vec<String>>,

    pub warnings: AssertionWarnings,
}

impl AssertionInfo {
    /// First value of an attribute, if present
    pub fn first_value(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

/// One callback's worth of SAML data
#[derive(Debug, Clone)]
pub struct SamlData {
    /// Base64 SAMLResponse exactly as posted, forwarded to STS untouched
    pub encoded_response: String,
    pub assertion: AssertionInfo,
}

/// Output shape expected from an external `credential_process`
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CredentialProcessOutput<'a> {
    pub version: u8,
    pub access_key_id: &'a str,
    pub secret_access_key: &'a str,
    pub session_token: &'a str,
    pub expiration: String,
}

impl<'a> From<&'a Credentials> for CredentialProcessOutput<'a> {
    fn from(credentials: &'a Credentials) -> Self {
        Self {
            version: 1,
            access_key_id: &credentials.access_key_id,
            secret_access_key: &credentials.secret_access_key,
            session_token: &credentials.session_token,
            expiration: credentials.expiration_rfc3339(),
        }
    }
}
