//! SAML assertion handling: parsing the posted response and deciding whether
//! it entitles the caller to the configured role.

pub mod parser;
pub mod validator;

pub use parser::AssertionParser;
pub use validator::validate;

/// Multi-valued attribute of `roleARN,principalARN` pairs
pub const ROLE_ATTRIBUTE: &str = "https://aws.amazon.com/SAML/Attributes/Role";

/// Maximum session length granted by the identity provider, in seconds
pub const SESSION_DURATION_ATTRIBUTE: &str = "https://aws.amazon.com/SAML/Attributes/SessionDuration";
