use tracing::{debug, warn};

use super::{ROLE_ATTRIBUTE, SESSION_DURATION_ATTRIBUTE};
use crate::common::{AssertionInfo, AuthOptions};
use crate::error::{AuthError, AuthResult};

/// Lifetime requested when neither the CLI nor the profile asks for one
pub const DEFAULT_SESSION_DURATION: i64 = 3600;

/// What the token exchange needs from a validated assertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedAssertion {
    pub principal_arn: String,
    pub duration_seconds: i64,
}

/// Reject assertions outside their validity window or issued for someone else
pub fn check_warnings(info: &AssertionInfo, audience: &str) -> AuthResult<()> {
    if info.warnings.invalid_time {
        return Err(AuthError::AssertionExpired);
    }
    if info.warnings.not_in_audience {
        return Err(AuthError::AudienceMismatch {
            expected: audience.to_string(),
        });
    }
    Ok(())
}

/// Principal paired with `role_arn` in the first matching role value.
///
/// Values are scanned in the order the identity provider sent them and the
/// first match wins, even if the same role appears again with another
/// principal.
pub fn resolve_principal(info: &AssertionInfo, role_arn: &str) -> AuthResult<String> {
    let roles = info
        .values
        .get(ROLE_ATTRIBUTE)
        .ok_or(AuthError::RoleAttributeMissing)?;

    for value in roles {
        debug!("Role attribute value: {}", value);
        let Some((role, principal)) = value.split_once(',') else {
            warn!("Ignoring malformed role attribute value: {}", value);
            continue;
        };
        if role.trim() == role_arn {
            return Ok(principal.trim().to_string());
        }
    }

    Err(AuthError::RoleNotAsserted {
        role_arn: role_arn.to_string(),
    })
}

/// Session duration the identity provider allows
pub fn asserted_duration(info: &AssertionInfo) -> AuthResult<i64> {
    let value = info.first_value(SESSION_DURATION_ATTRIBUTE).unwrap_or_default();
    value
        .trim()
        .parse()
        .map_err(|_| AuthError::MalformedDuration {
            value: value.to_string(),
        })
}

/// Shortest of the two lifetimes, with 0 standing for [`DEFAULT_SESSION_DURATION`]
pub fn negotiate(a: i64, b: i64) -> i64 {
    let resolve = |d: i64| if d == 0 { DEFAULT_SESSION_DURATION } else { d };
    resolve(a).min(resolve(b))
}

/// Full check of an assertion against the options of this invocation
pub fn validate(info: &AssertionInfo, options: &AuthOptions) -> AuthResult<ValidatedAssertion> {
    check_warnings(info, &options.audience)?;
    let principal_arn = resolve_principal(info, &options.role_arn)?;
    let asserted = asserted_duration(info)?;
    let duration_seconds = negotiate(asserted, options.session_duration);

    debug!(
        "Asserted duration {}s, configured {}s, requesting {}s",
        asserted, options.session_duration, duration_seconds
    );

    Ok(ValidatedAssertion {
        principal_arn,
        duration_seconds,
    })
}
