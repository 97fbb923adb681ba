use std::io::{self, Write};

use crate::common::{CredentialProcessOutput, Credentials};
use crate::error::AuthResult;

/// Destination of the final credential document
pub trait OutputWriter: Send + Sync {
    fn write_credentials(&self, credentials: &Credentials) -> AuthResult<()>;
}

/// Serialize credentials in the `credential_process` format
pub fn render(credentials: &Credentials) -> AuthResult<String> {
    Ok(serde_json::to_string(&CredentialProcessOutput::from(credentials))?)
}

/// Writes the credential document to stdout, the only thing that ever goes there
#[derive(Debug, Clone, Default)]
pub struct CredentialProcessWriter;

impl OutputWriter for CredentialProcessWriter {
    fn write_credentials(&self, credentials: &Credentials) -> AuthResult<()> {
        let document = render(credentials)?;
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", document)?;
        stdout.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_render_credential_process_document() {
        let credentials = Credentials {
            access_key_id: "ASIAEXAMPLE".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: "token".to_string(),
            expiration: Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap(),
        };

        let value: serde_json::Value = serde_json::from_str(&render(&credentials).unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "Version": 1,
                "AccessKeyId": "ASIAEXAMPLE",
                "SecretAccessKey": "secret",
                "SessionToken": "token",
                "Expiration": "2030-01-02T03:04:05Z"
            })
        );
    }
}
