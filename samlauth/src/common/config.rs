use ini::{Ini, Properties};
use std::env;
use std::path::PathBuf;
use tracing::debug;

use super::AuthOptions;
use crate::error::{AuthError, AuthResult};

const IDP_URL_KEY: &str = "saml.idp_url";
const ROLE_ARN_KEY: &str = "saml.role_arn";
const REGION_KEY: &str = "region";
const DURATION_KEY: &str = "saml.duration";
const AUDIENCE_KEY: &str = "saml.audience";
const IDP_CONFIG_KEY: &str = "saml.idp_config";

/// Audience AWS expects for CLI sign-in assertions
pub const DEFAULT_AUDIENCE: &str = "urn:amazon:webservices:cli";

/// Settings for one profile of the AWS config file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileConfig {
    /// Identity provider entry URL
    pub idp_url: String,

    /// Role to assume
    pub role_arn: String,

    /// STS region
    pub region: String,

    /// Requested session duration in seconds
    pub duration: Option<i64>,

    /// Expected SAML audience
    pub audience: String,
}

impl ProfileConfig {
    /// Load a profile from `$AWS_CONFIG_FILE` or `~/.aws/config`
    pub fn load(profile: Option<&str>) -> AuthResult<Self> {
        let path = config_path()?;
        debug!("Reading AWS config from {}", path.display());

        let ini = Ini::load_from_file(&path).map_err(|e| {
            AuthError::configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::from_ini(&ini, profile)
    }

    /// Resolve a profile, falling back to its `saml_idp` section and then to `[default]`
    pub fn from_ini(ini: &Ini, profile: Option<&str>) -> AuthResult<Self> {
        let mut lookup = Lookup::default();

        if let Some(name) = profile.filter(|p| !p.is_empty() && *p != "default") {
            let section = format!("profile {}", name);
            let props = ini.section(Some(section.as_str())).ok_or_else(|| {
                AuthError::configuration(format!("No '[{}]' section in AWS config", section))
            })?;
            lookup.push(section, props);
        }

        let default = ini.section(Some("default"));

        // The idp reference itself may live in the profile or in [default]
        let idp_ref = lookup
            .get(IDP_CONFIG_KEY)
            .or_else(|| default.and_then(|d| d.get(IDP_CONFIG_KEY)))
            .map(str::to_string);
        if let Some(idp) = idp_ref {
            let section = format!("saml_idp {}", idp);
            let props = ini.section(Some(section.as_str())).ok_or_else(|| {
                AuthError::configuration(format!(
                    "No '[{}]' section in AWS config (referenced from '{}')",
                    section, IDP_CONFIG_KEY
                ))
            })?;
            lookup.push(section, props);
        }

        if let Some(props) = default {
            lookup.push("default".to_string(), props);
        }

        let duration = lookup.get(DURATION_KEY).and_then(|v| v.trim().parse().ok());

        Ok(Self {
            idp_url: lookup.require(IDP_URL_KEY)?,
            role_arn: lookup.require(ROLE_ARN_KEY)?,
            region: lookup.require(REGION_KEY)?,
            duration,
            audience: lookup
                .get(AUDIENCE_KEY)
                .unwrap_or(DEFAULT_AUDIENCE)
                .to_string(),
        })
    }

    /// Merge with CLI flags; a flag wins over the config file
    pub fn into_options(self, profile: &str, duration_override: Option<i64>) -> AuthOptions {
        AuthOptions {
            session_duration: duration_override.or(self.duration).unwrap_or(0),
            role_arn: self.role_arn,
            region: self.region,
            profile: profile.to_string(),
            idp_url: self.idp_url,
            audience: self.audience,
        }
    }
}

/// Ordered list of sections searched for a key
#[derive(Default)]
struct Lookup<'a> {
    sections: Vec<(String, &'a Properties)>,
}

impl<'a> Lookup<'a> {
    fn push(&mut self, name: String, props: &'a Properties) {
        self.sections.push((name, props));
    }

    fn get(&self, key: &str) -> Option<&'a str> {
        self.sections.iter().find_map(|(name, props)| {
            let props: &'a Properties = *props;
            let value = props.get(key)?;
            debug!("Found key {} in section [{}]", key, name);
            Some(value)
        })
    }

    fn require(&self, key: &str) -> AuthResult<String> {
        self.get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AuthError::configuration(format!("Configuration '{}' not found", key)))
    }
}

fn config_path() -> AuthResult<PathBuf> {
    if let Ok(path) = env::var("AWS_CONFIG_FILE") {
        return Ok(PathBuf::from(path));
    }
    dirs::home_dir()
        .map(|home| home.join(".aws").join("config"))
        .ok_or_else(|| AuthError::configuration("Could not determine home directory"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
[default]
region = eu-west-1
saml.idp_url = https://idp.example.com/default

[profile dev]
saml.role_arn = arn:aws:iam::111:role/Dev
saml.duration = 7200

[profile shared]
saml.idp_config = corp
saml.role_arn = arn:aws:iam::222:role/Shared

[saml_idp corp]
saml.idp_url = https://idp.example.com/corp
region = us-east-2
saml.audience = urn:amazon:webservices

[profile broken]
saml.idp_config = missing
"#;

    fn ini() -> Ini {
        Ini::load_from_str(CONFIG).unwrap()
    }

    #[test]
    fn test_profile_falls_back_to_default() {
        let config = ProfileConfig::from_ini(&ini(), Some("dev")).unwrap();
        assert_eq!(config.role_arn, "arn:aws:iam::111:role/Dev");
        assert_eq!(config.idp_url, "https://idp.example.com/default");
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.duration, Some(7200));
        assert_eq!(config.audience, DEFAULT_AUDIENCE);
    }

    #[test]
    fn test_idp_section_wins_over_default() {
        let config = ProfileConfig::from_ini(&ini(), Some("shared")).unwrap();
        assert_eq!(config.idp_url, "https://idp.example.com/corp");
        assert_eq!(config.region, "us-east-2");
        assert_eq!(config.audience, "urn:amazon:webservices");
        assert_eq!(config.duration, None);
    }

    #[test]
    fn test_missing_profile_section() {
        let err = ProfileConfig::from_ini(&ini(), Some("prod")).unwrap_err();
        assert!(matches!(err, AuthError::Configuration { .. }));
    }

    #[test]
    fn test_missing_idp_section() {
        let err = ProfileConfig::from_ini(&ini(), Some("broken")).unwrap_err();
        assert!(err.to_string().contains("saml_idp missing"));
    }

    #[test]
    fn test_missing_required_key() {
        // [default] alone carries no role
        let err = ProfileConfig::from_ini(&ini(), None).unwrap_err();
        assert!(err.to_string().contains(ROLE_ARN_KEY));
    }

    #[test]
    fn test_cli_duration_wins() {
        let config = ProfileConfig::from_ini(&ini(), Some("dev")).unwrap();

        let options = config.clone().into_options("dev", Some(900));
        assert_eq!(options.session_duration, 900);

        let options = config.clone().into_options("dev", None);
        assert_eq!(options.session_duration, 7200);

        let options = ProfileConfig {
            duration: None,
            ..config
        }
        .into_options("dev", None);
        assert_eq!(options.session_duration, 0);
        assert_eq!(options.profile, "dev");
    }
}
