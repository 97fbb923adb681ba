use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use roxmltree::{Document, Node};
use tracing::debug;

use crate::common::{AssertionInfo, AssertionWarnings};
use crate::error::{AuthError, AuthResult};

const STATUS_SUCCESS: &str = "urn:oasis:names:tc:SAML:2.0:status:Success";

/// Turns a posted `SAMLResponse` into [`AssertionInfo`].
///
/// The XML signature is not checked. Time and audience problems do not fail
/// parsing; they are reported through [`AssertionWarnings`] so the caller
/// decides how to reject them.
#[derive(Debug, Clone)]
pub struct AssertionParser {
    audience: String,
}

impl AssertionParser {
    pub fn new(audience: impl Into<String>) -> Self {
        Self {
            audience: audience.into(),
        }
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    pub fn parse(&self, encoded: &str) -> AuthResult<AssertionInfo> {
        self.parse_at(encoded, Utc::now())
    }

    pub fn parse_at(&self, encoded: &str, now: DateTime<Utc>) -> AuthResult<AssertionInfo> {
        // Some IdPs wrap the base64 text
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        let raw = STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| AuthError::assertion_parse(format!("invalid base64: {}", e)))?;
        let xml = String::from_utf8(raw)
            .map_err(|e| AuthError::assertion_parse(format!("invalid UTF-8: {}", e)))?;
        let doc = Document::parse(&xml)
            .map_err(|e| AuthError::assertion_parse(format!("invalid XML: {}", e)))?;

        check_status(&doc)?;

        let assertion = doc
            .descendants()
            .find(|n| is_element(n, "Assertion"))
            .ok_or_else(|| {
                if doc.descendants().any(|n| is_element(&n, "EncryptedAssertion")) {
                    AuthError::assertion_parse("encrypted assertions are not supported")
                } else {
                    AuthError::assertion_parse("response carries no assertion")
                }
            })?;

        let name_id = assertion
            .descendants()
            .find(|n| is_element(n, "NameID"))
            .and_then(|n| n.text())
            .map(|t| t.trim().to_string());

        let mut info = AssertionInfo {
            name_id,
            ..Default::default()
        };

        for attribute in assertion.descendants().filter(|n| is_element(n, "Attribute")) {
            let Some(name) = attribute.attribute("Name") else {
                continue;
            };
            let values = attribute
                .children()
                .filter(|n| is_element(n, "AttributeValue"))
                .map(|n| n.text().unwrap_or_default().trim().to_string());
            info.values.entry(name.to_string()).or_default().extend(values);
        }

        info.warnings = self.warnings(&assertion, now)?;
        debug!(
            "Parsed assertion for {:?} with {} attributes, warnings: {:?}",
            info.name_id,
            info.values.len(),
            info.warnings
        );

        Ok(info)
    }

    fn warnings(&self, assertion: &Node, now: DateTime<Utc>) -> AuthResult<AssertionWarnings> {
        let Some(conditions) = assertion.children().find(|n| is_element(n, "Conditions")) else {
            return Ok(AssertionWarnings {
                invalid_time: false,
                not_in_audience: true,
            });
        };

        let not_before = timestamp(&conditions, "NotBefore")?;
        let not_on_or_after = timestamp(&conditions, "NotOnOrAfter")?;
        let invalid_time = not_before.map_or(false, |t| now < t)
            || not_on_or_after.map_or(false, |t| now >= t);

        let in_audience = conditions
            .descendants()
            .filter(|n| is_element(n, "Audience"))
            .filter_map(|n| n.text())
            .any(|aud| aud.trim() == self.audience);

        Ok(AssertionWarnings {
            invalid_time,
            not_in_audience: !in_audience,
        })
    }
}

fn is_element(node: &Node, local_name: &str) -> bool {
    node.is_element() && node.tag_name().name() == local_name
}

fn timestamp(node: &Node, attr: &str) -> AuthResult<Option<DateTime<Utc>>> {
    node.attribute(attr)
        .map(|value| {
            DateTime::parse_from_rfc3339(value)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| AuthError::assertion_parse(format!("invalid {} {:?}: {}", attr, value, e)))
        })
        .transpose()
}

fn check_status(doc: &Document) -> AuthResult<()> {
    let status = doc
        .descendants()
        .find(|n| is_element(n, "StatusCode"))
        .and_then(|n| n.attribute("Value"));
    match status {
        Some(value) if value != STATUS_SUCCESS => Err(AuthError::assertion_parse(format!(
            "identity provider returned status {}",
            value
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::saml::{ROLE_ATTRIBUTE, SESSION_DURATION_ATTRIBUTE};
    use chrono::{Duration, SecondsFormat};

    pub(crate) const AUDIENCE: &str = "urn:amazon:webservices:cli";

    /// Builds a base64 SAMLResponse valid around `now`
    pub(crate) fn encoded_response(
        now: DateTime<Utc>,
        audience: &str,
        roles: &[&str],
        session_duration: Option<&str>,
    ) -> String {
        let fmt = |t: DateTime<Utc>| t.to_rfc3339_opts(SecondsFormat::Secs, true);
        let role_values: String = roles
            .iter()
            .map(|r| format!("<saml:AttributeValue>{}</saml:AttributeValue>", r))
            .collect();
        let duration = session_duration
            .map(|d| {
                format!(
                    r#"<saml:Attribute Name="{}"><saml:AttributeValue>{}</saml:AttributeValue></saml:Attribute>"#,
                    SESSION_DURATION_ATTRIBUTE, d
                )
            })
            .unwrap_or_default();
        let xml = format!(
            r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion">
  <samlp:Status><samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Success"/></samlp:Status>
  <saml:Assertion>
    <saml:Subject><saml:NameID>jane@example.com</saml:NameID></saml:Subject>
    <saml:Conditions NotBefore="{}" NotOnOrAfter="{}">
      <saml:AudienceRestriction><saml:Audience>{}</saml:Audience></saml:AudienceRestriction>
    </saml:Conditions>
    <saml:AttributeStatement>
      <saml:Attribute Name="{}">{}</saml:Attribute>
      {}
    </saml:AttributeStatement>
  </saml:Assertion>
</samlp:Response>"#,
            fmt(now - Duration::minutes(5)),
            fmt(now + Duration::minutes(5)),
            audience,
            ROLE_ATTRIBUTE,
            role_values,
            duration
        );
        STANDARD.encode(xml)
    }

    #[test]
    fn test_parse_valid_response() {
        let now = Utc::now();
        let encoded = encoded_response(
            now,
            AUDIENCE,
            &["arn:aws:iam::111:role/A,arn:aws:iam::111:saml-provider/X", "arn:aws:iam::111:role/B,arn:aws:iam::111:saml-provider/X"],
            Some("7200"),
        );

        let info = AssertionParser::new(AUDIENCE).parse_at(&encoded, now).unwrap();

        assert_eq!(info.name_id.as_deref(), Some("jane@example.com"));
        assert_eq!(info.warnings, AssertionWarnings::default());
        assert_eq!(info.first_value(SESSION_DURATION_ATTRIBUTE), Some("7200"));
        let roles = &info.values[ROLE_ATTRIBUTE];
        assert_eq!(roles.len(), 2);
        assert!(roles[0].starts_with("arn:aws:iam::111:role/A"));
        assert!(roles[1].starts_with("arn:aws:iam::111:role/B"));
    }

    #[test]
    fn test_time_window_outside() {
        let issued = Utc::now() - Duration::hours(1);
        let encoded = encoded_response(issued, AUDIENCE, &[], None);

        let info = AssertionParser::new(AUDIENCE).parse(&encoded).unwrap();
        assert!(info.warnings.invalid_time);
        assert!(!info.warnings.not_in_audience);
    }

    #[test]
    fn test_audience_mismatch() {
        let now = Utc::now();
        let encoded = encoded_response(now, "urn:example:other", &[], None);

        let info = AssertionParser::new(AUDIENCE).parse_at(&encoded, now).unwrap();
        assert!(info.warnings.not_in_audience);
        assert!(!info.warnings.invalid_time);
    }

    #[test]
    fn test_wrapped_base64_is_accepted() {
        let now = Utc::now();
        let encoded = encoded_response(now, AUDIENCE, &[], None);
        let wrapped: String = encoded
            .as_bytes()
            .chunks(76)
            .map(|c| format!("{}\r\n", std::str::from_utf8(c).unwrap()))
            .collect();

        assert!(AssertionParser::new(AUDIENCE).parse_at(&wrapped, now).is_ok());
    }

    #[test]
    fn test_rejects_garbage() {
        let parser = AssertionParser::new(AUDIENCE);

        let err = parser.parse("%%%not-base64%%%").unwrap_err();
        assert!(matches!(err, AuthError::AssertionParse { .. }));

        let err = parser.parse(&STANDARD.encode("<unclosed>")).unwrap_err();
        assert!(matches!(err, AuthError::AssertionParse { .. }));

        let err = parser.parse(&STANDARD.encode("<Response/>")).unwrap_err();
        assert!(err.to_string().contains("no assertion"));
    }

    #[test]
    fn test_rejects_failed_status() {
        let xml = r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol">
  <samlp:Status><samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Requester"/></samlp:Status>
</samlp:Response>"#;

        let err = AssertionParser::new(AUDIENCE)
            .parse(&STANDARD.encode(xml))
            .unwrap_err();
        assert!(err.to_string().contains("status:Requester"));
    }
}
