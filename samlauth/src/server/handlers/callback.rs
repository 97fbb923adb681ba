use hyper::header::{ALLOW, CONTENT_TYPE};
use hyper::{Body, Method, Request, Response, StatusCode};
use serde::Deserialize;
use std::convert::Infallible;
use tracing::{debug, error, info, instrument, warn};

use crate::common::{Credentials, SamlData};
use crate::error::{AuthError, AuthResult};
use crate::saml::validator;
use crate::server::service::CallbackService;

const SUCCESS_PAGE: &str = include_str!("../../../files/authed.html");
const DATE_PLACEHOLDER: &str = "__REPLACED_DATE_HERE__";
const PROFILE_PLACEHOLDER: &str = "__REPLACED_PROFILE_NAME_HERE__";

/// Form posted by the identity provider (HTTP-POST binding)
#[derive(Debug, Deserialize)]
struct CallbackForm {
    #[serde(rename = "SAMLResponse")]
    saml_response: Option<String>,
}

/// Confirmation page shown in the browser once credentials are issued
pub fn render_page(credentials: &Credentials, profile: &str) -> String {
    SUCCESS_PAGE
        .replace(DATE_PLACEHOLDER, &credentials.expiration_rfc3339())
        .replace(PROFILE_PLACEHOLDER, profile)
}

impl CallbackService {
    pub async fn handle_callback_request(
        &self,
        req: Request<Body>,
    ) -> Result<Response<Body>, Infallible> {
        match (req.method(), req.uri().path()) {
            (&Method::POST, "/") => Ok(self.handle_assertion_post(req).await),
            (method, "/") => {
                warn!("Rejecting {} request on the callback endpoint", method);
                Ok(Response::builder()
                    .status(StatusCode::METHOD_NOT_ALLOWED)
                    .header(ALLOW, "POST")
                    .body(Body::from("Invalid request method"))
                    .unwrap())
            }
            _ => Ok(Response::builder()
                .status(StatusCode::NOT_FOUND)
                .body(Body::from("Not Found"))
                .unwrap()),
        }
    }

    #[instrument(skip(self, req))]
    async fn handle_assertion_post(&self, req: Request<Body>) -> Response<Body> {
        debug!("Received a POST request");

        let Some(outcome) = self.claim().await else {
            warn!("Assertion already received, ignoring repeated POST");
            return Response::builder()
                .status(StatusCode::GONE)
                .body(Body::from("This sign-in callback has already been used"))
                .unwrap();
        };

        let result = self.process_assertion(req).await;
        let response = match &result {
            Ok(credentials) => {
                info!("Credentials valid until {}", credentials.expiration_rfc3339());
                Response::builder()
                    .status(StatusCode::OK)
                    .header(CONTENT_TYPE, "text/html; charset=utf-8")
                    .body(Body::from(render_page(credentials, &self.profile)))
                    .unwrap()
            }
            Err(e) => {
                error!("Authentication failed: {}", e);
                Response::builder()
                    .status(e.status_code())
                    .header(CONTENT_TYPE, "text/plain; charset=utf-8")
                    .body(Body::from(format!("Error processing authentication: {}", e)))
                    .unwrap()
            }
        };

        // The endpoint starts shutting down once this lands; the response
        // still goes out because shutdown drains in-flight connections.
        if outcome.send(result).is_err() {
            warn!("Callback outcome dropped, endpoint no longer waiting");
        }
        response
    }

    async fn process_assertion(&self, req: Request<Body>) -> AuthResult<Credentials> {
        let body = hyper::body::to_bytes(req.into_body())
            .await
            .map_err(|e| AuthError::bad_callback(format!("Could not read POST body: {}", e)))?;

        let form: CallbackForm = serde_urlencoded::from_bytes(&body)
            .map_err(|e| AuthError::bad_callback(format!("Could not parse POST form: {}", e)))?;
        let encoded = form
            .saml_response
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| AuthError::bad_callback("POST form carries no SAMLResponse"))?;

        let assertion = self.parser.parse(&encoded)?;
        validator::check_warnings(&assertion, self.parser.audience())?;

        debug!("NameID: {:?}", assertion.name_id);
        for (key, values) in &assertion.values {
            debug!("Attribute {} = {:?}", key, values);
        }

        self.handler
            .handle(SamlData {
                encoded_response: encoded,
                assertion,
            })
            .await
    }
}
