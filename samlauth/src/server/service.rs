use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};

use super::AssertionHandler;
use crate::common::Credentials;
use crate::error::AuthResult;
use crate::saml::AssertionParser;

pub type OutcomeSender = oneshot::Sender<AuthResult<Credentials>>;

/// State shared by every connection of one callback server
#[derive(Clone)]
pub struct CallbackService {
    pub profile: String,
    pub parser: AssertionParser,
    pub handler: Arc<dyn AssertionHandler>,
    // Single-use: the first POST takes the sender, later ones find None
    outcome: Arc<Mutex<Option<OutcomeSender>>>,
}

impl CallbackService {
    pub fn new(
        profile: String,
        parser: AssertionParser,
        handler: Arc<dyn AssertionHandler>,
        outcome: OutcomeSender,
    ) -> Self {
        Self {
            profile,
            parser,
            handler,
            outcome: Arc::new(Mutex::new(Some(outcome))),
        }
    }

    /// Claim the right to process an assertion; succeeds at most once
    pub async fn claim(&self) -> Option<OutcomeSender> {
        self.outcome.lock().await.take()
    }
}
