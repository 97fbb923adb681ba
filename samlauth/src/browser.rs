use tracing::{info, warn};

/// Opens the identity provider's sign-in page for the user
pub trait BrowserLauncher: Send + Sync {
    fn open(&self, url: &str);
}

/// Launcher using the platform's default browser
#[derive(Debug, Clone, Default)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) {
        info!("Opening URL {}", url);
        if let Err(e) = open::that(url) {
            warn!("Could not launch a browser: {}", e);
            eprintln!("Open this URL in your browser to sign in:\n  {}", url);
        }
    }
}
