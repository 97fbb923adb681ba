use clap::Parser;

use crate::store::CacheBackend;

#[derive(Parser, Debug, Clone)]
pub struct LoginCommand {
    /// AWS config profile to fetch credentials for
    #[arg(default_value = "default")]
    pub profile: String,

    /// Loopback port the identity provider posts the SAML response to
    #[arg(short, long, env = "SAMLAUTH_PORT", default_value = "35002")]
    pub port: u16,

    /// Where issued credentials are cached between runs
    #[arg(
        short,
        long,
        value_enum,
        env = "SAMLAUTH_CACHE",
        default_value = "keychain"
    )]
    pub cache: CacheBackend,

    /// Requested session duration in seconds, overrides saml.duration
    #[arg(long, value_parser = clap::value_parser!(i64).range(900..=43200))]
    pub duration: Option<i64>,

    /// Discard cached credentials and sign in again
    #[arg(long)]
    pub refresh: bool,
}
