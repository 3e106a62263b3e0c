use std::env;

use fingertrust_engine::FailMode;

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub redis_url: String,
    pub classifier_url: String,
    /// Set the Secure attribute on session cookies (production)
    pub cookie_secure: bool,
    /// Policy for ambiguous classifier outcomes on manual login
    pub fail_mode: FailMode,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let fail_mode = match env::var("FAIL_MODE").as_deref() {
            Ok("closed") => FailMode::Closed,
            _ => FailMode::Open,
        };

        Ok(Config {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3001),
            redis_url: env::var("REDIS_URL")?,
            classifier_url: env::var("CLASSIFIER_URL")?,
            cookie_secure: env::var("COOKIE_SECURE").as_deref() == Ok("true"),
            fail_mode,
        })
    }
}
