use std::env;

use telematics_common::env_or;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 1024 * 1024;

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub port: u16,
    pub public_url: Option<String>,
    pub body_limit_bytes: Option<usize>, // None = unlimited
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        let public_url = env::var("PUBLIC_URL")
            .ok()
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty());
        let body_limit = env_or("BODY_LIMIT_BYTES", DEFAULT_BODY_LIMIT_BYTES);

        Self {
            port: env_or("PORT", DEFAULT_PORT),
            public_url,
            body_limit_bytes: (body_limit > 0).then_some(body_limit),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            public_url: None,
            body_limit_bytes: Some(DEFAULT_BODY_LIMIT_BYTES),
        }
    }
}
