//! HTTP client factory for the site adapter and export pipeline.
//!
//! Mirrors the teacher's `service::http::create_client`: a 30-second total
//! timeout is mandatory for every outbound call (spec §5/§6).

use std::time::Duration;

use anyhow::{Context, Result};
use rquest::Client;
use rquest_util::Emulation;

#[derive(Debug, Clone, Copy)]
pub enum ClientType {
    Standard,
    HeavyEmulation,
}

pub fn create_client(client_type: ClientType) -> Result<Client> {
    let builder = Client::builder().timeout(Duration::from_secs(30));

    match client_type {
        ClientType::HeavyEmulation => builder
            .emulation(Emulation::Firefox136)
            .build()
            .context("failed to build browser-emulated rquest client"),
        ClientType::Standard => builder
            .build()
            .context("failed to build standard rquest client"),
    }
}

/// A small fixed pool of realistic desktop browser user agents, cycled per
/// request — closer to the original scraper's per-request UA randomization
/// than a single static emulation profile.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:126.0) Gecko/20100101 Firefox/126.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:126.0) Gecko/20100101 Firefox/126.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
];

/// Pick a user agent string, rotating per call.
pub fn rotate_user_agent() -> &'static str {
    use rand::Rng;
    let idx = rand::thread_rng().gen_range(0..USER_AGENTS.len());
    USER_AGENTS[idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotate_user_agent_returns_known_value() {
        let ua = rotate_user_agent();
        assert!(USER_AGENTS.contains(&ua));
    }
}
