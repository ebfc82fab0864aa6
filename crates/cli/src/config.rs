// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use clap::Parser;

/// Realtime chat client for the Hitch ride-share platform.
#[derive(Debug, Parser)]
#[command(name = "hitch", version, about)]
pub struct Config {
    /// Base URL of the ride-share REST API.
    #[arg(long, env = "HITCH_API_URL", default_value = "http://127.0.0.1:4050/api")]
    pub api_url: String,

    /// WebSocket URL of the realtime gateway. Derived from --api-url when
    /// not set.
    #[arg(long, env = "HITCH_SOCKET_URL")]
    pub socket_url: Option<String>,

    /// Log format (json or text).
    #[arg(long, env = "HITCH_LOG_FORMAT", default_value = "json")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "HITCH_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    // -- Tuning knobs (skip from CLI; set in Config::test()) ----------------
    #[clap(skip)]
    pub http_timeout_ms: Option<u64>,
    #[clap(skip)]
    pub toast_ttl_ms: Option<u64>,
    #[clap(skip)]
    pub dedupe_window_ms: Option<u64>,
    #[clap(skip)]
    pub toast_cap: Option<usize>,
}

fn env_duration_ms(var: &str, default: u64) -> Duration {
    let ms = std::env::var(var).ok().and_then(|v| v.parse().ok()).unwrap_or(default);
    Duration::from_millis(ms)
}

macro_rules! duration_field {
    ($method:ident, $field:ident, $env:literal, $default:expr) => {
        pub fn $method(&self) -> Duration {
            match self.$field {
                Some(ms) => Duration::from_millis(ms),
                None => env_duration_ms($env, $default),
            }
        }
    };
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            anyhow::bail!("--api-url must be an http(s) URL");
        }
        if let Some(ref url) = self.socket_url {
            let schemes = ["ws://", "wss://", "http://", "https://"];
            if !schemes.iter().any(|s| url.starts_with(s)) {
                anyhow::bail!("--socket-url must be a ws(s) or http(s) URL");
            }
        }
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid log format: {other}"),
        }
        Ok(())
    }

    /// The realtime gateway URL: explicit override, or the API base with its
    /// `/api` suffix replaced by `/ws`. Scheme conversion to ws(s) happens at
    /// connect time.
    pub fn socket_url(&self) -> String {
        if let Some(ref url) = self.socket_url {
            return url.clone();
        }
        let base = self.api_url.trim_end_matches('/');
        let base = base.strip_suffix("/api").unwrap_or(base);
        format!("{base}/ws")
    }

    // -- Tuning knobs (field override → env var → compiled default) ---------

    duration_field!(http_timeout, http_timeout_ms, "HITCH_HTTP_TIMEOUT_MS", 10_000);
    duration_field!(toast_ttl, toast_ttl_ms, "HITCH_TOAST_TTL_MS", 6_000);
    duration_field!(dedupe_window, dedupe_window_ms, "HITCH_DEDUPE_WINDOW_MS", 60_000);

    /// Concurrent toast cap.
    pub fn toast_cap(&self) -> usize {
        match self.toast_cap {
            Some(cap) => cap,
            None => std::env::var("HITCH_TOAST_CAP")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(crate::toast::MAX_TOASTS),
        }
    }

    /// Build a minimal `Config` for tests.
    #[doc(hidden)]
    pub fn test() -> Self {
        Self {
            api_url: "http://127.0.0.1:0/api".into(),
            socket_url: None,
            log_format: "json".into(),
            log_level: "debug".into(),
            http_timeout_ms: Some(500),
            toast_ttl_ms: Some(100),
            dedupe_window_ms: Some(1_000),
            toast_cap: Some(3),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
