use std::{
    env, fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{engine::DEFAULT_SHARE_CODE_TTL, errors::Error, Result};

pub const DEFAULT_REPLY_ENDPOINT: &str = "https://api.line.me/v2/bot/message/reply";
pub const DEFAULT_PUSH_ENDPOINT: &str = "https://api.line.me/v2/bot/message/push";

/// Typed configuration, read from the environment (and `.env` if present).
#[derive(Clone, Debug)]
pub struct Config {
    // Messaging platform
    pub channel_token: String,
    pub reply_endpoint: String,
    pub push_endpoint: String,

    // Storage
    pub database_url: String,
    pub database_max_connections: u32,

    // Webhook
    pub bind_addr: SocketAddr,
    pub webhook_path: String,

    // Sharing
    pub share_code_ttl: Duration,

    // Audit
    pub audit_log_path: PathBuf,
    pub audit_log_json: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let channel_token = env_str("LINE_CHANNEL_TOKEN")
            .and_then(non_empty)
            .ok_or_else(|| {
                Error::Config("LINE_CHANNEL_TOKEN environment variable is required".to_string())
            })?;
        let reply_endpoint =
            env_str("LINE_REPLY_ENDPOINT").unwrap_or_else(|| DEFAULT_REPLY_ENDPOINT.to_string());
        let push_endpoint =
            env_str("LINE_PUSH_ENDPOINT").unwrap_or_else(|| DEFAULT_PUSH_ENDPOINT.to_string());

        let database_url =
            env_str("DATABASE_URL").unwrap_or_else(|| "sqlite://shoppinglist.db".to_string());
        let database_max_connections = env_u32("DATABASE_MAX_CONNECTIONS").unwrap_or(1).max(1);

        let bind_raw = env_str("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string());
        let bind_addr = bind_raw
            .trim()
            .parse::<SocketAddr>()
            .map_err(|e| Error::Config(format!("invalid BIND_ADDR {bind_raw:?}: {e}")))?;
        let webhook_path = normalize_route(
            &env_str("WEBHOOK_PATH").unwrap_or_else(|| "/api/shoppinglist".to_string()),
        );

        let share_code_ttl = share_code_ttl(env_u64("SHARE_CODE_TTL_MINUTES"))?;

        let audit_log_path = PathBuf::from(
            env_str("AUDIT_LOG_PATH").unwrap_or("/tmp/shoppinglist-inbound.log".to_string()),
        );
        let audit_log_json = env_bool("AUDIT_LOG_JSON").unwrap_or(true);

        Ok(Self {
            channel_token,
            reply_endpoint,
            push_endpoint,
            database_url,
            database_max_connections,
            bind_addr,
            webhook_path,
            share_code_ttl,
            audit_log_path,
            audit_log_json,
        })
    }
}

fn share_code_ttl(minutes: Option<u64>) -> Result<Duration> {
    let Some(minutes) = minutes else {
        return Ok(DEFAULT_SHARE_CODE_TTL);
    };
    minutes
        .checked_mul(60)
        .filter(|secs| i64::try_from(*secs).is_ok())
        .map(Duration::from_secs)
        .ok_or_else(|| Error::Config(format!("SHARE_CODE_TTL_MINUTES too large: {minutes}")))
}

fn normalize_route(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| {
        matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
