// dbbot/crates/dbbot/src/config.rs

use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::database::ConnectOptions;
use crate::session::ContextPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub cohere_api_key: Option<String>,
    pub cohere_base_url: String,
    pub cohere_model: Option<String>,
    pub llm_temperature: f32,
    pub llm_timeout_seconds: u64,
    pub api_host: String,
    pub api_port: u16,
    pub max_query_attempts: usize,
    pub memory_window_turns: usize,
    pub prompt_history_turns: usize,
    pub schema_sample_rows: usize,
    pub connect_timeout_seconds: u64,
    pub query_timeout_seconds: u64,
    pub request_timeout_seconds: u64,
    pub clear_stale_context: bool,
    pub session_idle_timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cohere_api_key: None,
            cohere_base_url: "https://api.cohere.ai".to_string(),
            cohere_model: None,
            llm_temperature: 0.1,
            llm_timeout_seconds: 60,
            api_host: "127.0.0.1".to_string(),
            api_port: 5879,
            max_query_attempts: 2,
            memory_window_turns: 4,
            prompt_history_turns: 2,
            schema_sample_rows: 3,
            connect_timeout_seconds: 10,
            query_timeout_seconds: 30,
            request_timeout_seconds: 240,
            clear_stale_context: false,
            session_idle_timeout_seconds: 3600,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            warn!("Failed to load .env file: {}. Using system environment variables.", e);
        } else {
            info!("Loaded environment variables from .env file");
        }

        let defaults = Self::default();

        // A missing key is not fatal here; the LLM client reports it as a configuration error.
        let cohere_api_key = env::var("COHERE_API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        let max_query_attempts: usize = parse_var("MAX_QUERY_ATTEMPTS", defaults.max_query_attempts)?;
        if max_query_attempts == 0 {
            return Err(anyhow::anyhow!("MAX_QUERY_ATTEMPTS must be at least 1"));
        }

        let memory_window_turns: usize = parse_var("MEMORY_WINDOW_TURNS", defaults.memory_window_turns)?;
        let prompt_history_turns: usize = parse_var("PROMPT_HISTORY_TURNS", defaults.prompt_history_turns)?;
        if prompt_history_turns > memory_window_turns {
            warn!(
                "PROMPT_HISTORY_TURNS ({}) exceeds MEMORY_WINDOW_TURNS ({}); only {} turns are kept",
                prompt_history_turns, memory_window_turns, memory_window_turns
            );
        }

        Ok(Self {
            cohere_api_key,
            cohere_base_url: env::var("COHERE_BASE_URL")
                .unwrap_or(defaults.cohere_base_url)
                .trim_end_matches('/')
                .to_string(),
            cohere_model: env::var("COHERE_MODEL").ok().filter(|m| !m.is_empty()),
            llm_temperature: parse_var("LLM_TEMPERATURE", defaults.llm_temperature)?,
            llm_timeout_seconds: parse_var("LLM_TIMEOUT_SECONDS", defaults.llm_timeout_seconds)?,
            api_host: env::var("API_HOST").unwrap_or(defaults.api_host),
            api_port: parse_var("API_PORT", defaults.api_port)?,
            max_query_attempts,
            memory_window_turns,
            prompt_history_turns,
            schema_sample_rows: parse_var("SCHEMA_SAMPLE_ROWS", defaults.schema_sample_rows)?,
            connect_timeout_seconds: parse_var("CONNECT_TIMEOUT_SECONDS", defaults.connect_timeout_seconds)?,
            query_timeout_seconds: parse_var("QUERY_TIMEOUT_SECONDS", defaults.query_timeout_seconds)?,
            request_timeout_seconds: parse_var("REQUEST_TIMEOUT_SECONDS", defaults.request_timeout_seconds)?,
            clear_stale_context: parse_var("CLEAR_STALE_CONTEXT", defaults.clear_stale_context)?,
            session_idle_timeout_seconds: parse_var(
                "SESSION_IDLE_TIMEOUT_SECONDS",
                defaults.session_idle_timeout_seconds,
            )?,
        })
    }

    pub fn print_config(&self) {
        info!("Current Configuration:");
        info!(
            "- Cohere API Key: {}",
            if self.cohere_api_key.is_some() { "set" } else { "NOT SET" }
        );
        info!("- Cohere Base URL: {}", self.cohere_base_url);
        info!("- Cohere Model: {}", self.cohere_model.as_deref().unwrap_or("(server default)"));
        info!("- LLM Temperature: {}", self.llm_temperature);
        info!("- LLM Timeout: {}s", self.llm_timeout_seconds);
        info!("- API: {}:{}", self.api_host, self.api_port);
        info!("- Max Query Attempts: {}", self.max_query_attempts);
        info!("- Memory Window: {} turns ({} in prompts)", self.memory_window_turns, self.prompt_history_turns);
        info!("- Schema Sample Rows: {}", self.schema_sample_rows);
        info!("- Connect Timeout: {}s", self.connect_timeout_seconds);
        info!("- Query Timeout: {}s", self.query_timeout_seconds);
        info!("- Request Timeout: {}s", self.request_timeout_seconds);
        info!("- Clear Stale Follow-up Context: {}", self.clear_stale_context);
        match self.session_idle_timeout() {
            Some(ttl) => info!("- Session Idle Timeout: {}s", ttl.as_secs()),
            None => info!("- Session Idle Timeout: disabled"),
        }
    }

    pub fn api_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.api_host, self.api_port)
            .parse()
            .with_context(|| format!("Invalid API address {}:{}", self.api_host, self.api_port))
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// `None` when idle sessions are kept forever.
    pub fn session_idle_timeout(&self) -> Option<Duration> {
        (self.session_idle_timeout_seconds > 0).then(|| Duration::from_secs(self.session_idle_timeout_seconds))
    }

    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            connect_timeout: self.connect_timeout(),
            statement_timeout: self.query_timeout(),
        }
    }

    pub fn context_policy(&self) -> ContextPolicy {
        if self.clear_stale_context {
            ContextPolicy::ClearOnMismatch
        } else {
            ContextPolicy::PersistUntilReplaced
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {:?} ({})", name, raw, e)),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> Config {
        Config {
            cohere_api_key: Some("test-key".to_string()),
            cohere_base_url: "http://127.0.0.1:9999".to_string(),
            ..Config::default()
        }
    }

    // ===== Default Value Tests =====

    #[test]
    fn test_default_port_matches_chat_window() {
        let config = Config::default();
        assert_eq!(config.api_host, "127.0.0.1");
        assert_eq!(config.api_port, 5879);
    }

    #[test]
    fn test_default_repair_bound_is_two_attempts() {
        assert_eq!(Config::default().max_query_attempts, 2);
    }

    #[test]
    fn test_default_history_fits_in_memory_window() {
        let config = Config::default();
        assert!(config.prompt_history_turns <= config.memory_window_turns);
        assert_eq!(config.prompt_history_turns, 2);
    }

    #[test]
    fn test_default_keeps_follow_up_context() {
        assert!(!Config::default().clear_stale_context);
    }

    #[test]
    fn test_context_policy_follows_flag() {
        let mut config = create_test_config();
        assert_eq!(config.context_policy(), ContextPolicy::PersistUntilReplaced);
        config.clear_stale_context = true;
        assert_eq!(config.context_policy(), ContextPolicy::ClearOnMismatch);
    }

    #[test]
    fn test_default_has_no_api_key() {
        assert!(Config::default().cohere_api_key.is_none());
    }

    // ===== API Address Tests =====

    #[test]
    fn test_api_addr_parsing() {
        let config = create_test_config();
        let addr = config.api_addr().unwrap();

        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 5879);
    }

    #[test]
    fn test_api_addr_rejects_hostname() {
        let mut config = create_test_config();
        config.api_host = "not a host".to_string();
        assert!(config.api_addr().is_err());
    }

    // ===== Timeout Tests =====

    #[test]
    fn test_timeouts_are_positive() {
        let config = create_test_config();
        assert!(config.llm_timeout() > Duration::ZERO);
        assert!(config.connect_timeout() > Duration::ZERO);
        assert!(config.query_timeout() > Duration::ZERO);
    }

    #[test]
    fn test_connect_options_carry_timeouts() {
        let options = create_test_config().connect_options();
        assert_eq!(options.connect_timeout, Duration::from_secs(10));
        assert_eq!(options.statement_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_session_idle_timeout_zero_disables_eviction() {
        let mut config = create_test_config();
        assert_eq!(config.session_idle_timeout(), Some(Duration::from_secs(3600)));
        config.session_idle_timeout_seconds = 0;
        assert_eq!(config.session_idle_timeout(), None);
    }

    #[test]
    fn test_request_timeout_covers_a_full_turn() {
        let config = create_test_config();
        let worst_case = config.connect_timeout()
            + (config.llm_timeout() + config.query_timeout()) * config.max_query_attempts as u32;
        assert!(config.request_timeout() >= worst_case);
    }

    // ===== Parsing Tests =====

    #[test]
    fn test_parse_var_uses_default_when_unset() {
        let value: u16 = parse_var("DBBOT_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        env::set_var("DBBOT_TEST_GARBAGE_PORT", "eighty");
        let result: Result<u16> = parse_var("DBBOT_TEST_GARBAGE_PORT", 80);
        env::remove_var("DBBOT_TEST_GARBAGE_PORT");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_var_reads_booleans() {
        env::set_var("DBBOT_TEST_BOOL", "true");
        let value: bool = parse_var("DBBOT_TEST_BOOL", false).unwrap();
        env::remove_var("DBBOT_TEST_BOOL");
        assert!(value);
    }
}
