// src/config/mod.rs
// All tunables load from the environment (or .env) with defaults.

use once_cell::sync::Lazy;
use serde::Deserialize;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct CoachConfig {
    // ── Provider API keys (absent key = provider not configured)
    pub groq_api_key: Option<String>,
    pub cerebras_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_api_key_fallback: Option<String>,
    pub openrouter_api_key: Option<String>,
    pub openrouter_api_key_fallback: Option<String>,
    pub openai_api_key: Option<String>,
    pub perplexity_api_key: Option<String>,

    // ── Model selection
    pub groq_model: String,
    pub cerebras_model: String,
    pub gemini_model: String,
    pub openai_models: String,
    pub perplexity_models: String,
    pub openrouter_models: String,

    // ── Gateway tuning
    pub provider_timeout_secs: u64,
    pub race_timeout_secs: u64,
    pub provider_max_retries: u32,
    pub max_output_tokens: u32,

    // ── Grammar collaborator
    pub languagetool_url: String,
    pub grammar_enabled: bool,

    // ── Database
    pub database_url: String,
    pub sqlite_max_connections: u32,

    // ── Server
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,

    // ── Logging
    pub log_level: String,
}

fn env_var_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(val) => {
            let clean_val = val.split('#').next().unwrap_or("").trim();
            match clean_val.parse::<T>() {
                Ok(parsed) => parsed,
                Err(_) => {
                    eprintln!("Config: {} = '{}' (parse failed, using default)", key, val);
                    default
                }
            }
        }
        Err(_) => default,
    }
}

fn env_var_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl CoachConfig {
    pub fn from_env() -> Self {
        if dotenvy::dotenv().is_err() {
            eprintln!("Warning: .env file not found. Using environment variables and defaults.");
        }

        Self {
            groq_api_key: env_var_opt("GROQ_API_KEY"),
            cerebras_api_key: env_var_opt("CEREBRAS_API_KEY"),
            gemini_api_key: env_var_opt("GEMINI_API_KEY"),
            gemini_api_key_fallback: env_var_opt("GEMINI_API_KEY_FALLBACK"),
            openrouter_api_key: env_var_opt("OPENROUTER_API_KEY"),
            openrouter_api_key_fallback: env_var_opt("OPENROUTER_API_KEY_FALLBACK"),
            openai_api_key: env_var_opt("OPENAI_API_KEY"),
            perplexity_api_key: env_var_opt("PERPLEXITY_API_KEY"),

            groq_model: env_var_or("GROQ_MODEL", "llama-3.3-70b-versatile".to_string()),
            cerebras_model: env_var_or("CEREBRAS_MODEL", "llama-3.3-70b".to_string()),
            gemini_model: env_var_or("GEMINI_MODEL", "gemini-2.0-flash-exp".to_string()),
            openai_models: env_var_or("OPENAI_MODELS", "gpt-4o-mini,gpt-3.5-turbo".to_string()),
            perplexity_models: env_var_or(
                "PERPLEXITY_MODELS",
                "llama-3.1-sonar-small-128k-online,llama-3.1-sonar-large-128k-online,sonar"
                    .to_string(),
            ),
            openrouter_models: env_var_or(
                "OPENROUTER_MODELS",
                "google/gemini-2.0-flash-exp:free,tngtech/tng-r1t-chimera:free,meta-llama/llama-3.1-70b-instruct:free"
                    .to_string(),
            ),

            provider_timeout_secs: env_var_or("PROVIDER_TIMEOUT_SECS", 30),
            race_timeout_secs: env_var_or("RACE_TIMEOUT_SECS", 15),
            provider_max_retries: env_var_or("PROVIDER_MAX_RETRIES", 3),
            max_output_tokens: env_var_or("MAX_OUTPUT_TOKENS", 2000),

            languagetool_url: env_var_or(
                "LANGUAGETOOL_URL",
                "https://api.languagetool.org/v2/check".to_string(),
            ),
            grammar_enabled: env_var_or("GRAMMAR_ENABLED", true),

            database_url: env_var_or("DATABASE_URL", "sqlite:./interviewiq.db".to_string()),
            sqlite_max_connections: env_var_or("SQLITE_MAX_CONNECTIONS", 5),

            host: env_var_or("IIQ_HOST", "0.0.0.0".to_string()),
            port: env_var_or("IIQ_PORT", 8000),
            request_timeout_secs: env_var_or("REQUEST_TIMEOUT_SECS", 120),

            log_level: env_var_or("IIQ_LOG_LEVEL", "info".to_string()),
        }
    }

    /// Get server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Split a comma-separated model list from config
    pub fn model_list(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect()
    }
}

// Global config instance - loaded once at startup
pub static CONFIG: Lazy<CoachConfig> = Lazy::new(CoachConfig::from_env);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = CoachConfig::from_env();

        assert_eq!(config.groq_model, "llama-3.3-70b-versatile");
        assert_eq!(config.race_timeout_secs, 15);
        assert_eq!(config.max_output_tokens, 2000);
    }

    #[test]
    fn test_bind_address() {
        let config = CoachConfig::from_env();
        assert!(config.bind_address().contains(':'));
    }

    #[test]
    fn test_model_list_parsing() {
        let models = CoachConfig::model_list("a, b ,c,,");
        assert_eq!(models, vec!["a", "b", "c"]);
    }
}
