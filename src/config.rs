//! Settings and credential loading (§6 "Environment variables consulted").
//!
//! Defaults → optional file → environment overrides, the teacher's
//! `config/io.rs` layering, collapsed into one module since this crate has
//! a single settings struct rather than the teacher's per-concern split.
//! Every `<PROVIDER>_API_KEY` lookup happens here; no other module reads
//! `std::env` directly.

use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

use crate::agent::checkpoint::{AgenticMode, SupervisedConfig};
use crate::agent::recovery::FallbackProvider;
use crate::error::{Error, Result};

const ENV_PREFIX: &str = "AGENTCORE";

/// One configured LLM provider: a base URL, its credential env var, and its
/// fallback priority (lower runs earlier).
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSettings {
    pub name: String,
    pub model: String,
    pub base_url: String,
    pub priority: u32,
}

/// Top-level settings for one agentcore instance.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSettings {
    pub default_model: String,
    pub providers: Vec<ProviderSettings>,
    pub mode: AgenticModeSetting,
    pub step_limit: u32,
    #[serde(with = "humantime_serde")]
    pub long_running_timeout: Duration,
    pub auto_escalate_on_loop: bool,
    pub tavily_api_key: Option<String>,
}

/// Wire form of [`AgenticMode`]; kept distinct so `config`'s deserializer
/// doesn't need `AgenticMode` itself to implement `Deserialize` with the
/// exact casing a settings file would use.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgenticModeSetting {
    Supervised,
    Autonomous,
    Disabled,
}

impl From<AgenticModeSetting> for AgenticMode {
    fn from(value: AgenticModeSetting) -> Self {
        match value {
            AgenticModeSetting::Supervised => AgenticMode::Supervised,
            AgenticModeSetting::Autonomous => AgenticMode::Autonomous,
            AgenticModeSetting::Disabled => AgenticMode::Disabled,
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        AgentSettings {
            default_model: "llama3.2:3b".to_string(),
            providers: vec![
                ProviderSettings {
                    name: "anthropic".to_string(),
                    model: "claude-haiku-4.5".to_string(),
                    base_url: "https://api.anthropic.com".to_string(),
                    priority: 0,
                },
                ProviderSettings {
                    name: "openai".to_string(),
                    model: "gpt-4.1-mini".to_string(),
                    base_url: "https://api.openai.com".to_string(),
                    priority: 1,
                },
                ProviderSettings {
                    name: "gemini".to_string(),
                    model: "gemini-2.5-flash".to_string(),
                    base_url: "https://generativelanguage.googleapis.com".to_string(),
                    priority: 2,
                },
                ProviderSettings {
                    name: "xai".to_string(),
                    model: "grok-4".to_string(),
                    base_url: "https://api.x.ai".to_string(),
                    priority: 3,
                },
            ],
            mode: AgenticModeSetting::Supervised,
            step_limit: 12,
            long_running_timeout: Duration::from_secs(60),
            auto_escalate_on_loop: false,
            tavily_api_key: None,
        }
    }
}

impl AgentSettings {
    /// Load settings: built-in defaults, overlaid with `agentcore.toml` if
    /// present in the working directory, overlaid with `AGENTCORE_*`
    /// environment variables. Reads `.env` first via `dotenvy` so a
    /// developer checkout picks up local credentials without exporting
    /// them into the shell.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let defaults = AgentSettings::default();
        let built = config::Config::builder()
            .set_default("default_model", defaults.default_model.clone())?
            .set_default("mode", "supervised")?
            .set_default("step_limit", defaults.step_limit)?
            .set_default("long_running_timeout", "60s")?
            .set_default("auto_escalate_on_loop", defaults.auto_escalate_on_loop)?
            .add_source(config::File::with_name("agentcore").required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let mut settings: AgentSettings = match built.try_deserialize() {
            Ok(s) => s,
            Err(_) => defaults,
        };

        settings.tavily_api_key = std::env::var("TAVILY_API_KEY").ok();
        Ok(settings)
    }

    /// The supervision policy derived from these settings, for `Agent`/
    /// `ResilientDispatcher` construction.
    pub fn supervised_config(&self) -> SupervisedConfig {
        SupervisedConfig {
            mode: self.mode.into(),
            step_limit: self.step_limit,
            checkpoint_on_loop: true,
            checkpoint_on_error: true,
            checkpoint_on_step_limit: true,
            auto_escalate_on_loop: self.auto_escalate_on_loop,
            cost_checkpoint_tokens: None,
            long_running_timeout_secs: self.long_running_timeout.as_secs(),
        }
    }

    /// Ordered fallback providers, each paired with whatever credential its
    /// `<NAME>_API_KEY` environment variable holds (absent credentials are
    /// kept in the list so `choose_fallback_provider` can skip them, not
    /// silently dropped).
    pub fn fallback_providers(&self) -> Vec<FallbackProvider> {
        self.providers
            .iter()
            .map(|p| FallbackProvider {
                name: p.name.clone(),
                model: p.model.clone(),
                credential: provider_credential(&p.name),
                priority: p.priority,
            })
            .collect()
    }

    /// Look up one provider's credential as a `SecretString`, erroring if
    /// the caller requires it but it is unset.
    pub fn require_credential(&self, provider_name: &str) -> Result<SecretString> {
        provider_credential(provider_name)
            .map(SecretString::from)
            .ok_or_else(|| Error::MissingCredential(format!("{}_API_KEY", provider_name.to_uppercase())))
    }
}

fn provider_credential(provider_name: &str) -> Option<String> {
    std::env::var(format!("{}_API_KEY", provider_name.to_uppercase())).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_name_the_four_documented_providers() {
        let settings = AgentSettings::default();
        let names: Vec<&str> = settings.providers.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["anthropic", "openai", "gemini", "xai"]);
    }

    #[test]
    fn supervised_config_carries_step_limit_and_timeout() {
        let settings = AgentSettings::default();
        let supervised = settings.supervised_config();
        assert_eq!(supervised.step_limit, 12);
        assert_eq!(supervised.long_running_timeout_secs, 60);
    }

    #[test]
    fn missing_credential_produces_missing_credential_error() {
        std::env::remove_var("DOES_NOT_EXIST_PROVIDER_API_KEY");
        let settings = AgentSettings::default();
        let result = settings.require_credential("does_not_exist_provider");
        assert!(matches!(result, Err(Error::MissingCredential(_))));
    }
}
