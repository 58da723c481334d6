use anyhow::Result;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::agents::relevance::DrainPolicy;
use crate::types::LLMProvider;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LLMConfig,
    pub search: SearchConfig,
    pub knowledge: KnowledgeConfig,
    pub research: ResearchConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LLMConfig {
    pub provider: LLMProvider,
    pub openai_api_key: String,
    pub openrouter_api_key: String,
    pub groq_api_key: String,
    pub base_url: Option<String>,
    /// Model used for planning, evaluation, extraction and the tool loop
    pub research_model: String,
    /// Model used for the final report
    pub report_model: String,
    pub timeout_secs: u64,
}

impl LLMConfig {
    /// API key of the selected provider, if one is configured
    pub fn active_api_key(&self) -> Option<String> {
        let key = match self.provider {
            LLMProvider::OpenAI => &self.openai_api_key,
            LLMProvider::OpenRouter => &self.openrouter_api_key,
            LLMProvider::Groq => &self.groq_api_key,
        };
        if key.is_empty() {
            None
        } else {
            Some(key.clone())
        }
    }

    pub fn base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.provider.default_base_url().to_string())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchConfig {
    pub exa_api_key: String,
    pub exa_base_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KnowledgeConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_num_results: u32,
    /// Language the knowledge base answers in
    pub output_language: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResearchConfig {
    pub max_tool_steps: usize,
    pub drain_policy: DrainPolicy,
    pub call_timeout_secs: u64,
    pub report_output_path: Option<PathBuf>,
}

impl ResearchConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_tool_steps: 7,
            drain_policy: DrainPolicy::Latest,
            call_timeout_secs: 180,
            report_output_path: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let openai_api_key = env::var("OPENAI_API_KEY").unwrap_or_default();

        Ok(Self {
            server: ServerConfig {
                port: env::var("PORT")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()?,
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                cors_allowed_origins: env::var("ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            llm: LLMConfig {
                provider: env::var("LLM_PROVIDER")
                    .unwrap_or_else(|_| "openai".to_string())
                    .parse()?,
                openai_api_key: openai_api_key.clone(),
                openrouter_api_key: env::var("OPENROUTER_API_KEY").unwrap_or_default(),
                groq_api_key: env::var("GROQ_API_KEY").unwrap_or_default(),
                base_url: env::var("LLM_BASE_URL").ok().filter(|s| !s.is_empty()),
                research_model: env::var("RESEARCH_LLM_MODEL")
                    .unwrap_or_else(|_| "gpt-4.1-mini".to_string()),
                report_model: env::var("REPORT_LLM_MODEL")
                    .unwrap_or_else(|_| "o3-mini".to_string()),
                timeout_secs: env::var("LLM_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "120".to_string())
                    .parse()?,
            },
            search: SearchConfig {
                exa_api_key: env::var("EXA_API_KEY").unwrap_or_default(),
                exa_base_url: env::var("EXA_BASE_URL")
                    .unwrap_or_else(|_| "https://api.exa.ai".to_string()),
            },
            knowledge: KnowledgeConfig {
                api_key: openai_api_key,
                base_url: env::var("KNOWLEDGE_BASE_URL")
                    .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
                model: env::var("KNOWLEDGE_MODEL").unwrap_or_else(|_| "gpt-4.1".to_string()),
                max_num_results: env::var("KNOWLEDGE_MAX_RESULTS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()?,
                output_language: env::var("APP_LANG").unwrap_or_else(|_| "en".to_string()),
            },
            research: ResearchConfig {
                max_tool_steps: env::var("RESEARCH_MAX_TOOL_STEPS")
                    .unwrap_or_else(|_| "7".to_string())
                    .parse()?,
                drain_policy: env::var("RESEARCH_DRAIN_POLICY")
                    .unwrap_or_else(|_| "latest".to_string())
                    .parse()?,
                call_timeout_secs: env::var("RESEARCH_CALL_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "180".to_string())
                    .parse()?,
                report_output_path: env::var("REPORT_OUTPUT_PATH")
                    .ok()
                    .filter(|s| !s.is_empty())
                    .map(PathBuf::from),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn llm_config(provider: LLMProvider) -> LLMConfig {
        LLMConfig {
            provider,
            openai_api_key: "sk-openai".to_string(),
            openrouter_api_key: String::new(),
            groq_api_key: "gsk-groq".to_string(),
            base_url: None,
            research_model: "gpt-4.1-mini".to_string(),
            report_model: "o3-mini".to_string(),
            timeout_secs: 30,
        }
    }

    #[test]
    fn test_active_api_key_follows_provider() {
        assert_eq!(
            llm_config(LLMProvider::OpenAI).active_api_key().as_deref(),
            Some("sk-openai")
        );
        assert_eq!(
            llm_config(LLMProvider::Groq).active_api_key().as_deref(),
            Some("gsk-groq")
        );
        assert!(llm_config(LLMProvider::OpenRouter).active_api_key().is_none());
    }

    #[test]
    fn test_base_url_override() {
        let mut config = llm_config(LLMProvider::Groq);
        assert_eq!(config.base_url(), "https://api.groq.com/openai/v1");

        config.base_url = Some("http://localhost:8080/v1".to_string());
        assert_eq!(config.base_url(), "http://localhost:8080/v1");
    }
}
