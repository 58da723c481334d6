use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::types::{
    AppError, AppResult, LLMMessage, LLMProvider, LLMRequest, LLMResponse, ResponseFormat,
    ToolDefinition,
};

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse>;
}

/// Configuration for LLM provider (renamed to avoid conflict with LLMProvider enum in types.rs)
pub struct LLMProviderConfig {
    pub provider: LLMProvider,
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Deserialize)]
struct EnumChoice {
    result: String,
}

/// Handle to one model on one provider. Cheap to clone.
#[derive(Clone)]
pub struct LLM {
    adapter: Arc<dyn LLMAdapter>,
    provider_name: String,
    model: String,
}

impl LLM {
    pub fn new(provider: LLMProviderConfig, model: impl Into<String>) -> AppResult<Self> {
        if provider.api_key.is_empty() {
            return Err(AppError::Config(format!(
                "No API key configured for provider {}",
                provider.provider
            )));
        }

        // Every supported provider speaks the OpenAI chat-completions dialect
        let adapter = crate::llm::openai::OpenAIAdapter::new(
            &provider.api_key,
            &provider.base_url,
            provider.timeout,
        )?;

        Ok(Self {
            adapter: Arc::new(adapter),
            provider_name: provider.provider.to_string(),
            model: model.into(),
        })
    }

    /// Wrap an existing adapter, e.g. a scripted one in tests
    pub fn with_adapter(
        adapter: Arc<dyn LLMAdapter>,
        provider_name: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            adapter,
            provider_name: provider_name.into(),
            model: model.into(),
        }
    }

    /// Same provider and credentials, different model
    pub fn with_model(&self, model: impl Into<String>) -> Self {
        Self {
            adapter: Arc::clone(&self.adapter),
            provider_name: self.provider_name.clone(),
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    fn request(&self, system: Option<&str>, messages: Vec<LLMMessage>) -> LLMRequest {
        LLMRequest {
            provider: self.provider_name.clone(),
            model: self.model.clone(),
            messages,
            max_tokens: None,
            temperature: None,
            system_instruction: system.map(str::to_string),
            tools: Vec::new(),
            response_format: None,
        }
    }

    pub async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        self.adapter.create_chat_completion(request).await
    }

    /// Free-form text generation
    pub async fn generate_text(&self, system: Option<&str>, prompt: &str) -> AppResult<String> {
        let request = self.request(system, vec![LLMMessage::user(prompt)]);
        let response = self.create_chat_completion(&request).await?;
        Ok(response.content)
    }

    /// Generation constrained to a JSON schema, deserialized into `T`
    pub async fn generate_object<T: DeserializeOwned>(
        &self,
        system: Option<&str>,
        prompt: &str,
        format: ResponseFormat,
    ) -> AppResult<T> {
        let name = format.name.clone();
        let mut request = self.request(system, vec![LLMMessage::user(prompt)]);
        request.response_format = Some(format);

        let response = self.create_chat_completion(&request).await?;
        serde_json::from_str(extract_json(&response.content)).map_err(|e| {
            AppError::LLMApi(format!("Failed to parse {} response: {}", name, e))
        })
    }

    /// Generation constrained to one of `allowed`
    pub async fn generate_enum(&self, prompt: &str, allowed: &[&str]) -> AppResult<String> {
        let format = ResponseFormat::json_schema(
            "enum_choice",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "result": { "type": "string", "enum": allowed }
                },
                "required": ["result"],
                "additionalProperties": false
            }),
        );

        let choice: EnumChoice = self.generate_object(None, prompt, format).await?;
        let value = choice.result.trim();
        allowed
            .iter()
            .find(|candidate| candidate.eq_ignore_ascii_case(value))
            .map(|candidate| candidate.to_string())
            .ok_or_else(|| AppError::LLMApi(format!("Model returned unexpected value: {}", value)))
    }

    /// One turn of a tool-calling conversation
    pub async fn complete_with_tools(
        &self,
        system: &str,
        messages: &[LLMMessage],
        tools: &[ToolDefinition],
    ) -> AppResult<LLMResponse> {
        let mut request = self.request(Some(system), messages.to_vec());
        request.tools = tools.to_vec();
        self.create_chat_completion(&request).await
    }
}

/// Strip markdown code fences some models wrap around JSON output
pub fn extract_json(response: &str) -> &str {
    if response.contains("```json") {
        response
            .split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .unwrap_or(response)
            .trim()
    } else if response.contains("```") {
        response.split("```").nth(1).unwrap_or(response).trim()
    } else {
        response.trim()
    }
}
