use crate::config::ProviderDefaults;
use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Backend identifier used for dispatch.
///
/// The set is fixed: each variant has exactly one adapter in [`crate::drivers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    OpenAi,
    /// OpenAI-compatible chat completions at DeepSeek.
    DeepSeek,
    Gemini,
    /// Self-hosted text-generation-inference server.
    Tgi,
    Ollama,
    /// Hosted Hugging Face inference API.
    HuggingFace,
}

const OPENAI: ProviderDefaults = ProviderDefaults {
    api_key_env: &["OPENAI_API_KEY"],
    base_url_env: "OPENAI_BASE_URL",
    default_base_url: "https://api.openai.com/v1",
    default_model: "gpt-4o-mini",
    vision_model: "gpt-4o",
    key_required: true,
};

const DEEPSEEK: ProviderDefaults = ProviderDefaults {
    api_key_env: &["DEEPSEEK_API_KEY"],
    base_url_env: "DEEPSEEK_BASE_URL",
    default_base_url: "https://api.deepseek.com/v1",
    default_model: "deepseek-chat",
    vision_model: "gpt-4o",
    key_required: true,
};

const GEMINI: ProviderDefaults = ProviderDefaults {
    api_key_env: &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
    base_url_env: "GEMINI_BASE_URL",
    default_base_url: "https://generativelanguage.googleapis.com/v1beta",
    default_model: "gemini-1.5-flash",
    vision_model: "gemini-1.5-flash",
    key_required: true,
};

const TGI: ProviderDefaults = ProviderDefaults {
    api_key_env: &["TGI_API_KEY"],
    base_url_env: "TGI_BASE_URL",
    default_base_url: "http://localhost:8080",
    default_model: "tgi",
    vision_model: "HuggingFaceM4/idefics2-8b",
    key_required: false,
};

const OLLAMA: ProviderDefaults = ProviderDefaults {
    api_key_env: &["OLLAMA_API_KEY"],
    base_url_env: "OLLAMA_BASE_URL",
    default_base_url: "http://localhost:11434",
    default_model: "llama3",
    vision_model: "llava",
    key_required: false,
};

const HUGGINGFACE: ProviderDefaults = ProviderDefaults {
    api_key_env: &["HUGGINGFACE_API_KEY", "HF_TOKEN"],
    base_url_env: "HUGGINGFACE_BASE_URL",
    default_base_url: "https://api-inference.huggingface.co/models",
    default_model: "mistralai/Mistral-7B-Instruct-v0.2",
    vision_model: "Salesforce/blip-image-captioning-large",
    key_required: true,
};

impl Provider {
    pub const ALL: [Provider; 6] = [
        Provider::OpenAi,
        Provider::DeepSeek,
        Provider::Gemini,
        Provider::Tgi,
        Provider::Ollama,
        Provider::HuggingFace,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::DeepSeek => "deepseek",
            Provider::Gemini => "gemini",
            Provider::Tgi => "tgi",
            Provider::Ollama => "ollama",
            Provider::HuggingFace => "huggingface",
        }
    }

    /// Parse a provider tag. Accepts the canonical id plus a few aliases, case-insensitively.
    pub fn from_tag(tag: &str) -> Result<Self> {
        let provider = match tag.trim().to_ascii_lowercase().as_str() {
            "openai" => Provider::OpenAi,
            "deepseek" => Provider::DeepSeek,
            "gemini" | "google" => Provider::Gemini,
            "tgi" | "selfhosted" | "self-hosted" => Provider::Tgi,
            "ollama" => Provider::Ollama,
            "huggingface" | "hf" => Provider::HuggingFace,
            other => {
                return Err(Error::validation(format!(
                    "Unknown provider '{}'. Supported providers: {}",
                    other,
                    Provider::ALL
                        .iter()
                        .map(|p| p.id())
                        .collect::<Vec<_>>()
                        .join(", ")
                )))
            }
        };
        Ok(provider)
    }

    /// Endpoint, credential and model defaults for this backend.
    pub fn defaults(&self) -> &'static ProviderDefaults {
        match self {
            Provider::OpenAi => &OPENAI,
            Provider::DeepSeek => &DEEPSEEK,
            Provider::Gemini => &GEMINI,
            Provider::Tgi => &TGI,
            Provider::Ollama => &OLLAMA,
            Provider::HuggingFace => &HUGGINGFACE,
        }
    }

    /// Whether the backend returns structured tool calls natively.
    pub fn native_function_calling(&self) -> bool {
        matches!(self, Provider::OpenAi | Provider::DeepSeek)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Provider::from_tag(s)
    }
}
