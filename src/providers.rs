//! Built-in presets for the regions serving the Seedream image API.
//!
//! Users name a preset in their config and it fills in the base URL and the
//! environment variable holding the fallback API key.

#[derive(Debug, Clone)]
pub struct ProviderPreset {
    pub name: &'static str,
    pub base_url: &'static str,
    pub default_api_key_env: &'static str,
}

pub const DEFAULT_PRESET: &str = "volcengine";

const PRESETS: &[ProviderPreset] = &[
    ProviderPreset {
        name: "volcengine",
        base_url: "https://ark.cn-beijing.volces.com/api/v3",
        default_api_key_env: "VOLC_API_KEY",
    },
    ProviderPreset {
        name: "byteplus",
        base_url: "https://ark.ap-southeast.bytepluses.com/api/v3",
        default_api_key_env: "ARK_API_KEY",
    },
];

impl ProviderPreset {
    #[must_use]
    pub fn from_name(name: &str) -> Option<&'static ProviderPreset> {
        PRESETS.iter().find(|p| p.name == name.to_lowercase())
    }

    #[must_use]
    pub fn all() -> &'static [ProviderPreset] {
        PRESETS
    }

    /// URL of the image generation endpoint under `base_url`.
    #[must_use]
    pub fn generations_url(base_url: &str) -> String {
        format!("{}/images/generations", base_url.trim_end_matches('/'))
    }
}
