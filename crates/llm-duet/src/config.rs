//! Configuration values for a duet session.
//!
//! Nothing here is global: the provider catalog, the output layout and the
//! session configuration are plain values loaded and saved explicitly by
//! whoever owns the session.

use crate::context::Side;
use crate::error::{ConfigError, PersistenceError};
use crate::persistence::{read_json, write_json};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::warn;

/// Token budget used when a participant does not set one.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 1000;

/// Default location of the provider catalog, relative to the working directory.
pub const DEFAULT_PROVIDER_CONFIG: &str = "config/setupModels.json";

/// Default root for exported artifacts.
pub const DEFAULT_OUTPUT_DIR: &str = "outputs";

fn hex_color_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^#([0-9A-Fa-f]{3}|[0-9A-Fa-f]{6})$").expect("hex color pattern is valid")
    })
}

/// A display colour in `#RGB` or `#RRGGBB` form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct HexColor(String);

impl HexColor {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let value = value.trim();
        if hex_color_pattern().is_match(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(ConfigError::InvalidColor(value.to_string()))
        }
    }

    /// Default colour for a participant: red for A, blue for B.
    pub fn default_for(side: Side) -> Self {
        match side {
            Side::A => Self("#FF0000".to_string()),
            Side::B => Self("#0000FF".to_string()),
        }
    }

    /// Parses a colour, falling back to the side default when blank.
    pub fn parse_or_default(value: &str, side: Side) -> Result<Self, ConfigError> {
        if value.trim().is_empty() {
            Ok(Self::default_for(side))
        } else {
            Self::parse(value)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Components scaled to `0.0..=1.0`.
    pub fn to_rgb(&self) -> (f32, f32, f32) {
        let digits = &self.0[1..];
        let channel = |hex: &str| {
            let value = u8::from_str_radix(hex, 16).unwrap_or(0);
            let value = if hex.len() == 1 { value * 17 } else { value };
            f32::from(value) / 255.0
        };
        if digits.len() == 3 {
            (channel(&digits[0..1]), channel(&digits[1..2]), channel(&digits[2..3]))
        } else {
            (channel(&digits[0..2]), channel(&digits[2..4]), channel(&digits[4..6]))
        }
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-agent generation parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationParams {
    /// Sampling seed. `None` lets the provider choose.
    pub seed: Option<u64>,
    pub max_output_tokens: u32,
    pub color: HexColor,
}

impl GenerationParams {
    pub fn defaults_for(side: Side) -> Self {
        Self {
            seed: None,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            color: HexColor::default_for(side),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = (seed > 0).then_some(seed);
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn with_color(mut self, color: HexColor) -> Self {
        self.color = color;
        self
    }
}

/// Everything needed to run one side of the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantConfig {
    pub name: String,
    /// Model identity passed to the gateway (deployment name on Azure).
    pub deployment: String,
    pub system_prompt: String,
    pub params: GenerationParams,
}

impl ParticipantConfig {
    pub fn new(
        side: Side,
        name: impl Into<String>,
        deployment: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            deployment: deployment.into(),
            system_prompt: system_prompt.into(),
            params: GenerationParams::defaults_for(side),
        }
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    /// Label used for this participant's transcript entries.
    pub fn display_label(&self) -> String {
        format!("{}:", self.name)
    }
}

/// Validated configuration for one duet session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuetConfig {
    pub a: ParticipantConfig,
    pub b: ParticipantConfig,
    pub turns: u32,
    pub referee: bool,
    /// Base name for exported artifacts.
    pub file_name: String,
}

impl DuetConfig {
    pub fn participant(&self, side: Side) -> &ParticipantConfig {
        match side {
            Side::A => &self.a,
            Side::B => &self.b,
        }
    }

    /// Rejects configurations that must never start a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.turns == 0 {
            return Err(ConfigError::InvalidTurns(self.turns.to_string()));
        }
        for (side, participant) in [(Side::A, &self.a), (Side::B, &self.b)] {
            if participant.system_prompt.trim().is_empty() {
                return Err(ConfigError::EmptySystemPrompt(format!("Model {side}")));
            }
        }
        Ok(())
    }

    /// Export base name; an empty name falls back to `output`.
    pub fn export_name(&self) -> &str {
        let trimmed = self.file_name.trim();
        if trimmed.is_empty() { "output" } else { trimmed }
    }
}

/// One deployable model listed in the provider catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub deployment: String,
    pub model_name: String,
}

/// Provider catalog: endpoint settings plus the list of usable models.
///
/// Keys this type does not know about are kept in `extra` and written back
/// unchanged on [`save`](Self::save).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, deserialize_with = "lenient_models")]
    pub models: Vec<ModelEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(skip)]
    source: Option<PathBuf>,
}

/// Keeps only entries carrying a non-empty deployment and model name.
fn lenient_models<'de, D>(deserializer: D) -> Result<Vec<ModelEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    let Some(Value::Array(items)) = raw else {
        return Ok(Vec::new());
    };

    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<ModelEntry>(item).ok())
        .filter(|m| !m.deployment.is_empty() && !m.model_name.is_empty())
        .collect())
}

impl ProviderConfig {
    /// Loads the catalog from `path`.
    ///
    /// A missing file yields an empty catalog so callers can report "no
    /// models" instead of failing on I/O.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(
                target: "llm_duet::config",
                path = %path.display(),
                event = "provider_config_missing"
            );
            return Ok(Self {
                source: Some(path.to_path_buf()),
                ..Self::default()
            });
        }

        let mut config: ProviderConfig = read_json(path)?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
        write_json(path.as_ref(), self)
    }

    /// Returns the model list, or an error naming where it was expected.
    pub fn require_models(&self) -> Result<&[ModelEntry], ConfigError> {
        if self.models.is_empty() {
            let path = self
                .source
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PROVIDER_CONFIG));
            return Err(ConfigError::NoModels(path));
        }
        Ok(&self.models)
    }

    /// Resolves a requested deployment, defaulting to the first listed model.
    pub fn resolve_deployment(&self, requested: Option<&str>) -> Result<String, ConfigError> {
        let models = self.require_models()?;
        match requested {
            None => Ok(models[0].deployment.clone()),
            Some(name) => models
                .iter()
                .find(|m| m.deployment == name)
                .map(|m| m.deployment.clone())
                .ok_or_else(|| ConfigError::UnknownDeployment(name.to_string())),
        }
    }
}

/// Where exported artifacts are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_DIR)
    }
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn pdf_dir(&self) -> PathBuf {
        self.root.join("Conversations_PDF")
    }

    pub fn session_dir(&self) -> PathBuf {
        self.root.join("Conversations_JSON")
    }

    pub fn preset_dir(&self) -> PathBuf {
        self.root.join("presets")
    }

    pub fn pdf_path(&self, name: &str) -> PathBuf {
        self.pdf_dir().join(format!("{name}.pdf"))
    }

    pub fn session_path(&self, name: &str) -> PathBuf {
        self.session_dir().join(format!("{name}.json"))
    }

    /// Preset path; `.json` is appended unless already present.
    pub fn preset_path(&self, name: &str) -> PathBuf {
        if name.to_lowercase().ends_with(".json") {
            self.preset_dir().join(name)
        } else {
            self.preset_dir().join(format!("{name}.json"))
        }
    }
}
