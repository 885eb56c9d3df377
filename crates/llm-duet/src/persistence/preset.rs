//! Reusable run configuration.
//!
//! A preset carries only configuration inputs: names, system prompts,
//! generation parameters, turn budget, referee toggle and export name. It never
//! holds conversation content. Numeric fields are written as strings, the way
//! they were typed; JSON numbers are accepted on load as well.

use super::{read_json, write_json};
use crate::config::{DEFAULT_MAX_OUTPUT_TOKENS, DuetConfig, GenerationParams, HexColor, ParticipantConfig};
use crate::context::Side;
use crate::error::{ConfigError, PersistenceError};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::warn;

/// Flat preset document. Missing keys load as empty values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    #[serde(rename = "name_A", default, deserialize_with = "text")]
    pub name_a: String,
    #[serde(rename = "name_B", default, deserialize_with = "text")]
    pub name_b: String,
    #[serde(rename = "sys_A", default, deserialize_with = "text")]
    pub sys_a: String,
    #[serde(rename = "sys_B", default, deserialize_with = "text")]
    pub sys_b: String,
    #[serde(rename = "seed_A", default, deserialize_with = "text")]
    pub seed_a: String,
    #[serde(rename = "max_tokens_A", default, deserialize_with = "text")]
    pub max_tokens_a: String,
    #[serde(rename = "color_A", default, deserialize_with = "text")]
    pub color_a: String,
    #[serde(rename = "seed_B", default, deserialize_with = "text")]
    pub seed_b: String,
    #[serde(rename = "max_tokens_B", default, deserialize_with = "text")]
    pub max_tokens_b: String,
    #[serde(rename = "color_B", default, deserialize_with = "text")]
    pub color_b: String,
    #[serde(default, deserialize_with = "text")]
    pub turns: String,
    #[serde(default)]
    pub referee: bool,
    #[serde(default, deserialize_with = "text")]
    pub file_name: String,
}

/// Accepts strings, numbers, booleans or null and stores them as text.
fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a string or number, found {other}"
        ))),
    }
}

impl Preset {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        read_json(path.as_ref())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
        write_json(path.as_ref(), self)
    }

    /// Captures the inputs of an existing configuration.
    pub fn from_config(config: &DuetConfig) -> Self {
        let seed = |p: &ParticipantConfig| p.params.seed.map(|s| s.to_string()).unwrap_or_default();

        Self {
            name_a: config.a.name.clone(),
            name_b: config.b.name.clone(),
            sys_a: config.a.system_prompt.clone(),
            sys_b: config.b.system_prompt.clone(),
            seed_a: seed(&config.a),
            max_tokens_a: config.a.params.max_output_tokens.to_string(),
            color_a: config.a.params.color.to_string(),
            seed_b: seed(&config.b),
            max_tokens_b: config.b.params.max_output_tokens.to_string(),
            color_b: config.b.params.color.to_string(),
            turns: config.turns.to_string(),
            referee: config.referee,
            file_name: config.file_name.clone(),
        }
    }

    /// Builds a validated configuration for the given deployments.
    ///
    /// `turns_override` wins over the stored turn count. When neither is
    /// present the preset is rejected with [`ConfigError::MissingTurns`].
    pub fn to_config(
        &self,
        deployment_a: &str,
        deployment_b: &str,
        turns_override: Option<u32>,
    ) -> Result<DuetConfig, ConfigError> {
        let turns = match turns_override {
            Some(turns) => turns,
            None => parse_turns(&self.turns)?,
        };

        let a = ParticipantConfig::new(Side::A, self.name_a.trim(), deployment_a, self.sys_a.as_str())
            .with_params(params(Side::A, &self.seed_a, &self.max_tokens_a, &self.color_a)?);
        let b = ParticipantConfig::new(Side::B, self.name_b.trim(), deployment_b, self.sys_b.as_str())
            .with_params(params(Side::B, &self.seed_b, &self.max_tokens_b, &self.color_b)?);

        let config = DuetConfig {
            a,
            b,
            turns,
            referee: self.referee,
            file_name: self.file_name.trim().to_string(),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Parses a stored turn count. Blank means missing.
pub fn parse_turns(raw: &str) -> Result<u32, ConfigError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ConfigError::MissingTurns);
    }
    match raw.parse::<u32>() {
        Ok(turns) if turns > 0 => Ok(turns),
        _ => Err(ConfigError::InvalidTurns(raw.to_string())),
    }
}

fn params(side: Side, seed: &str, max_tokens: &str, color: &str) -> Result<GenerationParams, ConfigError> {
    Ok(GenerationParams::defaults_for(side)
        .with_seed(parse_seed(side, seed))
        .with_max_output_tokens(parse_max_tokens(max_tokens))
        .with_color(HexColor::parse_or_default(color, side)?))
}

/// Non-numeric seeds are ignored; the provider then chooses.
fn parse_seed(side: Side, raw: &str) -> u64 {
    let raw = raw.trim();
    if raw.is_empty() {
        return 0;
    }
    raw.parse::<u64>().unwrap_or_else(|_| {
        warn!(
            target: "llm_duet::persistence",
            side = %side,
            value = raw,
            event = "preset_seed_ignored"
        );
        0
    })
}

fn parse_max_tokens(raw: &str) -> u32 {
    match raw.trim().parse::<u32>() {
        Ok(n) if n > 0 => n,
        _ => DEFAULT_MAX_OUTPUT_TOKENS,
    }
}
