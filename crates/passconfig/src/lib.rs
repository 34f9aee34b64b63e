use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Ordered pass list plus the window and run options around it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PassesConfig {
    pub version: u32,
    #[serde(default)]
    pub window: WindowSection,
    #[serde(default)]
    pub context: ContextSection,
    #[serde(default)]
    pub run: RunSection,
    #[serde(default)]
    pub passes: Vec<PassEntry>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WindowSection {
    pub title: Option<String>,
    /// `WIDTHxHEIGHT` in physical pixels.
    pub size: Option<String>,
    pub vsync: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ContextSection {
    #[serde(default)]
    pub tier: TierSetting,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TierSetting {
    #[default]
    Auto,
    Baseline,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RunSection {
    #[serde(
        default,
        deserialize_with = "deserialize_duration_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration: Option<Duration>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PassEntry {
    pub id: String,
    /// Fragment shader path; relative paths resolve against the config file.
    pub shader: PathBuf,
    #[serde(default)]
    pub uniforms: BTreeMap<String, UniformSetting>,
    /// Sampler name → id of a buffered pass whose latest output it reads.
    #[serde(default)]
    pub textures: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum UniformSetting {
    Int(i64),
    Float(f64),
    Vector(Vec<f64>),
}

impl UniformSetting {
    fn check(&self) -> Result<(), String> {
        match self {
            UniformSetting::Int(value) if i32::try_from(*value).is_err() => {
                Err(format!("integer {value} does not fit a GLSL int"))
            }
            UniformSetting::Vector(values) if !(1..=4).contains(&values.len()) => Err(format!(
                "vectors take 1 to 4 components, got {}",
                values.len()
            )),
            _ => Ok(()),
        }
    }
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs_f64(v)))
        }
    }

    deserializer.deserialize_any(Visitor)
}

/// Parses `WIDTHxHEIGHT` (also accepts `X` and `×`).
pub fn parse_size(raw: &str) -> Result<(u32, u32), String> {
    let normalized = raw.trim().to_ascii_lowercase().replace('×', "x");
    let (width, height) = normalized
        .split_once('x')
        .ok_or_else(|| format!("size '{raw}' must look like WIDTHxHEIGHT"))?;
    let parse = |value: &str| {
        value
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|value| *value > 0)
            .ok_or_else(|| format!("size '{raw}' needs positive integer dimensions"))
    };
    Ok((parse(width)?, parse(height)?))
}

impl PassesConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: PassesConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let input = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    pub fn window_size(&self) -> Option<(u32, u32)> {
        self.window.size.as_deref().and_then(|raw| parse_size(raw).ok())
    }

    pub fn pass(&self, id: &str) -> Option<&PassEntry> {
        self.passes.iter().find(|pass| pass.id == id)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if self.passes.is_empty() {
            return Err(ConfigError::Invalid(
                "config must define at least one pass".into(),
            ));
        }

        if let Some(size) = &self.window.size {
            parse_size(size).map_err(ConfigError::Invalid)?;
        }

        if self.run.duration.is_some_and(|duration| duration.is_zero()) {
            return Err(ConfigError::Invalid(
                "run.duration must be greater than zero".into(),
            ));
        }

        let mut ids = HashSet::new();
        for pass in &self.passes {
            if pass.id.trim().is_empty() {
                return Err(ConfigError::Invalid("pass id may not be empty".into()));
            }
            if !ids.insert(pass.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "pass id '{}' is defined more than once",
                    pass.id
                )));
            }
            if pass.shader.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "pass '{}' has an empty shader path",
                    pass.id
                )));
            }
        }

        let display = self.passes.last().map(|pass| pass.id.as_str());
        for pass in &self.passes {
            for (name, setting) in &pass.uniforms {
                if name.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "pass '{}' has a uniform with an empty name",
                        pass.id
                    )));
                }
                setting.check().map_err(|reason| {
                    ConfigError::Invalid(format!(
                        "pass '{}' uniform '{name}': {reason}",
                        pass.id
                    ))
                })?;
            }

            for (sampler, source) in &pass.textures {
                if sampler.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "pass '{}' has a texture binding with an empty sampler name",
                        pass.id
                    )));
                }
                if pass.uniforms.contains_key(sampler) {
                    return Err(ConfigError::Invalid(format!(
                        "pass '{}' binds '{sampler}' as both a uniform and a texture",
                        pass.id
                    )));
                }
                if self.pass(source).is_none() {
                    return Err(ConfigError::Invalid(format!(
                        "pass '{}' texture '{sampler}' references unknown pass '{source}'",
                        pass.id
                    )));
                }
                if Some(source.as_str()) == display {
                    return Err(ConfigError::Invalid(format!(
                        "pass '{}' texture '{sampler}' references '{source}', the final pass, which has no texture output",
                        pass.id
                    )));
                }
            }
        }

        Ok(())
    }
}

impl PassEntry {
    pub fn shader_path(&self, base_dir: &Path) -> PathBuf {
        if self.shader.is_absolute() {
            self.shader.clone()
        } else {
            base_dir.join(&self.shader)
        }
    }
}
