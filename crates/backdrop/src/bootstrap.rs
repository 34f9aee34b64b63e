//! Turns a configuration file or a list of shader files into a run plan:
//! shader text loaded, uniforms converted, window options merged with CLI flags.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use passconfig::{ConfigError, PassEntry, PassesConfig, TierSetting, UniformSetting};
use renderer::{NativeGl, PassSource, TierPreference, UniformTable, UniformValue, WindowConfig};
use tracing::debug;

use crate::cli::{RunArgs, SourceArgs};
use crate::paths::AppPaths;

#[derive(Debug, Clone)]
pub struct PassPlan {
    pub id: String,
    pub shader: PathBuf,
    pub source: String,
    pub uniforms: BTreeMap<String, UniformSetting>,
    pub textures: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct RunPlan {
    /// Config file the plan came from; `None` for `--shader` lists.
    pub origin: Option<PathBuf>,
    pub window: WindowConfig,
    pub duration: Option<Duration>,
    pub passes: Vec<PassPlan>,
}

impl RunPlan {
    pub fn sources(&self) -> Vec<PassSource> {
        self.passes
            .iter()
            .map(|pass| PassSource::new(&pass.id, &pass.source))
            .collect()
    }

    pub fn uniform_tables(&self) -> Result<HashMap<String, UniformTable<NativeGl>>> {
        let mut tables = HashMap::new();
        for pass in &self.passes {
            let mut table = UniformTable::new();
            for (name, setting) in &pass.uniforms {
                let value = uniform_value(setting)
                    .with_context(|| format!("pass '{}' uniform '{name}'", pass.id))?;
                table.set_value(name, value);
            }
            for (sampler, source) in &pass.textures {
                table.bind_output(sampler, source);
            }
            if !table.is_empty() {
                tables.insert(pass.id.clone(), table);
            }
        }
        Ok(tables)
    }
}

/// Resolves the pass list named by `source`: `--shader` files, an explicit
/// config, or the default config in the user's config directory.
pub fn load_config(source: &SourceArgs, paths: &AppPaths) -> Result<(PassesConfig, PathBuf, Option<PathBuf>)> {
    if !source.shaders.is_empty() {
        let config = config_from_shaders(&source.shaders)?;
        let base_dir = std::env::current_dir().context("failed to resolve working directory")?;
        return Ok((config, base_dir, None));
    }

    let path = match &source.config {
        Some(path) => path.clone(),
        None => {
            let path = paths.default_config();
            if !path.exists() {
                return Err(anyhow!(ConfigError::Invalid(format!(
                    "no CONFIG or --shader given and {} does not exist",
                    path.display()
                ))));
            }
            path
        }
    };
    debug!(path = %path.display(), "loading pass configuration");
    let config = PassesConfig::load(&path)?;
    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    Ok((config, base_dir, Some(path)))
}

/// One pass per file, ids taken from file stems.
pub fn config_from_shaders(shaders: &[PathBuf]) -> Result<PassesConfig, ConfigError> {
    let passes = shaders
        .iter()
        .map(|path| {
            let id = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            PassEntry {
                id,
                shader: path.clone(),
                uniforms: BTreeMap::new(),
                textures: BTreeMap::new(),
            }
        })
        .collect();
    let config = PassesConfig {
        version: 1,
        window: Default::default(),
        context: Default::default(),
        run: Default::default(),
        passes,
    };
    config.validate()?;
    Ok(config)
}

pub fn build_plan(
    config: &PassesConfig,
    base_dir: &Path,
    origin: Option<PathBuf>,
    args: &RunArgs,
) -> Result<RunPlan> {
    let mut passes = Vec::with_capacity(config.passes.len());
    for entry in &config.passes {
        let shader = entry.shader_path(base_dir);
        let source = read_shader(&shader)?;
        debug!(pass = %entry.id, path = %shader.display(), bytes = source.len(), "loaded shader");
        passes.push(PassPlan {
            id: entry.id.clone(),
            shader,
            source,
            uniforms: entry.uniforms.clone(),
            textures: entry.textures.clone(),
        });
    }

    let defaults = WindowConfig::default();
    let tier = args.tier.unwrap_or(config.context.tier);
    let window = WindowConfig {
        title: config.window.title.clone().unwrap_or(defaults.title),
        size: args
            .size
            .or_else(|| config.window_size())
            .unwrap_or(defaults.size),
        vsync: !args.no_vsync && config.window.vsync.unwrap_or(defaults.vsync),
        tier: match tier {
            TierSetting::Auto => TierPreference::Auto,
            TierSetting::Baseline => TierPreference::Baseline,
        },
    };

    Ok(RunPlan {
        origin,
        window,
        duration: args.duration.or(config.run.duration),
        passes,
    })
}

fn read_shader(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn uniform_value(setting: &UniformSetting) -> Result<UniformValue> {
    let narrow = |values: &[f64]| values.iter().map(|value| *value as f32).collect::<Vec<_>>();
    Ok(match setting {
        UniformSetting::Int(value) => UniformValue::Int(
            i32::try_from(*value).map_err(|_| anyhow!("integer {value} does not fit a GLSL int"))?,
        ),
        UniformSetting::Float(value) => UniformValue::Float(*value as f32),
        UniformSetting::Vector(values) => match narrow(values).as_slice() {
            [x] => UniformValue::Float(*x),
            [x, y] => UniformValue::Vec2([*x, *y]),
            [x, y, z] => UniformValue::Vec3([*x, *y, *z]),
            [x, y, z, w] => UniformValue::Vec4([*x, *y, *z, *w]),
            other => return Err(anyhow!("vectors take 1 to 4 components, got {}", other.len())),
        },
    })
}
