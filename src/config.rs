use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Parser;
use serde::Deserialize;

/// Largest box batch, keeps every index inside `u32` with room to spare.
pub(crate) const MAX_BOXES: u32 = 1 << 16;

const DEFAULT_CONFIG_FILE: &str = "quadkit.toml";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Deserialize)]
#[derive(strum_macros::EnumString, strum_macros::Display, strum_macros::EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub(crate) enum Demo {
    #[default]
    Quad,
    Triangle,
    Boxes,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Deserialize)]
#[derive(strum_macros::EnumString, strum_macros::Display, strum_macros::EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub(crate) enum Backend {
    #[default]
    Wgpu,
    /// No GPU; runs the scene against the recording context.
    Dummy,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct WindowConfig {
    pub(crate) title: String,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "quadkit".to_string(),
            width: 960,
            height: 576,
            resizable: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct ShaderPaths {
    pub(crate) vertex: PathBuf,
    pub(crate) fragment: PathBuf,
}

impl Default for ShaderPaths {
    fn default() -> Self {
        Self {
            vertex: PathBuf::from("shaders/vertex.wgsl"),
            fragment: PathBuf::from("shaders/fragment.wgsl"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct BoxConfig {
    pub(crate) count: u32,
    /// Seed phrase; the same phrase always produces the same batch.
    pub(crate) seed: Option<String>,
    pub(crate) min_size: f32,
    pub(crate) max_size: f32,
}

impl Default for BoxConfig {
    fn default() -> Self {
        Self {
            count: 64,
            seed: None,
            min_size: 0.05,
            max_size: 0.3,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct Config {
    pub(crate) demo: Demo,
    pub(crate) backend: Backend,
    pub(crate) window: WindowConfig,
    pub(crate) shaders: ShaderPaths,
    pub(crate) boxes: BoxConfig,
    pub(crate) clear_color: [u8; 4],
    pub(crate) log_filter: String,
    pub(crate) max_frames: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            demo: Demo::default(),
            backend: Backend::default(),
            window: WindowConfig::default(),
            shaders: ShaderPaths::default(),
            boxes: BoxConfig::default(),
            clear_color: [10, 20, 30, 255],
            log_filter: "info".to_string(),
            max_frames: None,
        }
    }
}

/// Command line flags. Every flag overrides the config file.
#[derive(Parser, Debug, Default)]
#[command(name = "quadkit", about = "Draws simple 2D shapes through wgpu", version)]
pub(crate) struct Args {
    /// Config file (defaults to ./quadkit.toml when present).
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,

    /// Demo to draw: quad, triangle or boxes.
    #[arg(long)]
    pub(crate) demo: Option<Demo>,

    /// Graphics backend: wgpu or dummy.
    #[arg(long)]
    pub(crate) backend: Option<Backend>,

    /// Number of boxes in the boxes demo.
    #[arg(long)]
    pub(crate) boxes: Option<u32>,

    /// Seed phrase for a reproducible box batch.
    #[arg(long)]
    pub(crate) seed: Option<String>,

    /// Exit after this many frames.
    #[arg(long)]
    pub(crate) max_frames: Option<u64>,

    #[arg(long)]
    pub(crate) vertex_shader: Option<PathBuf>,

    #[arg(long)]
    pub(crate) fragment_shader: Option<PathBuf>,
}

impl Config {
    /// Loads the config file (if any) and applies the command line on top.
    pub(crate) fn resolve(args: Args) -> anyhow::Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::from_path(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_path(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };

        config.apply(args);
        config.validate()?;

        Ok(config)
    }

    fn from_path(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;

        Self::from_toml(&contents).with_context(|| format!("invalid config file {}", path.display()))
    }

    fn from_toml(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    fn apply(&mut self, args: Args) {
        if let Some(demo) = args.demo {
            self.demo = demo;
        }
        if let Some(backend) = args.backend {
            self.backend = backend;
        }
        if let Some(count) = args.boxes {
            self.boxes.count = count;
        }
        if let Some(seed) = args.seed {
            self.boxes.seed = Some(seed);
        }
        if let Some(max_frames) = args.max_frames {
            self.max_frames = Some(max_frames);
        }
        if let Some(path) = args.vertex_shader {
            self.shaders.vertex = path;
        }
        if let Some(path) = args.fragment_shader {
            self.shaders.fragment = path;
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.window.width == 0 || self.window.height == 0 {
            bail!("window size must be non-zero, got {}x{}", self.window.width, self.window.height);
        }

        let BoxConfig { count, min_size, max_size, .. } = self.boxes;
        if count > MAX_BOXES {
            bail!("at most {MAX_BOXES} boxes are supported, got {count}");
        }
        if !(min_size > 0.0 && min_size <= max_size && max_size <= 2.0) {
            bail!("box sizes must satisfy 0 < min_size <= max_size <= 2, got {min_size}..{max_size}");
        }

        Ok(())
    }

    pub(crate) fn clear_color(&self) -> [f32; 4] {
        self.clear_color.map(color_channel)
    }
}

fn color_channel(c: u8) -> f32 {
    c as f32 / 255.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.window.width, 960);
        assert_eq!(config.window.height, 576);
        assert_eq!(config.demo, Demo::Quad);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            demo = "boxes"
            clear_color = [0, 0, 0, 255]

            [boxes]
            count = 10
            seed = "hello"
            "#,
        )
        .unwrap();

        assert_eq!(config.demo, Demo::Boxes);
        assert_eq!(config.boxes.count, 10);
        assert_eq!(config.boxes.seed.as_deref(), Some("hello"));
        assert_eq!(config.boxes.max_size, BoxConfig::default().max_size);
        assert_eq!(config.shaders, ShaderPaths::default());
        assert_eq!(config.clear_color(), [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn unknown_demo_is_rejected() {
        assert!(Config::from_toml(r#"demo = "cube""#).is_err());
    }

    #[test]
    fn flags_override_file() {
        let mut config = Config::from_toml(r#"backend = "dummy""#).unwrap();
        config.apply(Args {
            demo: Some(Demo::Triangle),
            boxes: Some(3),
            vertex_shader: Some(PathBuf::from("custom.wgsl")),
            ..Args::default()
        });

        assert_eq!(config.backend, Backend::Dummy);
        assert_eq!(config.demo, Demo::Triangle);
        assert_eq!(config.boxes.count, 3);
        assert_eq!(config.shaders.vertex, PathBuf::from("custom.wgsl"));
        assert_eq!(config.shaders.fragment, ShaderPaths::default().fragment);
    }

    #[test]
    fn command_line_parses_demo_names() {
        let args = Args::try_parse_from(["quadkit", "--demo", "boxes", "--boxes", "12", "--backend", "dummy"]).unwrap();
        assert_eq!(args.demo, Some(Demo::Boxes));
        assert_eq!(args.boxes, Some(12));
        assert_eq!(args.backend, Some(Backend::Dummy));

        assert!(Args::try_parse_from(["quadkit", "--demo", "cube"]).is_err());
    }

    #[test]
    fn demo_names_round_trip() {
        for demo in Demo::iter() {
            assert_eq!(demo.to_string().parse::<Demo>().unwrap(), demo);
        }
    }

    #[test]
    fn invalid_sizes_are_rejected() {
        let mut config = Config::default();
        config.boxes.min_size = 0.5;
        config.boxes.max_size = 0.1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.boxes.count = MAX_BOXES + 1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.window.height = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn clear_color_scales_bytes() {
        let config = Config::default();
        let [r, g, b, a] = config.clear_color();
        assert!((r - 10.0 / 255.0).abs() < f32::EPSILON);
        assert!((g - 20.0 / 255.0).abs() < f32::EPSILON);
        assert!((b - 30.0 / 255.0).abs() < f32::EPSILON);
        assert_eq!(a, 1.0);
    }
}
