//! Settings: the record that selects the renderer and the target identifier.
//!
//! Settings are persisted as a JSON object with camelCase keys:
//!
//! ```json
//! {
//!   "dotPath": "dot",
//!   "codeblockLanguage": "dot",
//!   "renderer": "dot",
//!   "imageFormat": "png"
//! }
//! ```
//!
//! Missing keys take their default values. Discovery searches for
//! `.config/dotmark.json` walking up from a starting directory.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Configuration directory name
pub const CONFIG_DIR: &str = ".config";
/// Settings file name inside [`CONFIG_DIR`]
pub const CONFIG_FILE: &str = "dotmark.json";

const DEFAULT_TARGET: &str = "dot";

/// Which rendering strategy handles matched blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Renderer {
    /// Run the native `dot` executable and insert the resulting image
    #[default]
    #[serde(rename = "dot")]
    Dot,
    /// Lay out and render client-side with d3-graphviz
    #[serde(rename = "d3_graphviz")]
    D3Graphviz,
}

impl Renderer {
    /// The persisted name of this renderer.
    pub fn as_str(&self) -> &'static str {
        match self {
            Renderer::Dot => "dot",
            Renderer::D3Graphviz => "d3_graphviz",
        }
    }
}

impl std::str::FromStr for Renderer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dot" => Ok(Renderer::Dot),
            "d3_graphviz" => Ok(Renderer::D3Graphviz),
            other => Err(Error::Config(format!(
                "unknown renderer '{other}' (expected 'dot' or 'd3_graphviz')"
            ))),
        }
    }
}

/// Output format requested from the `dot` executable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Svg,
}

impl ImageFormat {
    /// The `-T` argument value and persisted name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Svg => "svg",
        }
    }

    /// MIME type of artifacts in this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Svg => "image/svg+xml",
        }
    }
}

impl std::str::FromStr for ImageFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "png" => Ok(ImageFormat::Png),
            "svg" => Ok(ImageFormat::Svg),
            other => Err(Error::Config(format!(
                "unknown image format '{other}' (expected 'png' or 'svg')"
            ))),
        }
    }
}

/// Settings for the Graphviz code block processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Path to the `dot` executable
    pub dot_path: String,

    /// The text after the opening backticks that marks a Graphviz block.
    /// Also matched against a bracketed label, e.g. `` ```c{dot} ``.
    pub codeblock_language: String,

    /// Rendering strategy for matched blocks
    pub renderer: Renderer,

    /// Output format for the `dot` renderer
    pub image_format: ImageFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dot_path: "dot".to_string(),
            codeblock_language: DEFAULT_TARGET.to_string(),
            renderer: Renderer::default(),
            image_format: ImageFormat::default(),
        }
    }
}

impl Settings {
    /// Parse settings from JSON, overlaying stored values on the defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(json)?;
        Ok(settings.validated())
    }

    /// Load settings from a file. A missing file yields the defaults.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(json) => {
                let settings = Self::from_json(&json)?;
                tracing::debug!(%path, ?settings, "Loaded settings");
                Ok(settings)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(%path, "No settings file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Persist settings to a file, creating parent directories as needed.
    pub fn save(&self, path: &Utf8Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::debug!(%path, "Saved settings");
        Ok(())
    }

    /// Replace an empty target identifier with the default.
    ///
    /// An empty target would claim every fenced block in a document.
    pub fn validated(mut self) -> Self {
        if self.codeblock_language.is_empty() {
            tracing::warn!(
                default = DEFAULT_TARGET,
                "Empty codeblock language in settings, using default"
            );
            self.codeblock_language = DEFAULT_TARGET.to_string();
        }
        self
    }

    /// Set a field by its persisted key name.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "dotPath" => self.dot_path = value.to_string(),
            "codeblockLanguage" => {
                if value.is_empty() {
                    return Err(Error::Config("codeblockLanguage must not be empty".into()));
                }
                self.codeblock_language = value.to_string();
            }
            "renderer" => self.renderer = value.parse()?,
            "imageFormat" => self.image_format = value.parse()?,
            other => return Err(Error::Config(format!("unknown setting '{other}'"))),
        }
        Ok(())
    }

    /// Key/value pairs in persisted form, in display order.
    pub fn entries(&self) -> [(&'static str, &str); 4] {
        [
            ("renderer", self.renderer.as_str()),
            ("dotPath", &self.dot_path),
            ("codeblockLanguage", &self.codeblock_language),
            ("imageFormat", self.image_format.as_str()),
        ]
    }
}

/// Find `.config/dotmark.json` in `start` or any of its ancestors.
pub fn discover_settings(start: &Utf8Path) -> Option<Utf8PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.dot_path, "dot");
        assert_eq!(settings.codeblock_language, "dot");
        assert_eq!(settings.renderer, Renderer::Dot);
        assert_eq!(settings.image_format, ImageFormat::Png);
    }

    #[test]
    fn test_from_json_camel_case() {
        let settings = Settings::from_json(
            r#"{"dotPath":"/usr/bin/dot","codeblockLanguage":"graphviz","renderer":"d3_graphviz","imageFormat":"svg"}"#,
        )
        .unwrap();
        assert_eq!(settings.dot_path, "/usr/bin/dot");
        assert_eq!(settings.codeblock_language, "graphviz");
        assert_eq!(settings.renderer, Renderer::D3Graphviz);
        assert_eq!(settings.image_format, ImageFormat::Svg);
    }

    #[test]
    fn test_missing_keys_take_defaults() {
        let settings = Settings::from_json(r#"{"imageFormat":"svg"}"#).unwrap();
        assert_eq!(settings.image_format, ImageFormat::Svg);
        assert_eq!(settings.codeblock_language, "dot");
        assert_eq!(settings.renderer, Renderer::Dot);
    }

    #[test]
    fn test_empty_target_falls_back() {
        let settings = Settings::from_json(r#"{"codeblockLanguage":""}"#).unwrap();
        assert_eq!(settings.codeblock_language, "dot");
    }

    #[test]
    fn test_unknown_renderer_rejected() {
        assert!(Settings::from_json(r#"{"renderer":"neato"}"#).is_err());
    }

    #[test]
    fn test_set_by_key() {
        let mut settings = Settings::default();
        settings.set("renderer", "d3_graphviz").unwrap();
        settings.set("codeblockLanguage", "graphviz").unwrap();
        assert_eq!(settings.renderer, Renderer::D3Graphviz);
        assert_eq!(settings.codeblock_language, "graphviz");

        assert!(settings.set("codeblockLanguage", "").is_err());
        assert!(settings.set("imageFormat", "jpeg").is_err());
        assert!(settings.set("colour", "blue").is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let path = root.join(CONFIG_DIR).join(CONFIG_FILE);

        let mut settings = Settings::default();
        settings.image_format = ImageFormat::Svg;
        settings.save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"imageFormat\": \"svg\""));

        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8Path::from_path(dir.path()).unwrap().join("absent.json");
        assert_eq!(Settings::load(&path).unwrap(), Settings::default());
    }

    #[test]
    fn test_discover_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let nested = root.join("notes").join("graphs");
        std::fs::create_dir_all(&nested).unwrap();
        Settings::default()
            .save(&root.join(CONFIG_DIR).join(CONFIG_FILE))
            .unwrap();

        let found = discover_settings(&nested).unwrap();
        assert_eq!(found, root.join(CONFIG_DIR).join(CONFIG_FILE));
    }
}
