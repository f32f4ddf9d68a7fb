use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use crate::WeftError;
use crate::WeftResult;

/// Default maximum file size in bytes (10 MB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] = ["weft.toml", ".weft.toml", ".config/weft.toml"];

/// Configuration loaded from a `weft.toml` file.
///
/// ```toml
/// [layouts]
/// dir = "layouts"
///
/// [pages]
/// extensions = ["html", "md"]
///
/// [exclude]
/// patterns = ["drafts/", "*.swp"]
///
/// max_file_size = 10485760
/// parallelism = 0
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct WeftConfig {
	/// Where layout templates live, relative to the site root.
	#[serde(default)]
	pub layouts: LayoutsConfig,
	/// Which files are treated as pages.
	#[serde(default)]
	pub pages: PagesConfig,
	/// Exclusion configuration using gitignore-style patterns.
	#[serde(default)]
	pub exclude: ExcludeConfig,
	/// Maximum file size in bytes to load. Defaults to 10 MB.
	#[serde(default = "default_max_file_size")]
	pub max_file_size: u64,
	/// Worker threads for the parallel build. `0` picks the pool's default.
	#[serde(default)]
	pub parallelism: usize,
}

impl Default for WeftConfig {
	fn default() -> Self {
		Self {
			layouts: LayoutsConfig::default(),
			pages: PagesConfig::default(),
			exclude: ExcludeConfig::default(),
			max_file_size: DEFAULT_MAX_FILE_SIZE,
			parallelism: 0,
		}
	}
}

impl WeftConfig {
	/// Load configuration from the first candidate file found under `root`.
	/// Returns `Ok(None)` when no config file exists.
	pub fn load(root: &Path) -> WeftResult<Option<Self>> {
		for candidate in CONFIG_FILE_CANDIDATES {
			let path = root.join(candidate);
			if !path.is_file() {
				continue;
			}

			let raw = std::fs::read_to_string(&path)?;
			let config =
				toml::from_str(&raw).map_err(|error| WeftError::ConfigParse(error.to_string()))?;
			return Ok(Some(config));
		}

		Ok(None)
	}
}

/// `[layouts]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct LayoutsConfig {
	/// Directory holding layout templates, relative to the site root.
	#[serde(default = "default_layouts_dir")]
	pub dir: PathBuf,
}

impl Default for LayoutsConfig {
	fn default() -> Self {
		Self {
			dir: default_layouts_dir(),
		}
	}
}

/// `[pages]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PagesConfig {
	/// File extensions treated as pages during discovery.
	#[serde(default = "default_page_extensions")]
	pub extensions: Vec<String>,
	/// Glob patterns adding files to discovery regardless of extension.
	#[serde(default)]
	pub include: Vec<String>,
}

impl Default for PagesConfig {
	fn default() -> Self {
		Self {
			extensions: default_page_extensions(),
			include: Vec::new(),
		}
	}
}

/// `[exclude]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExcludeConfig {
	/// Gitignore-style patterns excluded from page discovery.
	#[serde(default)]
	pub patterns: Vec<String>,
}

fn default_max_file_size() -> u64 {
	DEFAULT_MAX_FILE_SIZE
}

fn default_layouts_dir() -> PathBuf {
	PathBuf::from("layouts")
}

fn default_page_extensions() -> Vec<String> {
	vec!["html".to_string(), "md".to_string()]
}
