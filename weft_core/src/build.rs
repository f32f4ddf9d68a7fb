use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;
use std::time::Instant;

use globset::Glob;
use globset::GlobSet;
use globset::GlobSetBuilder;
use ignore::gitignore::Gitignore;
use ignore::gitignore::GitignoreBuilder;
use rayon::prelude::*;
use tracing::debug;
use tracing::warn;

use crate::WeftConfig;
use crate::WeftError;
use crate::WeftResult;
use crate::config::DEFAULT_MAX_FILE_SIZE;
use crate::loader::SourceLoader;
use crate::pipeline::CancelToken;
use crate::pipeline::ComposedPage;
use crate::pipeline::PageError;
use crate::pipeline::Stage;
use crate::pipeline::compose_page;
use crate::registry::TemplateRegistry;

/// Options controlling page discovery and the parallel build.
///
/// Use [`BuildOptions::default()`] for sensible defaults or
/// [`BuildOptions::from_config`] to construct from a [`WeftConfig`].
#[derive(Debug, Clone)]
pub struct BuildOptions {
	/// Directory holding layout templates, relative to the site root.
	pub layouts_dir: PathBuf,
	/// File extensions treated as pages.
	pub page_extensions: Vec<String>,
	/// Glob patterns adding files to discovery regardless of extension.
	pub include_set: GlobSet,
	/// Gitignore-style patterns to exclude from discovery.
	pub exclude_patterns: Vec<String>,
	/// Maximum file size to load in bytes.
	pub max_file_size: u64,
	/// Worker threads for the parallel build. `0` picks the pool default.
	pub parallelism: usize,
}

impl Default for BuildOptions {
	fn default() -> Self {
		Self::from_config(None)
	}
}

impl BuildOptions {
	/// Construct [`BuildOptions`] from a [`WeftConfig`].
	pub fn from_config(config: Option<&WeftConfig>) -> Self {
		let layouts_dir = config
			.map_or_else(|| PathBuf::from("layouts"), |c| c.layouts.dir.clone());
		let page_extensions = config.map_or_else(
			|| vec!["html".to_string(), "md".to_string()],
			|c| c.pages.extensions.clone(),
		);
		let include_patterns = config.map(|c| &c.pages.include[..]).unwrap_or_default();
		let exclude_patterns = config
			.map(|c| c.exclude.patterns.clone())
			.unwrap_or_default();
		let max_file_size = config.map_or(DEFAULT_MAX_FILE_SIZE, |c| c.max_file_size);
		let parallelism = config.map_or(0, |c| c.parallelism);
		let include_set = build_glob_set(include_patterns);

		Self {
			layouts_dir,
			page_extensions,
			include_set,
			exclude_patterns,
			max_file_size,
			parallelism,
		}
	}
}

/// The outcome of one page within a build.
pub type PageOutcome = Result<ComposedPage, PageError>;

/// The result of composing a set of pages.
#[derive(Debug)]
pub struct BuildReport {
	/// Per-page outcomes, in the deterministic order the pages were given.
	pub outcomes: Vec<PageOutcome>,
	/// Wall-clock duration of the build.
	pub duration: Duration,
}

impl BuildReport {
	/// Returns true if every page composed without error.
	pub fn is_ok(&self) -> bool {
		self.outcomes.iter().all(Result::is_ok)
	}

	pub fn composed_count(&self) -> usize {
		self.outcomes.iter().filter(|o| o.is_ok()).count()
	}

	pub fn failed_count(&self) -> usize {
		self.outcomes.iter().filter(|o| o.is_err()).count()
	}

	/// Total warnings collected across successfully composed pages.
	pub fn warning_count(&self) -> usize {
		self
			.outcomes
			.iter()
			.filter_map(|o| o.as_ref().ok())
			.map(|page| page.warnings.len())
			.sum()
	}

	/// Successfully composed pages.
	pub fn composed(&self) -> impl Iterator<Item = &ComposedPage> {
		self.outcomes.iter().filter_map(|o| o.as_ref().ok())
	}

	/// Failed pages.
	pub fn failed(&self) -> impl Iterator<Item = &PageError> {
		self.outcomes.iter().filter_map(|o| o.as_ref().err())
	}
}

/// Discover page files under `root`, honoring exclude patterns and the
/// configured extensions. The layouts directory and hidden/dependency
/// directories are skipped. Returned identifiers are relative to `root`,
/// in deterministic sorted order.
pub fn discover_pages(root: &Path, options: &BuildOptions) -> WeftResult<Vec<PathBuf>> {
	let exclude = build_exclude_matcher(root, &options.exclude_patterns)?;
	let mut pages = Vec::new();

	walk_dir(root, root, options, &exclude, &mut pages)?;
	pages.sort();

	Ok(pages)
}

/// Discover layout template files under `root.join(dir)`. Returned
/// identifiers are relative to `root` (e.g. `layouts/base.html`), so they
/// match the `layout:` declarations pages use.
pub fn discover_layouts(root: &Path, dir: &Path) -> WeftResult<Vec<PathBuf>> {
	let mut layouts = Vec::new();
	let base = root.join(dir);
	if !base.is_dir() {
		return Ok(layouts);
	}

	collect_layout_files(root, &base, &mut layouts)?;
	layouts.sort();

	Ok(layouts)
}

/// Compose every page in parallel over the shared read-only registry.
///
/// Each page runs an independent pipeline instance; failures are isolated
/// per page. Outcomes preserve the order of `pages` regardless of
/// execution order. Tripping `cancel` stops issuing new page builds and
/// makes in-flight pages abort at their next stage boundary.
pub fn compose_all(
	pages: &[PathBuf],
	registry: &TemplateRegistry,
	loader: &dyn SourceLoader,
	options: &BuildOptions,
	cancel: &CancelToken,
) -> BuildReport {
	let started = Instant::now();

	let job = |page: &PathBuf| -> PageOutcome {
		if cancel.is_cancelled() {
			return Err(PageError {
				page: page.clone(),
				chain: Vec::new(),
				stage: Stage::Loaded,
				error: WeftError::Cancelled { page: page.clone() },
			});
		}

		let source = match loader.load(page) {
			Ok(Some(source)) => source,
			Ok(None) => {
				return Err(PageError {
					page: page.clone(),
					chain: Vec::new(),
					stage: Stage::Loaded,
					error: WeftError::Io(std::io::Error::new(
						std::io::ErrorKind::NotFound,
						format!("page `{}` not found", page.display()),
					)),
				});
			}
			Err(error) => {
				return Err(PageError {
					page: page.clone(),
					chain: Vec::new(),
					stage: Stage::Loaded,
					error,
				});
			}
		};

		compose_page(page, &source, registry, loader, cancel)
	};

	let outcomes: Vec<PageOutcome> = if options.parallelism > 0 {
		match rayon::ThreadPoolBuilder::new()
			.num_threads(options.parallelism)
			.build()
		{
			Ok(pool) => pool.install(|| pages.par_iter().map(job).collect()),
			Err(error) => {
				warn!(%error, "failed to build worker pool, using the global pool");
				pages.par_iter().map(job).collect()
			}
		}
	} else {
		pages.par_iter().map(job).collect()
	};

	let report = BuildReport {
		outcomes,
		duration: started.elapsed(),
	};
	debug!(
		composed = report.composed_count(),
		failed = report.failed_count(),
		warnings = report.warning_count(),
		"build finished"
	);

	report
}

/// Build a `GlobSet` from a list of glob pattern strings.
fn build_glob_set(patterns: &[String]) -> GlobSet {
	let mut builder = GlobSetBuilder::new();
	for pattern in patterns {
		if let Ok(glob) = Glob::new(pattern) {
			builder.add(glob);
		}
	}
	builder.build().unwrap_or_else(|_| GlobSet::empty())
}

/// Build a `Gitignore` matcher from exclude patterns. These follow
/// `.gitignore` syntax.
fn build_exclude_matcher(root: &Path, patterns: &[String]) -> WeftResult<Gitignore> {
	let mut builder = GitignoreBuilder::new(root);
	for pattern in patterns {
		builder.add_line(None, pattern).map_err(|e| {
			WeftError::ConfigParse(format!("invalid exclude pattern `{pattern}`: {e}"))
		})?;
	}
	builder
		.build()
		.map_err(|e| WeftError::ConfigParse(format!("failed to build exclude rules: {e}")))
}

fn is_ignored_directory_name(name: &str) -> bool {
	name.starts_with('.') || name == "node_modules" || name == "target"
}

fn walk_dir(
	root: &Path,
	dir: &Path,
	options: &BuildOptions,
	exclude: &Gitignore,
	pages: &mut Vec<PathBuf>,
) -> WeftResult<()> {
	if !dir.is_dir() {
		return Ok(());
	}

	for entry in std::fs::read_dir(dir)? {
		let entry = entry?;
		let path = entry.path();
		let is_dir = path.is_dir();

		// Skip hidden paths and common non-source directories.
		if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
			if is_ignored_directory_name(name) {
				continue;
			}
		}

		let Ok(rel) = path.strip_prefix(root) else {
			continue;
		};

		// Layout templates are registry input, not pages.
		if rel == options.layouts_dir {
			continue;
		}

		if exclude.matched(&path, is_dir).is_ignore() {
			continue;
		}

		if is_dir {
			walk_dir(root, &path, options, exclude, pages)?;
		} else if is_page_file(rel, options) {
			pages.push(rel.to_path_buf());
		}
	}

	Ok(())
}

/// Check whether a file should be composed as a page.
fn is_page_file(rel: &Path, options: &BuildOptions) -> bool {
	if !options.include_set.is_empty() && options.include_set.is_match(rel) {
		return true;
	}

	let Some(ext) = rel.extension().and_then(|e| e.to_str()) else {
		return false;
	};

	options.page_extensions.iter().any(|allowed| allowed == ext)
}

fn collect_layout_files(root: &Path, dir: &Path, layouts: &mut Vec<PathBuf>) -> WeftResult<()> {
	for entry in std::fs::read_dir(dir)? {
		let entry = entry?;
		let path = entry.path();

		if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
			if is_ignored_directory_name(name) {
				continue;
			}
		}

		if path.is_dir() {
			collect_layout_files(root, &path, layouts)?;
		} else if let Ok(rel) = path.strip_prefix(root) {
			layouts.push(rel.to_path_buf());
		}
	}

	Ok(())
}
