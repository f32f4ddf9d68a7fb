use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use crate::WeftError;
use crate::WeftResult;
use crate::config::DEFAULT_MAX_FILE_SIZE;

/// The seam through which the engine obtains page and layout sources.
///
/// Identifiers are paths relative to whatever root the loader wraps; the
/// engine never touches the filesystem directly, so tests and virtual
/// filesystems plug in here. `Ok(None)` means the source does not exist —
/// the pipeline turns that into a layout-not-found failure with the
/// requesting page attached.
pub trait SourceLoader: Send + Sync {
	fn load(&self, id: &Path) -> WeftResult<Option<String>>;
}

/// Disk-backed loader rooted at a directory.
#[derive(Debug, Clone)]
pub struct FsLoader {
	root: PathBuf,
	max_file_size: u64,
}

impl FsLoader {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self {
			root: root.into(),
			max_file_size: DEFAULT_MAX_FILE_SIZE,
		}
	}

	pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
		self.max_file_size = max_file_size;
		self
	}

	pub fn root(&self) -> &Path {
		&self.root
	}
}

impl SourceLoader for FsLoader {
	fn load(&self, id: &Path) -> WeftResult<Option<String>> {
		let path = self.root.join(id);
		if !path.is_file() {
			return Ok(None);
		}

		let metadata = std::fs::metadata(&path)?;
		if metadata.len() > self.max_file_size {
			return Err(WeftError::FileTooLarge {
				path: path.display().to_string(),
				size: metadata.len(),
				limit: self.max_file_size,
			});
		}

		let raw = std::fs::read_to_string(&path)?;
		Ok(Some(normalize_line_endings(&raw)))
	}
}

/// In-memory loader for tests and embedded sources.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
	files: HashMap<PathBuf, String>,
}

impl MemoryLoader {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, id: impl Into<PathBuf>, source: impl Into<String>) -> &mut Self {
		self.files.insert(id.into(), source.into());
		self
	}
}

impl SourceLoader for MemoryLoader {
	fn load(&self, id: &Path) -> WeftResult<Option<String>> {
		Ok(self.files.get(id).map(|source| normalize_line_endings(source)))
	}
}

/// Normalize CRLF line endings to LF.
pub fn normalize_line_endings(content: &str) -> String {
	if content.contains('\r') {
		content.replace("\r\n", "\n").replace('\r', "\n")
	} else {
		content.to_string()
	}
}
