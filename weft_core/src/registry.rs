use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::RwLock;

use tracing::debug;

use crate::Template;
use crate::WeftResult;
use crate::loader::SourceLoader;

/// An in-memory cache of parsed templates keyed by identifier.
///
/// The registry is an explicitly constructed, injectable object: build one
/// per site build (or retain it across incremental rebuilds) and hand it
/// to the pipeline — there is no ambient global. Reads are concurrent;
/// writes take an exclusive lock, so concurrent registrations of the same
/// identifier cannot corrupt the cache (last writer wins, and
/// registration is deterministic from source content).
#[derive(Debug, Default)]
pub struct TemplateRegistry {
	templates: RwLock<HashMap<PathBuf, Arc<Template>>>,
}

impl TemplateRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Parse `source` and cache the result under `id`. Re-registration
	/// overwrites the previous entry; registering identical source twice
	/// yields a structurally equal template.
	pub fn register(&self, id: impl Into<PathBuf>, source: &str) -> WeftResult<Arc<Template>> {
		let id = id.into();
		let template = Arc::new(Template::parse(id.clone(), source)?);

		let mut templates = self.templates.write().expect("registry lock poisoned");
		templates.insert(id, Arc::clone(&template));

		Ok(template)
	}

	/// Look up a cached template.
	pub fn lookup(&self, id: &Path) -> Option<Arc<Template>> {
		let templates = self.templates.read().expect("registry lock poisoned");
		templates.get(id).cloned()
	}

	/// Look up a template, loading and registering it on a cache miss.
	/// Returns `Ok(None)` when the loader has no source for `id`.
	///
	/// The source is loaded and parsed without holding the lock; the
	/// insert double-checks under the write lock so concurrent loaders of
	/// the same identifier end up sharing a single entry.
	pub fn get_or_load(
		&self,
		id: &Path,
		loader: &dyn SourceLoader,
	) -> WeftResult<Option<Arc<Template>>> {
		if let Some(template) = self.lookup(id) {
			debug!(id = %id.display(), "template cache hit");
			return Ok(Some(template));
		}

		let Some(source) = loader.load(id)? else {
			return Ok(None);
		};
		let template = Arc::new(Template::parse(id.to_path_buf(), source.as_str())?);
		debug!(id = %id.display(), "template loaded and registered");

		let mut templates = self.templates.write().expect("registry lock poisoned");
		let entry = templates
			.entry(id.to_path_buf())
			.or_insert_with(|| Arc::clone(&template));

		Ok(Some(Arc::clone(entry)))
	}

	/// Register every `(id, source)` pair, e.g. a layouts directory walked
	/// up front so later builds run entirely against the cache.
	pub fn preload<I, S>(&self, loader: &dyn SourceLoader, ids: I) -> WeftResult<usize>
	where
		I: IntoIterator<Item = S>,
		S: Into<PathBuf>,
	{
		let mut registered = 0;

		for id in ids {
			let id = id.into();
			let Some(source) = loader.load(&id)? else {
				continue;
			};
			self.register(id, &source)?;
			registered += 1;
		}

		Ok(registered)
	}

	/// Drop a single cached entry, e.g. on file-watch invalidation.
	/// Returns whether an entry was present.
	pub fn invalidate(&self, id: &Path) -> bool {
		let mut templates = self.templates.write().expect("registry lock poisoned");
		templates.remove(id).is_some()
	}

	/// Drop every cached entry.
	pub fn clear(&self) {
		let mut templates = self.templates.write().expect("registry lock poisoned");
		templates.clear();
	}

	pub fn len(&self) -> usize {
		let templates = self.templates.read().expect("registry lock poisoned");
		templates.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
