use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use tracing::trace;
use tracing::warn;

use crate::ContentNode;
use crate::Template;
use crate::WeftError;
use crate::frontmatter;
use crate::frontmatter::FrontmatterRecord;
use crate::interpolate;
use crate::loader::SourceLoader;
use crate::node::ComposeWarning;
use crate::registry::TemplateRegistry;
use crate::resolver::SlotContent;
use crate::resolver::resolve_with;

/// Cooperative cancellation flag shared between a build's pages.
///
/// Tripping the token makes every in-flight page abort at its next stage
/// boundary without emitting a partial tree; the registry is left
/// consistent.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
	flag: Arc<AtomicBool>,
}

impl CancelToken {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn cancel(&self) {
		self.flag.store(true, Ordering::Relaxed);
	}

	pub fn is_cancelled(&self) -> bool {
		self.flag.load(Ordering::Relaxed)
	}
}

/// The states a page's build moves through. Failure is reachable from
/// every state; [`PageError::stage`] records the last state reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Stage {
	Loaded,
	FrontmatterExtracted,
	LayoutResolving,
	LayoutChainBuilt,
	Rendered,
	Emitted,
}

impl std::fmt::Display for Stage {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			Self::Loaded => "loaded",
			Self::FrontmatterExtracted => "frontmatter-extracted",
			Self::LayoutResolving => "layout-resolving",
			Self::LayoutChainBuilt => "layout-chain-built",
			Self::Rendered => "rendered",
			Self::Emitted => "emitted",
		};
		f.write_str(name)
	}
}

/// The final output of one page's build.
#[derive(Debug, Clone)]
pub struct ComposedPage {
	/// The page identifier.
	pub page: PathBuf,
	/// The fully slot-resolved output tree.
	pub node: ContentNode,
	/// The page's frontmatter record, including the rendered `content`
	/// field, as every chain link saw it.
	pub frontmatter: Arc<FrontmatterRecord>,
	/// Style imports aggregated over the layout chain, outermost template
	/// first, document order preserved within each template, first
	/// occurrence kept on duplicates.
	pub imports: Vec<String>,
	/// Non-fatal issues collected across the build.
	pub warnings: Vec<ComposeWarning>,
}

/// A failed page build: the page, the partial layout chain built so far,
/// the last pipeline state reached, and the underlying error. One page's
/// failure never affects another page's build.
#[derive(Debug)]
pub struct PageError {
	pub page: PathBuf,
	pub chain: Vec<PathBuf>,
	pub stage: Stage,
	pub error: WeftError,
}

impl std::fmt::Display for PageError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "failed to compose `{}`", self.page.display())?;
		if !self.chain.is_empty() {
			let chain = self
				.chain
				.iter()
				.map(|id| id.display().to_string())
				.collect::<Vec<_>>()
				.join(" -> ");
			write!(f, " (chain: {chain})")?;
		}
		write!(f, " at stage {}: {}", self.stage, self.error)
	}
}

impl std::error::Error for PageError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		Some(&self.error)
	}
}

/// Drives one page through the composition state machine.
struct Composer<'a> {
	page: &'a Path,
	registry: &'a TemplateRegistry,
	loader: &'a dyn SourceLoader,
	cancel: &'a CancelToken,
	stage: Stage,
	chain_ids: Vec<PathBuf>,
	warnings: Vec<ComposeWarning>,
}

impl<'a> Composer<'a> {
	fn fail(&mut self, error: WeftError) -> PageError {
		PageError {
			page: self.page.to_path_buf(),
			chain: std::mem::take(&mut self.chain_ids),
			stage: self.stage,
			error,
		}
	}

	fn enter(&mut self, stage: Stage) {
		trace!(page = %self.page.display(), %stage, "pipeline stage");
		self.stage = stage;
	}

	fn check_cancelled(&mut self) -> Result<(), PageError> {
		if self.cancel.is_cancelled() {
			let error = WeftError::Cancelled {
				page: self.page.to_path_buf(),
			};
			return Err(self.fail(error));
		}
		Ok(())
	}

	/// Build the layout chain, innermost first, with a cycle check against
	/// the ordered chain built so far. No rendering happens until the full
	/// chain is known.
	fn build_chain(&mut self, first: &str) -> Result<Vec<Arc<Template>>, PageError> {
		self.enter(Stage::LayoutResolving);
		let mut chain: Vec<Arc<Template>> = Vec::new();
		let mut next = Some(PathBuf::from(first));

		while let Some(id) = next {
			self.check_cancelled()?;

			if self.chain_ids.contains(&id) {
				let error = WeftError::LayoutCycle {
					layout: id,
					chain: self.chain_ids.clone(),
				};
				return Err(self.fail(error));
			}

			let template = match self.registry.get_or_load(&id, self.loader) {
				Ok(Some(template)) => template,
				Ok(None) => {
					let error = WeftError::LayoutNotFound {
						layout: id,
						page: self.page.to_path_buf(),
					};
					return Err(self.fail(error));
				}
				Err(error) => return Err(self.fail(error)),
			};

			self.chain_ids.push(id);
			next = template.layout().map(PathBuf::from);
			chain.push(template);
		}

		self.enter(Stage::LayoutChainBuilt);
		Ok(chain)
	}

	/// Resolve the chain innermost-first, feeding each result into the next
	/// outer layout's default slot. The frontmatter record is shared
	/// unchanged by every link.
	fn render_chain(
		&mut self,
		chain: &[Arc<Template>],
		record: &FrontmatterRecord,
		body: String,
	) -> Result<ContentNode, PageError> {
		let mut inner = Arc::new(ContentNode::text(body));

		for template in chain {
			self.check_cancelled()?;

			let supplied = SlotContent::with_default(Arc::clone(&inner));
			let resolved = match resolve_with(template, &supplied, record) {
				Ok(resolved) => resolved,
				Err(error) => return Err(self.fail(error)),
			};

			self.warnings.extend(resolved.warnings);
			inner = Arc::new(resolved.node);
		}

		self.enter(Stage::Rendered);
		Ok(Arc::unwrap_or_clone(inner))
	}

	fn run(mut self, source: &str) -> Result<ComposedPage, PageError> {
		self.check_cancelled()?;

		// Loaded -> FrontmatterExtracted
		let extracted = match frontmatter::extract(self.page, source) {
			Ok(extracted) => extracted,
			Err(error) => return Err(self.fail(error)),
		};
		self.enter(Stage::FrontmatterExtracted);

		let mut record = extracted.record;
		let layout = record.layout().map(str::to_string);

		// The body is rendered against the page's own record before the
		// reserved `content` field exists.
		let undefined = interpolate::find_undefined_variables(&extracted.body, &record);
		if !undefined.is_empty() {
			self.warnings.push(ComposeWarning::UndefinedVariables {
				template: self.page.to_path_buf(),
				variables: undefined,
			});
		}
		let body = match interpolate::render_fragment(self.page, &extracted.body, &record) {
			Ok(body) => body,
			Err(error) => return Err(self.fail(error)),
		};
		record.set_content(body.clone());
		let record = Arc::new(record);

		let node = match layout {
			Some(layout) => {
				let chain = self.build_chain(&layout)?;
				self.render_chain(&chain, &record, body)?
			}
			None => {
				// Self-contained page: no chain to resolve.
				self.enter(Stage::Rendered);
				ContentNode::text(body)
			}
		};

		self.check_cancelled()?;
		self.enter(Stage::Emitted);

		let imports = self.aggregate_imports();
		if !self.warnings.is_empty() {
			warn!(
				page = %self.page.display(),
				count = self.warnings.len(),
				"composition finished with warnings"
			);
		}

		Ok(ComposedPage {
			page: self.page.to_path_buf(),
			node,
			frontmatter: record,
			imports,
			warnings: self.warnings,
		})
	}

	/// Aggregate declared imports over the chain: outermost template first,
	/// document order within each template, first occurrence wins.
	fn aggregate_imports(&self) -> Vec<String> {
		let mut imports: Vec<String> = Vec::new();

		for id in self.chain_ids.iter().rev() {
			let Some(template) = self.registry.lookup(id) else {
				continue;
			};
			for import in template.imports() {
				if !imports.iter().any(|seen| seen == import) {
					imports.push(import.clone());
				}
			}
		}

		imports
	}
}

/// Compose a single page: extract frontmatter, resolve the declared layout
/// chain, and substitute content innermost-first until the outermost
/// layout is resolved.
///
/// `source` is the page's raw text as obtained from the loader; `registry`
/// caches parsed layouts and is the only state shared with other pages.
pub fn compose_page(
	page: &Path,
	source: &str,
	registry: &TemplateRegistry,
	loader: &dyn SourceLoader,
	cancel: &CancelToken,
) -> Result<ComposedPage, PageError> {
	let composer = Composer {
		page,
		registry,
		loader,
		cancel,
		stage: Stage::Loaded,
		chain_ids: Vec::new(),
		warnings: Vec::new(),
	};

	composer.run(source)
}
