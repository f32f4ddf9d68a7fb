use std::collections::BTreeMap;
use std::sync::Arc;

use crate::ContentNode;
use crate::Template;
use crate::WeftResult;
use crate::frontmatter::FrontmatterRecord;
use crate::interpolate;
use crate::node::ComposeWarning;
use crate::node::NodePiece;
use crate::template::Fragment;

/// Content supplied for a template's slots, keyed by slot name. The empty
/// name addresses the default slot.
#[derive(Debug, Clone, Default)]
pub struct SlotContent {
	entries: BTreeMap<String, Arc<ContentNode>>,
}

impl SlotContent {
	pub fn new() -> Self {
		Self::default()
	}

	/// Content for the default slot only — the common case when wrapping a
	/// page body or an inner layout's output.
	pub fn with_default(node: Arc<ContentNode>) -> Self {
		let mut content = Self::new();
		content.insert("", node);
		content
	}

	pub fn insert(&mut self, name: impl Into<String>, node: Arc<ContentNode>) {
		self.entries.insert(name.into(), node);
	}

	pub fn get(&self, name: &str) -> Option<&Arc<ContentNode>> {
		self.entries.get(name)
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Supplied slot names, in sorted order.
	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.entries.keys().map(String::as_str)
	}
}

/// The outcome of resolving one template's slots.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
	/// The composed output tree.
	pub node: ContentNode,
	/// Non-fatal issues collected during resolution.
	pub warnings: Vec<ComposeWarning>,
}

/// Substitute `supplied` content into `template`'s slot markers.
///
/// Static fragments are copied verbatim. Each marker is resolved
/// independently, in document order: the matching supplied entry wins,
/// then declared fallback content, then empty content. Supplied entries
/// matching no marker are collected as warnings, never an abort.
pub fn resolve(template: &Template, supplied: &SlotContent) -> WeftResult<Resolved> {
	resolve_with(template, supplied, &FrontmatterRecord::empty())
}

/// Like [`resolve`], but static fragments and fallback content are first
/// rendered against the page's frontmatter record. Undefined variable
/// references are collected as a warning per template rather than
/// aborting.
pub fn resolve_with(
	template: &Template,
	supplied: &SlotContent,
	record: &FrontmatterRecord,
) -> WeftResult<Resolved> {
	let mut pieces = Vec::with_capacity(template.fragments().len());
	let mut warnings = Vec::new();
	let mut undefined: Vec<String> = Vec::new();

	for fragment in template.fragments() {
		match fragment {
			Fragment::Static(text) => {
				collect_undefined(text, record, &mut undefined);
				let rendered = interpolate::render_fragment(template.id(), text, record)?;
				pieces.push(NodePiece::Text(rendered));
			}
			Fragment::Slot(marker) => {
				if let Some(node) = supplied.get(&marker.name) {
					pieces.push(NodePiece::Node(Arc::clone(node)));
				} else if let Some(fallback) = &marker.fallback {
					collect_undefined(fallback, record, &mut undefined);
					let rendered = interpolate::render_fragment(template.id(), fallback, record)?;
					pieces.push(NodePiece::Text(rendered));
				}
				// No supplied content and no fallback: the slot resolves to
				// empty content.
			}
		}
	}

	// Only named entries warn: default-slot content handed to a slotless
	// template is silently ignored.
	for name in supplied.names() {
		if !name.is_empty() && !template.has_slot(name) {
			warnings.push(ComposeWarning::UnmatchedSlotContent {
				slot: name.to_string(),
				template: template.id().to_path_buf(),
			});
		}
	}

	if !undefined.is_empty() {
		undefined.sort();
		undefined.dedup();
		warnings.push(ComposeWarning::UndefinedVariables {
			template: template.id().to_path_buf(),
			variables: undefined,
		});
	}

	Ok(Resolved {
		node: ContentNode::from_pieces(pieces),
		warnings,
	})
}

fn collect_undefined(fragment: &str, record: &FrontmatterRecord, into: &mut Vec<String>) {
	into.extend(interpolate::find_undefined_variables(fragment, record));
}
