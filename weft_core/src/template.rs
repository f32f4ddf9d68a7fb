use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::Position;
use crate::WeftError;
use crate::WeftResult;
use crate::frontmatter;
use crate::lexer::TemplateEvent;
use crate::lexer::lex_template;

/// A slot marker within a template's fragment sequence.
///
/// An empty [`name`](SlotMarker::name) denotes the default slot. Fallback
/// content, when declared between `<slot …>` and `</slot>`, is rendered
/// only when no content is supplied for the slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotMarker {
	/// The slot name; empty for the default slot.
	pub name: String,
	/// Position of the marker in the template source.
	pub position: Position,
	/// Verbatim fallback markup declared inside the marker, if any.
	pub fallback: Option<String>,
}

impl SlotMarker {
	pub fn is_default(&self) -> bool {
		self.name.is_empty()
	}
}

/// One element of a template's ordered content sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Fragment {
	/// A verbatim run of static content.
	Static(String),
	/// A content injection point.
	Slot(SlotMarker),
}

/// A parsed layout template: an ordered sequence of static fragments and
/// slot markers, plus the style imports it declares and its own
/// frontmatter (which may name a further wrapping layout).
///
/// Templates are immutable after parse and shared behind `Arc` by the
/// [registry](crate::TemplateRegistry).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
	id: PathBuf,
	fragments: Vec<Fragment>,
	imports: Vec<String>,
	frontmatter: frontmatter::FrontmatterRecord,
}

impl Template {
	/// Parse template source, enforcing the slot invariants: at most one
	/// default slot, unique names among named slots.
	pub fn parse(id: impl Into<PathBuf>, source: &str) -> WeftResult<Self> {
		let id = id.into();
		let extracted = frontmatter::extract(&id, source)?;
		let events = lex_template(&id, &extracted.body, extracted.body_start)?;

		let mut fragments = Vec::new();
		let mut imports = Vec::new();
		let mut seen_default = false;
		let mut seen_names: HashSet<String> = HashSet::new();

		for event in events {
			match event {
				TemplateEvent::Text(text) => fragments.push(Fragment::Static(text)),
				TemplateEvent::Slot {
					name,
					fallback,
					position,
				} => {
					if name.is_empty() {
						if seen_default {
							return Err(WeftError::DuplicateDefaultSlot { path: id });
						}
						seen_default = true;
					} else if !seen_names.insert(name.clone()) {
						return Err(WeftError::DuplicateSlotName { name, path: id });
					}

					fragments.push(Fragment::Slot(SlotMarker {
						name,
						position,
						fallback,
					}));
				}
				TemplateEvent::Import { src, .. } => imports.push(src),
			}
		}

		Ok(Self {
			id,
			fragments,
			imports,
			frontmatter: extracted.record,
		})
	}

	pub fn id(&self) -> &Path {
		&self.id
	}

	/// The ordered content sequence.
	pub fn fragments(&self) -> &[Fragment] {
		&self.fragments
	}

	/// Declared style imports, in document order.
	pub fn imports(&self) -> &[String] {
		&self.imports
	}

	/// The template's own frontmatter.
	pub fn frontmatter(&self) -> &frontmatter::FrontmatterRecord {
		&self.frontmatter
	}

	/// The further wrapping layout this template declares, if any.
	pub fn layout(&self) -> Option<&str> {
		self.frontmatter.layout()
	}

	/// True when the template declares a slot with the given name (empty
	/// string for the default slot).
	pub fn has_slot(&self, name: &str) -> bool {
		self.fragments.iter().any(|fragment| {
			matches!(fragment, Fragment::Slot(marker) if marker.name == name)
		})
	}

	/// True when the template declares at least one slot marker.
	pub fn has_slots(&self) -> bool {
		self
			.fragments
			.iter()
			.any(|fragment| matches!(fragment, Fragment::Slot(_)))
	}
}
