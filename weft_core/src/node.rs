use std::path::PathBuf;
use std::sync::Arc;

/// One piece of a composed output tree.
#[derive(Debug, Clone, PartialEq)]
pub enum NodePiece {
	/// A verbatim text run.
	Text(String),
	/// An already-composed child tree, shared immutably.
	Node(Arc<ContentNode>),
}

/// A fully slot-resolved output tree.
///
/// Nodes are immutable after creation and shared by reference between
/// composition steps; a downstream serializer is responsible for turning
/// the tree into an output document ([`Display`](std::fmt::Display)
/// flattens it for convenience).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentNode {
	pieces: Vec<NodePiece>,
}

impl ContentNode {
	pub fn empty() -> Self {
		Self::default()
	}

	/// A node holding a single text run.
	pub fn text(text: impl Into<String>) -> Self {
		Self {
			pieces: vec![NodePiece::Text(text.into())],
		}
	}

	pub fn from_pieces(pieces: Vec<NodePiece>) -> Self {
		Self { pieces }
	}

	pub fn pieces(&self) -> &[NodePiece] {
		&self.pieces
	}

	pub fn is_empty(&self) -> bool {
		self.pieces.iter().all(|piece| {
			match piece {
				NodePiece::Text(text) => text.is_empty(),
				NodePiece::Node(node) => node.is_empty(),
			}
		})
	}

	fn write_into(&self, out: &mut String) {
		for piece in &self.pieces {
			match piece {
				NodePiece::Text(text) => out.push_str(text),
				NodePiece::Node(node) => node.write_into(out),
			}
		}
	}
}

impl std::fmt::Display for ContentNode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let mut out = String::new();
		self.write_into(&mut out);
		f.write_str(&out)
	}
}

/// A non-fatal issue collected during composition. Warnings never abort a
/// page's build.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ComposeWarning {
	/// Supplied content referenced a slot the template does not declare.
	UnmatchedSlotContent { slot: String, template: PathBuf },
	/// A fragment referenced frontmatter keys the record does not define.
	UndefinedVariables {
		template: PathBuf,
		variables: Vec<String>,
	},
}

impl ComposeWarning {
	/// Human-readable message for this warning.
	pub fn message(&self) -> String {
		match self {
			Self::UnmatchedSlotContent { slot, template } => {
				let slot = if slot.is_empty() { "(default)" } else { slot };
				format!(
					"supplied content for slot `{slot}` matches no marker in `{}`",
					template.display()
				)
			}
			Self::UndefinedVariables {
				template,
				variables,
			} => {
				format!(
					"`{}` references undefined variable(s): {}",
					template.display(),
					variables.join(", ")
				)
			}
		}
	}
}
