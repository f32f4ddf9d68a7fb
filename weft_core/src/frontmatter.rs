use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::WeftError;
use crate::WeftResult;
use crate::position::Location;

/// The reserved key declaring a document's wrapping layout.
pub const LAYOUT_KEY: &str = "layout";

/// The reserved key holding a page's rendered body. Set by the pipeline,
/// never declared by the author.
pub const CONTENT_KEY: &str = "content";

/// The delimiter line opening and terminating a frontmatter block.
const FRONTMATTER_FENCE: &str = "---";

/// Metadata extracted from a document's leading `---` block.
///
/// Keys map to opaque [`serde_json::Value`]s; access is always by key and
/// returns an `Option` — absent keys are visible as absent, never as a
/// silently tolerated placeholder. Two keys are reserved: [`LAYOUT_KEY`]
/// names the wrapping layout and [`CONTENT_KEY`] is appended by the
/// pipeline once the body has been rendered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrontmatterRecord {
	fields: BTreeMap<String, Value>,
}

impl FrontmatterRecord {
	/// An empty record, as produced for documents without a metadata block.
	pub fn empty() -> Self {
		Self::default()
	}

	/// Look up a value by key.
	pub fn get(&self, key: &str) -> Option<&Value> {
		self.fields.get(key)
	}

	/// The declared layout identifier, if any.
	pub fn layout(&self) -> Option<&str> {
		self.fields.get(LAYOUT_KEY).and_then(Value::as_str)
	}

	/// The rendered body, once the pipeline has set it.
	pub fn content(&self) -> Option<&str> {
		self.fields.get(CONTENT_KEY).and_then(Value::as_str)
	}

	/// All fields, for handing the record to the interpolation context.
	pub fn fields(&self) -> &BTreeMap<String, Value> {
		&self.fields
	}

	pub fn is_empty(&self) -> bool {
		self.fields.is_empty()
	}

	/// Append the reserved `content` field. The record is frozen afterwards:
	/// every chain link sees the same record.
	pub(crate) fn set_content(&mut self, body: impl Into<String>) {
		self
			.fields
			.insert(CONTENT_KEY.to_string(), Value::String(body.into()));
	}
}

/// The result of splitting a document into metadata and body.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
	/// The parsed metadata record, without the reserved `content` field.
	pub record: FrontmatterRecord,
	/// The document body following the metadata block.
	pub body: String,
	/// The location of the body's first byte within the original source.
	pub body_start: Location,
}

/// Extract the leading frontmatter block from `source`.
///
/// A document without a leading `---` line has an empty record and its
/// whole source as the body. A block whose terminator is missing fails
/// before any partial record is produced.
pub fn extract(path: &Path, source: &str) -> WeftResult<Extracted> {
	if !has_frontmatter_fence(source) {
		return Ok(Extracted {
			record: FrontmatterRecord::empty(),
			body: source.to_string(),
			body_start: Location::default(),
		});
	}

	let mut location = Location::default();
	let mut lines = source.split_inclusive('\n');

	// Consume the opening fence.
	let opening = lines.next().unwrap_or(source);
	location.advance_str(opening);

	let block_start = location.offset;
	let mut block_end = None;

	for line in lines {
		if line.trim_end_matches(['\n', '\r']) == FRONTMATTER_FENCE {
			block_end = Some(location.offset);
			location.advance_str(line);
			break;
		}
		location.advance_str(line);
	}

	let Some(block_end) = block_end else {
		return Err(WeftError::MissingFrontmatterTerminator {
			path: path.to_path_buf(),
		});
	};

	let block = &source[block_start..block_end];
	let record = parse_block(path, block)?;
	let body = source[location.offset..].to_string();

	Ok(Extracted {
		record,
		body,
		body_start: location,
	})
}

/// True when the document opens with a frontmatter fence on its first line.
fn has_frontmatter_fence(source: &str) -> bool {
	let first_line = source.lines().next().unwrap_or("");
	first_line.trim_end_matches('\r') == FRONTMATTER_FENCE
}

/// Parse the text between the fences into a record, enforcing that it is a
/// mapping with string keys and that reserved keys are well-formed.
fn parse_block(path: &Path, block: &str) -> WeftResult<FrontmatterRecord> {
	if block.trim().is_empty() {
		return Ok(FrontmatterRecord::empty());
	}

	let fields: BTreeMap<String, Value> =
		serde_yaml_ng::from_str(block).map_err(|error| WeftError::MalformedFrontmatter {
			path: path.to_path_buf(),
			reason: error.to_string(),
		})?;

	if fields.contains_key(CONTENT_KEY) {
		return Err(WeftError::MalformedFrontmatter {
			path: path.to_path_buf(),
			reason: format!("`{CONTENT_KEY}` is reserved for the rendered body"),
		});
	}

	if let Some(layout) = fields.get(LAYOUT_KEY) {
		if !layout.is_string() {
			return Err(WeftError::MalformedFrontmatter {
				path: path.to_path_buf(),
				reason: format!("`{LAYOUT_KEY}` must be a string path"),
			});
		}
	}

	Ok(FrontmatterRecord { fields })
}
