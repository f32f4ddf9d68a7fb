use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum WeftError {
	#[error(transparent)]
	#[diagnostic(code(weft::io_error))]
	Io(#[from] std::io::Error),

	#[error("unterminated tag in `{}` at {line}:{column}", .path.display())]
	#[diagnostic(
		code(weft::unterminated_tag),
		help("close the tag with `/>` or `>` before the end of the file")
	)]
	UnterminatedTag {
		path: PathBuf,
		line: usize,
		column: usize,
	},

	#[error("malformed tag in `{}` at {line}:{column}: {reason}", .path.display())]
	#[diagnostic(
		code(weft::malformed_tag),
		help("slot tags accept a single `name=\"...\"` attribute, import tags a single `src=\"...\"`")
	)]
	MalformedTag {
		path: PathBuf,
		line: usize,
		column: usize,
		reason: String,
	},

	#[error("slot `{name}` in `{}` is never closed", .path.display())]
	#[diagnostic(
		code(weft::unclosed_slot),
		help("add `</slot>` after the fallback content, or make the slot self-closing with `/>`")
	)]
	UnclosedSlot { name: String, path: PathBuf },

	#[error("template `{}` declares more than one default slot", .path.display())]
	#[diagnostic(
		code(weft::duplicate_default_slot),
		help("a template may contain at most one unnamed `<slot />`; name the others")
	)]
	DuplicateDefaultSlot { path: PathBuf },

	#[error("template `{}` declares slot `{name}` more than once", .path.display())]
	#[diagnostic(
		code(weft::duplicate_slot_name),
		help("slot names must be unique within a template")
	)]
	DuplicateSlotName { name: String, path: PathBuf },

	#[error("frontmatter block in `{}` is missing its closing `---`", .path.display())]
	#[diagnostic(
		code(weft::missing_frontmatter_terminator),
		help("terminate the leading metadata block with a line containing only `---`")
	)]
	MissingFrontmatterTerminator { path: PathBuf },

	#[error("malformed frontmatter in `{}`: {reason}", .path.display())]
	#[diagnostic(
		code(weft::malformed_frontmatter),
		help("the metadata block must be a mapping of string keys to values")
	)]
	MalformedFrontmatter { path: PathBuf, reason: String },

	#[error("layout `{}` declared by `{}` was not found", .layout.display(), .page.display())]
	#[diagnostic(
		code(weft::layout_not_found),
		help("check the `layout:` path against the registry's layout directory")
	)]
	LayoutNotFound { layout: PathBuf, page: PathBuf },

	#[error(
		"layout `{}` appears twice in the chain [{}]",
		.layout.display(),
		format_chain(.chain)
	)]
	#[diagnostic(
		code(weft::layout_cycle),
		help("a layout may not wrap itself, directly or through another layout")
	)]
	LayoutCycle {
		layout: PathBuf,
		chain: Vec<PathBuf>,
	},

	#[error("fragment rendering failed in `{}`: {reason}", .path.display())]
	#[diagnostic(
		code(weft::render_failed),
		help("check the `{{{{ ... }}}}` expressions against the page's frontmatter keys")
	)]
	RenderFailed { path: PathBuf, reason: String },

	#[error("file too large: `{path}` is {size} bytes (limit: {limit} bytes)")]
	#[diagnostic(
		code(weft::file_too_large),
		help("raise `max_file_size` in weft.toml or exclude this file")
	)]
	FileTooLarge { path: String, size: u64, limit: u64 },

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(weft::config_parse),
		help("check that weft.toml is valid TOML with [layouts], [pages], and/or [exclude] sections")
	)]
	ConfigParse(String),

	#[error("build of `{}` was cancelled", .page.display())]
	#[diagnostic(code(weft::cancelled))]
	Cancelled { page: PathBuf },
}

pub type WeftResult<T> = Result<T, WeftError>;

fn format_chain(chain: &[PathBuf]) -> String {
	chain
		.iter()
		.map(|id| id.display().to_string())
		.collect::<Vec<_>>()
		.join(" -> ")
}
