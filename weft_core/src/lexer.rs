use std::path::Path;
use std::path::PathBuf;

use logos::Logos;
use snailquote::unescape;

use crate::Position;
use crate::WeftError;
use crate::WeftResult;
use crate::position::Location;

/// Raw tokens produced by logos for flat tokenization of template source.
#[derive(Logos, Debug, PartialEq)]
enum RawToken {
	#[token("<slot")]
	SlotOpen,
	#[token("<import")]
	ImportOpen,
	#[token("</slot>")]
	SlotClose,
	#[token("/>")]
	SelfClose,
	#[token(">")]
	TagEnd,
	#[token("=")]
	Equals,
	#[token("\n")]
	Newline,
	#[regex(r"[ \t\r]+")]
	Whitespace,
	#[regex(r"[a-zA-Z_][a-zA-Z0-9_-]*")]
	Ident,
	#[regex(r#""([^"\\]|\\.)*""#)]
	DoubleQuotedString,
	#[regex(r"'([^'\\]|\\.)*'")]
	SingleQuotedString,
}

/// The kind of tag currently being parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
	Slot,
	Import,
}

/// A marker or text run extracted from template source, in document order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TemplateEvent {
	/// A verbatim run of static content.
	Text(String),
	/// A slot marker. An empty `name` denotes the default slot.
	Slot {
		name: String,
		fallback: Option<String>,
		position: Position,
	},
	/// A style/asset import declaration.
	Import { src: String, position: Position },
}

/// Walks the logos token stream with context-dependent rules, building
/// [`TemplateEvent`]s. Everything outside a recognized tag is static text.
struct TokenWalker<'a> {
	/// The template identifier, for diagnostics.
	path: PathBuf,
	/// The template source text.
	source: &'a str,
	/// The collected raw tokens and their byte spans.
	raw_tokens: Vec<(Result<RawToken, ()>, std::ops::Range<usize>)>,
	/// Current index into `raw_tokens`.
	cursor: usize,
	/// The current position tracker.
	location: Location,
	/// Static text accumulated since the last flushed event.
	text: String,
	/// Collected events.
	events: Vec<TemplateEvent>,
}

impl<'a> TokenWalker<'a> {
	fn new(path: &Path, source: &'a str, start: Location) -> Self {
		let raw_tokens: Vec<_> = RawToken::lexer(source).spanned().collect();

		Self {
			path: path.to_path_buf(),
			source,
			raw_tokens,
			cursor: 0,
			location: start,
			text: String::new(),
			events: Vec::new(),
		}
	}

	/// Get the text slice for the current raw token.
	fn current_slice(&self) -> &'a str {
		let (_, span) = &self.raw_tokens[self.cursor];
		&self.source[span.clone()]
	}

	/// Advance the position tracker through the current token and move the
	/// cursor forward.
	fn advance_cursor(&mut self) {
		let slice = self.current_slice();
		self.location.advance_str(slice);
		self.cursor += 1;
	}

	/// Consume the current token as static text.
	fn consume_as_text(&mut self) {
		let slice = self.current_slice();
		self.text.push_str(slice);
		self.advance_cursor();
	}

	/// Flush accumulated static text into a `Text` event.
	fn flush_text(&mut self) {
		if !self.text.is_empty() {
			let text = std::mem::take(&mut self.text);
			self.events.push(TemplateEvent::Text(text));
		}
	}

	/// True when the token after the current one starts immediately at the
	/// current token's end and is an identifier. Used to reject lookalike
	/// elements such as `<slotted>` or `<importer>`.
	fn next_is_adjacent_ident(&self) -> bool {
		let Some((_, span)) = self.raw_tokens.get(self.cursor) else {
			return false;
		};
		match self.raw_tokens.get(self.cursor + 1) {
			Some((Ok(RawToken::Ident), next_span)) => next_span.start == span.end,
			_ => false,
		}
	}

	fn malformed(&self, reason: impl Into<String>) -> WeftError {
		WeftError::MalformedTag {
			path: self.path.clone(),
			line: self.location.line,
			column: self.location.column,
			reason: reason.into(),
		}
	}

	/// Parse a quoted attribute value, stripping the quotes and unescaping
	/// when needed.
	fn attribute_value(&mut self) -> WeftResult<String> {
		let slice = self.current_slice();
		let inner = &slice[1..slice.len() - 1];

		let value = if inner.contains('\\') {
			unescape(inner).map_err(|_| self.malformed("invalid escape in attribute value"))?
		} else {
			inner.to_string()
		};

		self.advance_cursor();
		Ok(value)
	}

	/// Parse the attribute list and terminator of a tag whose opening token
	/// has already been consumed. Returns the sole permitted attribute value
	/// (if present) and whether the tag was self-closing.
	fn parse_tag(&mut self, kind: TagKind, start: Location) -> WeftResult<(Option<String>, bool)> {
		let expected_attr = match kind {
			TagKind::Slot => "name",
			TagKind::Import => "src",
		};
		let mut value: Option<String> = None;

		loop {
			let Some((result, _)) = self.raw_tokens.get(self.cursor) else {
				return Err(WeftError::UnterminatedTag {
					path: self.path.clone(),
					line: start.line,
					column: start.column,
				});
			};

			match result {
				Ok(RawToken::Whitespace | RawToken::Newline) => self.advance_cursor(),
				Ok(RawToken::SelfClose) => {
					self.advance_cursor();
					return Ok((value, true));
				}
				Ok(RawToken::TagEnd) => {
					self.advance_cursor();
					return Ok((value, false));
				}
				Ok(RawToken::Ident) => {
					let attr = self.current_slice().to_string();
					if attr != expected_attr {
						return Err(self.malformed(format!("unexpected attribute `{attr}`")));
					}
					if value.is_some() {
						return Err(self.malformed(format!("duplicate attribute `{attr}`")));
					}
					self.advance_cursor();

					while let Some((Ok(RawToken::Whitespace | RawToken::Newline), _)) =
						self.raw_tokens.get(self.cursor)
					{
						self.advance_cursor();
					}
					match self.raw_tokens.get(self.cursor) {
						Some((Ok(RawToken::Equals), _)) => self.advance_cursor(),
						_ => return Err(self.malformed(format!("expected `=` after `{attr}`"))),
					}
					while let Some((Ok(RawToken::Whitespace | RawToken::Newline), _)) =
						self.raw_tokens.get(self.cursor)
					{
						self.advance_cursor();
					}
					match self.raw_tokens.get(self.cursor) {
						Some((Ok(RawToken::DoubleQuotedString | RawToken::SingleQuotedString), _)) => {
							value = Some(self.attribute_value()?);
						}
						_ => {
							return Err(self.malformed(format!("expected quoted value for `{attr}`")));
						}
					}
				}
				_ => {
					return Err(self.malformed("unexpected token inside tag"));
				}
			}
		}
	}

	/// Accumulate fallback content for a non-self-closing slot until the
	/// matching `</slot>`. Fallback is verbatim markup; nested tags are not
	/// interpreted.
	fn parse_fallback(&mut self, name: &str) -> WeftResult<String> {
		let mut fallback = String::new();

		loop {
			let Some((result, _)) = self.raw_tokens.get(self.cursor) else {
				return Err(WeftError::UnclosedSlot {
					name: if name.is_empty() {
						"(default)".to_string()
					} else {
						name.to_string()
					},
					path: self.path.clone(),
				});
			};

			if matches!(result, Ok(RawToken::SlotClose)) {
				self.advance_cursor();
				return Ok(fallback);
			}

			fallback.push_str(self.current_slice());
			self.advance_cursor();
		}
	}

	/// Main processing loop.
	fn process(mut self) -> WeftResult<Vec<TemplateEvent>> {
		while self.cursor < self.raw_tokens.len() {
			let (result, _) = &self.raw_tokens[self.cursor];

			match result {
				Ok(RawToken::SlotOpen) if !self.next_is_adjacent_ident() => {
					let start = self.location;
					self.flush_text();
					self.advance_cursor();

					let (name, self_closing) = self.parse_tag(TagKind::Slot, start)?;
					let name = name.unwrap_or_default();
					let fallback = if self_closing {
						None
					} else {
						Some(self.parse_fallback(&name)?)
					};

					self.events.push(TemplateEvent::Slot {
						name,
						fallback,
						position: Position {
							start,
							end: self.location,
						},
					});
				}
				Ok(RawToken::ImportOpen) if !self.next_is_adjacent_ident() => {
					let start = self.location;
					self.flush_text();
					self.advance_cursor();

					let (src, _) = self.parse_tag(TagKind::Import, start)?;
					let Some(src) = src else {
						return Err(self.malformed("import tag is missing its `src` attribute"));
					};

					self.events.push(TemplateEvent::Import {
						src,
						position: Position {
							start,
							end: self.location,
						},
					});
				}
				// A stray `</slot>` with no open tag is left as text, as is
				// every other token outside a tag.
				_ => self.consume_as_text(),
			}
		}

		self.flush_text();
		Ok(self.events)
	}
}

/// Tokenize template source into an ordered event stream of static text,
/// slot markers, and import declarations. `start` is the location of the
/// first byte of `source` within the original file, so that positions stay
/// accurate after a frontmatter block has been stripped.
pub(crate) fn lex_template(
	path: &Path,
	source: &str,
	start: Location,
) -> WeftResult<Vec<TemplateEvent>> {
	TokenWalker::new(path, source, start).process()
}
