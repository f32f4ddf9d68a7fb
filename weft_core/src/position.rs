use serde::Deserialize;
use serde::Serialize;

/// A single point in a source file. Lines and columns are 1-indexed,
/// offsets are 0-indexed byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
	pub line: usize,
	pub column: usize,
	pub offset: usize,
}

impl Location {
	pub fn new(line: usize, column: usize, offset: usize) -> Self {
		Self {
			line,
			column,
			offset,
		}
	}

	/// Advance this location through the given text slice, tracking line
	/// breaks.
	pub fn advance_str(&mut self, text: &str) {
		for ch in text.chars() {
			if ch == '\n' {
				self.line += 1;
				self.column = 1;
			} else {
				self.column += 1;
			}
		}
		self.offset += text.len();
	}
}

impl Default for Location {
	fn default() -> Self {
		Self {
			line: 1,
			column: 1,
			offset: 0,
		}
	}
}

/// The span of a marker in a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
	pub start: Location,
	pub end: Location,
}

impl Position {
	pub fn new(
		start_line: usize,
		start_column: usize,
		start_offset: usize,
		end_line: usize,
		end_column: usize,
		end_offset: usize,
	) -> Self {
		Self {
			start: Location::new(start_line, start_column, start_offset),
			end: Location::new(end_line, end_column, end_offset),
		}
	}

	/// A zero-width position at the given location.
	pub fn at(location: Location) -> Self {
		Self {
			start: location,
			end: location,
		}
	}
}

impl std::fmt::Display for Position {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}:{}", self.start.line, self.start.column)
	}
}
