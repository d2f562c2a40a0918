//! Markdown section extraction.
//!
//! A document is scanned line by line. Lines are either structural or part
//! of an opaque span: front matter, a fenced code block, a multi-line HTML
//! comment, or an XML-style tag region such as `<example>` … `</example>`.
//! Heading-like lines are only considered while no opaque span is open, so
//! `## Fake` inside a code sample never ends a section.

use std::fmt;
use std::ops::Range;

use crate::MdgenError;
use crate::MdgenResult;

/// Which heading to extract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionQuery {
	/// Match the heading text, ignoring case and repeated whitespace.
	Title(String),
	/// Match an explicit `{#anchor}` or the heading's slug.
	Anchor(String),
}

impl SectionQuery {
	/// Parse a user-facing heading reference. A leading `#` selects an
	/// anchor, anything else is a title.
	pub fn parse(value: &str) -> Self {
		let value = value.trim();
		match value.strip_prefix('#') {
			Some(anchor) if !anchor.starts_with('#') && !anchor.trim().is_empty() => {
				Self::Anchor(anchor.trim().to_string())
			}
			_ => Self::Title(value.to_string()),
		}
	}

	fn matches(&self, heading: &Heading) -> bool {
		match self {
			Self::Title(title) => normalize_title(title) == normalize_title(&heading.title),
			Self::Anchor(anchor) => heading.anchor.eq_ignore_ascii_case(anchor.trim()),
		}
	}
}

impl fmt::Display for SectionQuery {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Title(title) => f.write_str(title),
			Self::Anchor(anchor) => write!(f, "#{anchor}"),
		}
	}
}

/// A structural ATX heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
	/// Number of leading `#` characters (1-6).
	pub depth: usize,
	/// Heading text with closing hashes and any `{#anchor}` removed.
	pub title: String,
	/// Explicit anchor if present, otherwise the slug of `title`.
	pub anchor: String,
	/// 1-indexed line number.
	pub line: usize,
	/// Byte range of the heading line, newline included.
	pub span: Range<usize>,
}

/// The body of a section, excluding its heading line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedSection {
	pub heading: Heading,
	pub content: String,
	/// Byte range of `content` within the source document.
	pub range: Range<usize>,
}

/// Extract the section under the heading selected by `query`.
///
/// The section runs from just after the heading line to just before the next
/// structural heading of equal or shallower depth, or to the end of the
/// document. `document` names the source in errors.
pub fn extract_section(
	document: &str,
	content: &str,
	query: &SectionQuery,
) -> MdgenResult<ExtractedSection> {
	let mut current: Option<Heading> = None;

	for heading in structural_headings(content) {
		if let Some(open) = &current {
			if heading.depth <= open.depth {
				let start = open.span.end;
				let end = heading.span.start;
				return Ok(ExtractedSection {
					heading: open.clone(),
					content: content[start..end].to_string(),
					range: start..end,
				});
			}
			continue;
		}

		if query.matches(&heading) {
			current = Some(heading);
		}
	}

	let Some(open) = current else {
		return Err(MdgenError::SectionNotFound {
			document: document.to_string(),
			heading: query.to_string(),
		});
	};

	let start = open.span.end;
	Ok(ExtractedSection {
		heading: open,
		content: content[start..].to_string(),
		range: start..content.len(),
	})
}

/// List every structural heading in `content`.
pub fn list_headings(content: &str) -> Vec<Heading> {
	structural_headings(content).collect()
}

fn structural_headings(content: &str) -> impl Iterator<Item = Heading> + '_ {
	let lines = content
		.split_inclusive('\n')
		.map(|line| line.trim_end_matches(['\n', '\r']))
		.collect();
	let mut tracker = OpaqueTracker::new(lines);
	let mut offset = 0;

	content
		.split_inclusive('\n')
		.enumerate()
		.filter_map(move |(index, raw_line)| {
			let start = offset;
			offset += raw_line.len();
			let text = raw_line.trim_end_matches(['\n', '\r']);

			if tracker.is_opaque(index, text) {
				return None;
			}

			detect_heading(text).map(|(depth, title, anchor)| {
				Heading {
					depth,
					title,
					anchor,
					line: index + 1,
					span: start..offset,
				}
			})
		})
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum OpaqueState {
	#[default]
	Structural,
	FrontMatter,
	Fence {
		marker: char,
		len: usize,
	},
	Comment,
	Tag {
		name: String,
		depth: usize,
	},
}

/// Tracks whether the scanner is inside an opaque span.
#[derive(Debug)]
struct OpaqueTracker<'a> {
	state: OpaqueState,
	/// Every line of the document, for looking ahead to a closing tag.
	lines: Vec<&'a str>,
}

impl<'a> OpaqueTracker<'a> {
	fn new(lines: Vec<&'a str>) -> Self {
		Self {
			state: OpaqueState::Structural,
			lines,
		}
	}

	/// Feed the next line. Returns true when the line belongs to an opaque
	/// span, including the lines that open and close it.
	fn is_opaque(&mut self, index: usize, line: &str) -> bool {
		match &mut self.state {
			OpaqueState::FrontMatter => {
				let trimmed = line.trim();
				if trimmed == "---" || trimmed == "..." {
					self.state = OpaqueState::Structural;
				}
				true
			}
			OpaqueState::Fence { marker, len } => {
				if is_closing_fence(line, *marker, *len) {
					self.state = OpaqueState::Structural;
				}
				true
			}
			OpaqueState::Comment => {
				if line.contains("-->") {
					self.state = OpaqueState::Structural;
				}
				true
			}
			OpaqueState::Tag { name, depth } => {
				let opened = count_open_tags(line, name);
				let closed = count_close_tags(line, name);
				*depth = (*depth + opened).saturating_sub(closed);
				if *depth == 0 {
					self.state = OpaqueState::Structural;
				}
				true
			}
			OpaqueState::Structural => self.open(index, line),
		}
	}

	fn open(&mut self, index: usize, line: &str) -> bool {
		if index == 0 && line.trim() == "---" {
			self.state = OpaqueState::FrontMatter;
			return true;
		}

		if let Some((marker, len)) = detect_fence_start(line) {
			self.state = OpaqueState::Fence { marker, len };
			return true;
		}

		let trimmed = line.trim_start();
		if let Some(open) = trimmed.find("<!--") {
			if !trimmed[open + 4..].contains("-->") {
				self.state = OpaqueState::Comment;
				return true;
			}
		}

		if let Some(name) = opening_tag_name(trimmed) {
			let opened = count_open_tags(trimmed, name);
			let closed = count_close_tags(trimmed, name);
			// A tag that is never closed, such as `<path>` starting a line of
			// prose, is plain text.
			if opened > closed && self.closes_later(index, name, opened - closed) {
				self.state = OpaqueState::Tag {
					name: name.to_string(),
					depth: opened - closed,
				};
				return true;
			}
		}

		false
	}

	/// Whether a tag region opened on line `index` with `depth` unclosed
	/// `name` tags is closed on some later line.
	fn closes_later(&self, index: usize, name: &str, mut depth: usize) -> bool {
		for line in self.lines.iter().skip(index + 1) {
			let line = line.trim_start();
			depth = (depth + count_open_tags(line, name)).saturating_sub(count_close_tags(line, name));
			if depth == 0 {
				return true;
			}
		}
		false
	}
}

/// Split leading indentation, counting tabs as four columns.
fn split_indent(line: &str) -> (usize, &str) {
	let mut width = 0;
	for (idx, ch) in line.char_indices() {
		match ch {
			' ' => width += 1,
			'\t' => width += 4,
			_ => return (width, &line[idx..]),
		}
	}
	(width, "")
}

fn detect_fence_start(line: &str) -> Option<(char, usize)> {
	let (indent, rest) = split_indent(line);
	if indent > 3 {
		return None;
	}

	let marker = rest.chars().next()?;
	if marker != '`' && marker != '~' {
		return None;
	}

	let len = rest.chars().take_while(|&c| c == marker).count();
	if len < 3 {
		return None;
	}

	// Backtick fences cannot carry backticks in their info string.
	if marker == '`' && rest[len..].contains('`') {
		return None;
	}

	Some((marker, len))
}

fn is_closing_fence(line: &str, marker: char, len: usize) -> bool {
	let (indent, rest) = split_indent(line);
	if indent > 3 {
		return false;
	}

	let run = rest.chars().take_while(|&c| c == marker).count();
	run >= len && rest[run..].trim().is_empty()
}

/// HTML elements that never take a closing tag.
const VOID_ELEMENTS: &[&str] = &[
	"area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
	"wbr",
];

/// Name of the tag opened at the start of `line`, if any.
fn opening_tag_name(line: &str) -> Option<&str> {
	let rest = line.strip_prefix('<')?;
	let len = rest
		.char_indices()
		.take_while(|(idx, c)| {
			if *idx == 0 {
				c.is_ascii_alphabetic()
			} else {
				c.is_ascii_alphanumeric() || *c == '-' || *c == '_'
			}
		})
		.count();
	if len == 0 {
		return None;
	}

	let name = &rest[..len];
	let after = &rest[len..];
	if !(after.starts_with('>') || after.starts_with(char::is_whitespace)) {
		return None;
	}

	if VOID_ELEMENTS.contains(&name.to_ascii_lowercase().as_str()) {
		return None;
	}

	let tag_end = after.find('>')?;
	if after[..tag_end].ends_with('/') {
		return None;
	}

	Some(name)
}

fn count_open_tags(line: &str, name: &str) -> usize {
	let needle = format!("<{name}");
	line.match_indices(&needle)
		.filter(|(idx, _)| {
			let after = &line[idx + needle.len()..];
			after.starts_with('>') || after.starts_with(char::is_whitespace)
		})
		.count()
}

fn count_close_tags(line: &str, name: &str) -> usize {
	line.matches(&format!("</{name}>")).count()
}

/// Parse an ATX heading into `(depth, title, anchor)`.
fn detect_heading(line: &str) -> Option<(usize, String, String)> {
	let (indent, rest) = split_indent(line);
	if indent > 3 {
		return None;
	}

	let depth = rest.chars().take_while(|&c| c == '#').count();
	if depth == 0 || depth > 6 {
		return None;
	}

	let after = &rest[depth..];
	if !after.is_empty() && !after.starts_with(char::is_whitespace) {
		return None;
	}

	let mut text = after.trim();
	let without_hashes = text.trim_end_matches('#');
	if without_hashes.is_empty() {
		text = "";
	} else if without_hashes.len() < text.len() && without_hashes.ends_with(char::is_whitespace) {
		text = without_hashes.trim_end();
	}

	let (title, explicit_anchor) = split_explicit_anchor(text);
	let anchor = explicit_anchor.map_or_else(|| slugify(title), str::to_string);

	Some((depth, title.to_string(), anchor))
}

/// Split a trailing `{#anchor}` attribute from heading text.
fn split_explicit_anchor(text: &str) -> (&str, Option<&str>) {
	let Some(body) = text.strip_suffix('}') else {
		return (text, None);
	};
	let Some(open) = body.rfind("{#") else {
		return (text, None);
	};

	let anchor = body[open + 2..].trim();
	if anchor.is_empty() || anchor.contains(char::is_whitespace) {
		return (text, None);
	}

	(body[..open].trim_end(), Some(anchor))
}

/// Lowercase, keep alphanumerics and `_`, turn spaces and hyphens into `-`.
pub fn slugify(title: &str) -> String {
	title
		.trim()
		.chars()
		.filter_map(|c| {
			if c.is_alphanumeric() || c == '_' {
				Some(c.to_lowercase().collect::<String>())
			} else if c == ' ' || c == '-' {
				Some("-".to_string())
			} else {
				None
			}
		})
		.collect()
}

fn normalize_title(title: &str) -> String {
	title
		.split_whitespace()
		.collect::<Vec<_>>()
		.join(" ")
		.to_lowercase()
}
