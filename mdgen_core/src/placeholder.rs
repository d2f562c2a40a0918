//! Triple-brace placeholder tokens: `{{{KEY_NAME}}}`.
//!
//! Single and double braces are left alone because the documents being
//! generated use them in their own examples.

use std::ops::Range;

pub const PLACEHOLDER_OPEN: &str = "{{{";
pub const PLACEHOLDER_CLOSE: &str = "}}}";

/// A placeholder occurrence within a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderToken {
	/// The key between the delimiters.
	pub key: String,
	/// Byte range of the whole token, delimiters included.
	pub span: Range<usize>,
}

/// Render `key` as a placeholder token.
pub fn placeholder(key: &str) -> String {
	format!("{PLACEHOLDER_OPEN}{key}{PLACEHOLDER_CLOSE}")
}

/// Check whether `key` is a well-formed placeholder key.
pub fn is_valid_key(key: &str) -> bool {
	let mut chars = key.chars();
	let Some(first) = chars.next() else {
		return false;
	};

	(first.is_ascii_alphabetic() || first == '_')
		&& chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Find every placeholder-shaped token in `content`, in document order.
///
/// Tokens never overlap. A run of four or more opening braces is treated as
/// literal braces followed by a token, so `{{{{A}}}}` yields `A` spanning the
/// inner `{{{A}}}`.
pub fn scan_placeholders(content: &str) -> Vec<PlaceholderToken> {
	let mut tokens = Vec::new();
	let mut search_from = 0;

	while let Some(found) = content[search_from..].find(PLACEHOLDER_OPEN) {
		let open = search_from + found;
		let key_start = open + PLACEHOLDER_OPEN.len();
		let key_len = content[key_start..]
			.bytes()
			.take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
			.count();
		let key_end = key_start + key_len;

		if key_len > 0
			&& content[key_end..].starts_with(PLACEHOLDER_CLOSE)
			&& is_valid_key(&content[key_start..key_end])
		{
			let end = key_end + PLACEHOLDER_CLOSE.len();
			tokens.push(PlaceholderToken {
				key: content[key_start..key_end].to_string(),
				span: open..end,
			});
			search_from = end;
		} else {
			// `{` is one byte, so this always lands on a char boundary.
			search_from = open + 1;
		}
	}

	tokens
}
