use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::BuildContext;
use crate::MdgenError;
use crate::MdgenResult;
use crate::SubstitutionRegistry;
use crate::placeholder::scan_placeholders;

/// Default cap on substitution passes per document.
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Options controlling fixed-point resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionOptions {
	/// Maximum number of passes before giving up.
	pub max_iterations: usize,
	/// When true, failing to converge is an error. Otherwise the best-effort
	/// content is returned and a warning is logged.
	pub strict: bool,
	/// Log a warning for placeholder-shaped tokens with no registered key.
	/// Unknown tokens are always left in place.
	pub warn_unknown_tokens: bool,
}

impl Default for SubstitutionOptions {
	fn default() -> Self {
		Self {
			max_iterations: DEFAULT_MAX_ITERATIONS,
			strict: false,
			warn_unknown_tokens: false,
		}
	}
}

/// Result of resolving one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
	/// The substituted content. Best effort when `converged` is false.
	pub content: String,
	/// Number of passes that changed the content.
	pub passes: usize,
	/// Whether every known placeholder was resolved.
	pub converged: bool,
	/// Known placeholder keys still present in `content`, sorted.
	pub unresolved: Vec<String>,
	/// Placeholder-shaped keys with no generator, sorted.
	pub unknown_tokens: Vec<String>,
}

/// Replace every known placeholder in `content` once.
///
/// All replacements are computed against the input snapshot, so text produced
/// by a generator is never expanded again within the same pass. Unknown keys
/// are left untouched.
pub fn substitute_once(
	content: &str,
	registry: &SubstitutionRegistry,
	ctx: &BuildContext,
) -> MdgenResult<String> {
	let tokens = scan_placeholders(content);
	if tokens.is_empty() {
		return Ok(content.to_string());
	}

	// Each key is generated at most once per pass; nothing survives the pass.
	let mut generated: BTreeMap<&str, String> = BTreeMap::new();
	let mut result = String::with_capacity(content.len());
	let mut cursor = 0;

	for token in &tokens {
		let Some(generator) = registry.get(&token.key) else {
			continue;
		};

		let replacement = match generated.get(token.key.as_str()) {
			Some(value) => value.clone(),
			None => {
				let value = generator.generate(ctx)?;
				generated.insert(token.key.as_str(), value.clone());
				value
			}
		};

		result.push_str(&content[cursor..token.span.start]);
		result.push_str(&replacement);
		cursor = token.span.end;
	}

	result.push_str(&content[cursor..]);
	Ok(result)
}

/// Apply [`substitute_once`] until the content stops changing or
/// `options.max_iterations` passes have run.
///
/// A document still containing known placeholders afterwards has diverged:
/// either a generator chain is cyclic or a generator reproduces its own
/// token. In strict mode that is a
/// [`SubstitutionDivergence`](MdgenError::SubstitutionDivergence) error; in
/// lenient mode the partial result is returned with `converged = false`.
#[tracing::instrument(level = "debug", skip(content, registry, ctx, options), fields(target = %ctx.target))]
pub fn resolve_document(
	document: &str,
	content: &str,
	registry: &SubstitutionRegistry,
	ctx: &BuildContext,
	options: &SubstitutionOptions,
) -> MdgenResult<Resolution> {
	let mut current = content.to_string();
	let mut passes = 0;
	let mut attempted = 0;

	while attempted < options.max_iterations {
		attempted += 1;
		let next = substitute_once(&current, registry, ctx)?;
		if next == current {
			break;
		}

		passes += 1;
		current = next;
		tracing::trace!(document, pass = passes, "substitution pass changed content");
	}

	let (unresolved, unknown_tokens) = classify_tokens(&current, registry);

	if options.warn_unknown_tokens && !unknown_tokens.is_empty() {
		tracing::warn!(
			document,
			tokens = %unknown_tokens.join(", "),
			"unregistered placeholder-like tokens left in place"
		);
	}

	let converged = unresolved.is_empty();
	if !converged {
		if options.strict {
			return Err(MdgenError::SubstitutionDivergence {
				document: document.to_string(),
				iterations: attempted,
				unresolved: unresolved.join(", "),
			});
		}

		tracing::warn!(
			document,
			iterations = attempted,
			unresolved = %unresolved.join(", "),
			"placeholder substitution did not converge; writing best-effort output"
		);
	}

	Ok(Resolution {
		content: current,
		passes,
		converged,
		unresolved,
		unknown_tokens,
	})
}

/// Split the placeholder keys in `content` into known and unknown sets.
fn classify_tokens(content: &str, registry: &SubstitutionRegistry) -> (Vec<String>, Vec<String>) {
	let mut known = BTreeSet::new();
	let mut unknown = BTreeSet::new();

	for token in scan_placeholders(content) {
		if registry.contains(&token.key) {
			known.insert(token.key);
		} else {
			unknown.insert(token.key);
		}
	}

	(known.into_iter().collect(), unknown.into_iter().collect())
}
