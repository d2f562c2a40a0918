use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum MdgenError {
	#[error(transparent)]
	#[diagnostic(code(mdgen::io_error))]
	Io(#[from] std::io::Error),

	#[error("destination `{destination}` is written by both `{first_source}` and `{second_source}`")]
	#[diagnostic(
		code(mdgen::conflict),
		help("each destination path may only be produced by one source file per target")
	)]
	Conflict {
		destination: String,
		first_source: String,
		second_source: String,
	},

	#[error(
		"placeholders in `{document}` did not converge after {iterations} pass(es); unresolved: \
		 {unresolved}"
	)]
	#[diagnostic(
		code(mdgen::substitution_divergence),
		help(
			"a placeholder generator probably expands (directly or indirectly) to its own token; \
			 break the cycle or raise `build.max_iterations`"
		)
	)]
	SubstitutionDivergence {
		document: String,
		iterations: usize,
		unresolved: String,
	},

	#[error("section `{heading}` not found in `{document}`")]
	#[diagnostic(
		code(mdgen::section_not_found),
		help("headings inside fenced code blocks, front matter, and tag regions are ignored")
	)]
	SectionNotFound { document: String, heading: String },

	#[error("required mapping `{pattern}` matched no files")]
	#[diagnostic(
		code(mdgen::empty_glob),
		help("add a matching source file or mark the mapping as `required = false`")
	)]
	EmptyGlob { pattern: String },

	#[error("invalid glob pattern `{pattern}`: {reason}")]
	#[diagnostic(code(mdgen::invalid_pattern))]
	InvalidPattern { pattern: String, reason: String },

	#[error("invalid mapping for `{source_pattern}`: {reason}")]
	#[diagnostic(
		code(mdgen::invalid_mapping),
		help(
			"glob sources need exactly one `{{name}}` in the destination; literal sources need a \
			 literal destination"
		)
	)]
	InvalidMapping {
		source_pattern: String,
		reason: String,
	},

	#[error("unknown build target: `{0}`")]
	#[diagnostic(
		code(mdgen::unknown_target),
		help("available targets: local, packaged, plugin")
	)]
	UnknownTarget(String),

	#[error("invalid placeholder key `{0}`")]
	#[diagnostic(
		code(mdgen::invalid_placeholder_key),
		help("keys start with a letter or `_` and contain only letters, digits, and `_`")
	)]
	InvalidPlaceholderKey(String),

	#[error("placeholder `{0}` is registered more than once")]
	#[diagnostic(code(mdgen::duplicate_placeholder))]
	DuplicatePlaceholder(String),

	#[error("placeholder `{key}` has no value for target `{target}`")]
	#[diagnostic(
		code(mdgen::missing_target_value),
		help("add the target to `per_target` or provide a `default`")
	)]
	MissingTargetValue { key: String, target: String },

	#[error("no mdgen config file found in `{root}`")]
	#[diagnostic(
		code(mdgen::missing_config),
		help("run `mdgen init` to create mdgen.toml")
	)]
	MissingConfig { root: String },

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(mdgen::config_parse),
		help("check that mdgen.toml is valid TOML with [targets], [[mappings]] and [placeholders]")
	)]
	ConfigParse(String),

	#[error("failed to load data file `{path}`: {reason}")]
	#[diagnostic(code(mdgen::data_file))]
	DataFile { path: String, reason: String },

	#[error("field `{field}` not found in data file `{path}`")]
	#[diagnostic(code(mdgen::missing_field))]
	MissingField { path: String, field: String },

	#[error("unsupported data file format: `{0}`")]
	#[diagnostic(
		code(mdgen::unsupported_format),
		help("supported formats: json, toml, yaml, yml")
	)]
	UnsupportedDataFormat(String),
}

pub type MdgenResult<T> = Result<T, MdgenError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
