use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use crate::BuildTarget;
use crate::FileMapping;
use crate::Manifest;
use crate::MdgenError;
use crate::MdgenResult;
use crate::SubstitutionOptions;
use crate::SubstitutionRegistry;
use crate::engine::DEFAULT_MAX_ITERATIONS;
use crate::registry::DataField;
use crate::registry::FileContents;
use crate::registry::FileList;
use crate::registry::Literal;
use crate::registry::PerTarget;
use crate::registry::Section;
use crate::section::SectionQuery;

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] = ["mdgen.toml", ".mdgen.toml", ".config/mdgen.toml"];

/// Configuration loaded from an `mdgen.toml` file.
///
/// ```toml
/// [targets]
/// local = "dist/local"
/// plugin = "dist/plugin"
///
/// [[mappings]]
/// source = "src/commands/*.md"
/// destination = "commands/{name}.md"
/// targets = ["local", "plugin"]
/// required = true
///
/// [placeholders]
/// BANNER = "Generated file. Do not edit."
/// VERSION = { data = "package.json", field = "version" }
///
/// [build]
/// max_iterations = 10
/// strict = false
///
/// [exclude]
/// patterns = ["**/draft-*.md"]
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MdgenConfig {
	/// Output directory of each target, relative to the project root.
	#[serde(default)]
	pub targets: BTreeMap<BuildTarget, PathBuf>,
	/// File mapping rules, in build order.
	#[serde(default)]
	pub mappings: Vec<MappingConfig>,
	/// Placeholder key to value source.
	#[serde(default)]
	pub placeholders: BTreeMap<String, PlaceholderSource>,
	#[serde(default)]
	pub build: BuildConfig,
	#[serde(default)]
	pub exclude: ExcludeConfig,
}

/// One `[[mappings]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingConfig {
	pub source: String,
	pub destination: String,
	/// Targets this mapping applies to. Defaults to every target.
	#[serde(default)]
	pub targets: Option<Vec<BuildTarget>>,
	#[serde(default)]
	pub required: bool,
	#[serde(default)]
	pub raw: bool,
}

/// Value source for a `[placeholders]` entry.
///
/// A bare string is a literal. Tables select a generator by their key:
///
/// ```toml
/// [placeholders]
/// BANNER = "literal text"
/// VERSION = { data = "package.json", field = "version" }
/// DIR = { per_target = { local = ".local", plugin = "plugin" }, default = "dist" }
/// TOOLS = { section = "docs/tools.md", heading = "Tools" }
/// AGENTS = { list = "agents/*.md", format = "- {name}" }
/// FOOTER = { file = "templates/footer.md" }
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
#[non_exhaustive]
pub enum PlaceholderSource {
	Literal(String),
	Data(DataPlaceholder),
	PerTarget(PerTargetPlaceholder),
	Section(SectionPlaceholder),
	List(ListPlaceholder),
	File(FilePlaceholder),
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DataPlaceholder {
	pub data: PathBuf,
	pub field: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PerTargetPlaceholder {
	pub per_target: BTreeMap<BuildTarget, String>,
	#[serde(default)]
	pub default: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SectionPlaceholder {
	pub section: PathBuf,
	/// Heading title, or `#anchor`.
	pub heading: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ListPlaceholder {
	pub list: String,
	#[serde(default = "default_list_format")]
	pub format: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FilePlaceholder {
	pub file: PathBuf,
}

fn default_list_format() -> String {
	"- {name}".to_string()
}

/// `[build]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
	#[serde(default = "default_max_iterations")]
	pub max_iterations: usize,
	/// Treat non-converging substitution as an error.
	#[serde(default)]
	pub strict: bool,
	/// Warn about placeholder-like tokens with no registered key.
	#[serde(default)]
	pub warn_unknown_tokens: bool,
}

impl Default for BuildConfig {
	fn default() -> Self {
		Self {
			max_iterations: DEFAULT_MAX_ITERATIONS,
			strict: false,
			warn_unknown_tokens: false,
		}
	}
}

fn default_max_iterations() -> usize {
	DEFAULT_MAX_ITERATIONS
}

/// `[exclude]` section. Patterns follow gitignore syntax and are removed
/// from every glob mapping.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExcludeConfig {
	#[serde(default)]
	pub patterns: Vec<String>,
}

impl MdgenConfig {
	/// Resolve the config path from known discovery candidates.
	#[must_use]
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if no config file exists.
	pub fn load(root: &Path) -> MdgenResult<Option<MdgenConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		let content = std::fs::read_to_string(&config_path)?;
		Self::parse(&content).map(Some)
	}

	/// Parse config text.
	pub fn parse(content: &str) -> MdgenResult<MdgenConfig> {
		toml::from_str(content).map_err(|e| MdgenError::ConfigParse(e.to_string()))
	}

	/// Build the in-process [`Manifest`] described by this config.
	pub fn manifest(&self) -> MdgenResult<Manifest> {
		let mut manifest = Manifest::new().with_exclude(self.exclude.patterns.iter().cloned());

		for (target, dir) in &self.targets {
			manifest = manifest.with_output(*target, dir.clone());
		}

		for entry in &self.mappings {
			let targets = entry
				.targets
				.clone()
				.unwrap_or_else(|| BuildTarget::ALL.to_vec());
			let mut mapping = FileMapping::new(&entry.source, &entry.destination, targets)?;
			if entry.required {
				mapping = mapping.required();
			}
			if entry.raw {
				mapping = mapping.raw();
			}
			manifest.push(mapping);
		}

		Ok(manifest)
	}

	/// Build the substitution registry, including the built-in `TARGET` key.
	pub fn registry(&self) -> MdgenResult<SubstitutionRegistry> {
		let manifest = self.manifest()?;
		let mut registry = SubstitutionRegistry::with_builtins();

		for (key, source) in &self.placeholders {
			match source {
				PlaceholderSource::Literal(value) => {
					registry.register(key, Literal(value.clone()))?;
				}
				PlaceholderSource::Data(data) => {
					registry.register(
						key,
						DataField {
							path: data.data.clone(),
							field: data.field.clone(),
						},
					)?;
				}
				PlaceholderSource::PerTarget(per_target) => {
					registry.register(
						key,
						PerTarget {
							key: key.clone(),
							values: per_target.per_target.clone(),
							default: per_target.default.clone(),
						},
					)?;
				}
				PlaceholderSource::Section(section) => {
					registry.register(
						key,
						Section {
							path: section.section.clone(),
							query: SectionQuery::parse(&section.heading),
						},
					)?;
				}
				PlaceholderSource::List(list) => {
					registry.register(
						key,
						FileList::new(&list.list, &list.format).filtered_like(&manifest),
					)?;
				}
				PlaceholderSource::File(file) => {
					registry.register(
						key,
						FileContents {
							path: file.file.clone(),
						},
					)?;
				}
			}
		}

		Ok(registry)
	}

	/// Substitution options from the `[build]` section.
	pub fn substitution_options(&self) -> SubstitutionOptions {
		SubstitutionOptions {
			max_iterations: self.build.max_iterations,
			strict: self.build.strict,
			warn_unknown_tokens: self.build.warn_unknown_tokens,
		}
	}
}

/// Read a JSON, TOML, or YAML file (format chosen by extension) into a
/// `serde_json::Value`.
pub fn load_data_file(root: &Path, rel_path: &Path) -> MdgenResult<serde_json::Value> {
	let abs_path = if rel_path.is_absolute() {
		rel_path.to_path_buf()
	} else {
		root.join(rel_path)
	};
	let path_display = rel_path.display().to_string();
	let content = std::fs::read_to_string(&abs_path).map_err(|e| {
		MdgenError::DataFile {
			path: path_display.clone(),
			reason: e.to_string(),
		}
	})?;
	let format = abs_path
		.extension()
		.and_then(|e| e.to_str())
		.unwrap_or("")
		.to_ascii_lowercase();

	parse_data_file(&content, &format, &path_display)
}

/// Parse a data file's content into a `serde_json::Value` based on its
/// format.
fn parse_data_file(
	content: &str,
	format: &str,
	path_display: &str,
) -> MdgenResult<serde_json::Value> {
	match format {
		"json" => {
			serde_json::from_str(content).map_err(|e| {
				MdgenError::DataFile {
					path: path_display.to_string(),
					reason: e.to_string(),
				}
			})
		}
		"toml" => {
			let toml_value: toml::Value = toml::from_str(content).map_err(|e| {
				MdgenError::DataFile {
					path: path_display.to_string(),
					reason: e.to_string(),
				}
			})?;
			Ok(toml_to_json(toml_value))
		}
		"yaml" | "yml" => {
			serde_yaml_ng::from_str(content).map_err(|e| {
				MdgenError::DataFile {
					path: path_display.to_string(),
					reason: e.to_string(),
				}
			})
		}
		other => Err(MdgenError::UnsupportedDataFormat(other.to_string())),
	}
}

/// Convert a `toml::Value` to a `serde_json::Value`.
fn toml_to_json(value: toml::Value) -> serde_json::Value {
	match value {
		toml::Value::String(s) => serde_json::Value::String(s),
		toml::Value::Integer(i) => serde_json::Value::Number(i.into()),
		toml::Value::Float(f) => {
			serde_json::Number::from_f64(f)
				.map_or_else(|| serde_json::Value::String(f.to_string()), serde_json::Value::Number)
		}
		toml::Value::Boolean(b) => serde_json::Value::Bool(b),
		toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
		toml::Value::Array(arr) => serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect()),
		toml::Value::Table(table) => {
			serde_json::Value::Object(
				table
					.into_iter()
					.map(|(k, v)| (k, toml_to_json(v)))
					.collect(),
			)
		}
	}
}

/// Look up a dotted field path and render it as text. Strings are returned
/// without quotes; numbers and booleans use their JSON spelling; arrays and
/// objects are serialized as JSON.
pub fn lookup_field(value: &serde_json::Value, field: &str) -> Option<String> {
	let mut current = value;
	for segment in field.split('.').filter(|segment| !segment.is_empty()) {
		current = match current {
			serde_json::Value::Object(map) => map.get(segment)?,
			serde_json::Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
			_ => return None,
		};
	}

	match current {
		serde_json::Value::Null => None,
		serde_json::Value::String(s) => Some(s.clone()),
		serde_json::Value::Bool(b) => Some(b.to_string()),
		serde_json::Value::Number(n) => Some(n.to_string()),
		other => Some(other.to_string()),
	}
}
