use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::BuildContext;
use crate::BuildTarget;
use crate::MdgenError;
use crate::Manifest;
use crate::MdgenResult;
use crate::config::load_data_file;
use crate::config::lookup_field;
use crate::manifest::SourceFilter;
use crate::manifest::glob_files;
use crate::placeholder::is_valid_key;
use crate::section::SectionQuery;
use crate::section::extract_section;

/// Produces the replacement text for one placeholder key.
///
/// Generators may read auxiliary files through the [`BuildContext`] root but
/// must not write anything. They are called again on every pass and for every
/// document; results are never cached.
pub trait Generator: Send + Sync {
	fn generate(&self, ctx: &BuildContext) -> MdgenResult<String>;
}

impl<F> Generator for F
where
	F: Fn(&BuildContext) -> MdgenResult<String> + Send + Sync,
{
	fn generate(&self, ctx: &BuildContext) -> MdgenResult<String> {
		self(ctx)
	}
}

/// A fixed string.
#[derive(Debug, Clone)]
pub struct Literal(pub String);

impl Generator for Literal {
	fn generate(&self, _ctx: &BuildContext) -> MdgenResult<String> {
		Ok(self.0.clone())
	}
}

/// The name of the target being built.
#[derive(Debug, Clone, Copy, Default)]
pub struct TargetName;

impl Generator for TargetName {
	fn generate(&self, ctx: &BuildContext) -> MdgenResult<String> {
		Ok(ctx.target.to_string())
	}
}

/// A value chosen by build target, with an optional fallback.
#[derive(Debug, Clone)]
pub struct PerTarget {
	pub key: String,
	pub values: BTreeMap<BuildTarget, String>,
	pub default: Option<String>,
}

impl Generator for PerTarget {
	fn generate(&self, ctx: &BuildContext) -> MdgenResult<String> {
		self.values
			.get(&ctx.target)
			.or(self.default.as_ref())
			.cloned()
			.ok_or_else(|| {
				MdgenError::MissingTargetValue {
					key: self.key.clone(),
					target: ctx.target.to_string(),
				}
			})
	}
}

/// The full contents of a project file.
#[derive(Debug, Clone)]
pub struct FileContents {
	pub path: PathBuf,
}

impl Generator for FileContents {
	fn generate(&self, ctx: &BuildContext) -> MdgenResult<String> {
		let content = std::fs::read_to_string(ctx.resolve(&self.path))?;
		Ok(crate::normalize_line_endings(&content))
	}
}

/// One section of a markdown file, located with the section extractor.
///
/// A missing heading is a hard error: injecting nothing would silently
/// produce a broken document.
#[derive(Debug, Clone)]
pub struct Section {
	pub path: PathBuf,
	pub query: SectionQuery,
}

impl Generator for Section {
	fn generate(&self, ctx: &BuildContext) -> MdgenResult<String> {
		let content = std::fs::read_to_string(ctx.resolve(&self.path))?;
		let content = crate::normalize_line_endings(&content);
		let section = extract_section(&self.path.display().to_string(), &content, &self.query)?;
		Ok(section.content)
	}
}

/// A field read from a JSON, TOML, or YAML data file (for example the
/// `version` field of `package.json`).
#[derive(Debug, Clone)]
pub struct DataField {
	pub path: PathBuf,
	/// Dotted path into the parsed document, e.g. `package.version`.
	pub field: String,
}

impl Generator for DataField {
	fn generate(&self, ctx: &BuildContext) -> MdgenResult<String> {
		let value = load_data_file(&ctx.root, &self.path)?;
		lookup_field(&value, &self.field).ok_or_else(|| {
			MdgenError::MissingField {
				path: self.path.display().to_string(),
				field: self.field.clone(),
			}
		})
	}
}

/// A listing of the files matching a glob, one formatted line per file.
///
/// `format` may use `{name}` (file stem), `{file}` (file name) and `{path}`
/// (project-relative path). Files the build would skip are left out too:
/// `exclude` takes the manifest's exclude patterns and `output_dirs` the
/// target output roots.
#[derive(Debug, Clone)]
pub struct FileList {
	pub pattern: String,
	pub format: String,
	pub exclude: Vec<String>,
	pub output_dirs: Vec<PathBuf>,
}

impl FileList {
	pub fn new(pattern: impl Into<String>, format: impl Into<String>) -> Self {
		Self {
			pattern: pattern.into(),
			format: format.into(),
			exclude: Vec::new(),
			output_dirs: Vec::new(),
		}
	}

	/// Apply the same source filtering as `manifest`'s expansion.
	#[must_use]
	pub fn filtered_like(mut self, manifest: &Manifest) -> Self {
		self.exclude = manifest.exclude_patterns().to_vec();
		self.output_dirs = manifest.output_dirs();
		self
	}
}

impl Generator for FileList {
	fn generate(&self, ctx: &BuildContext) -> MdgenResult<String> {
		let filter = SourceFilter::new(&ctx.root, &self.exclude, self.output_dirs.iter().cloned())?;
		let files = glob_files(&ctx.root, &self.pattern, &filter)?;
		let lines: Vec<String> = files
			.iter()
			.map(|file| {
				let rel = file
					.strip_prefix(&ctx.root)
					.unwrap_or(file)
					.to_string_lossy()
					.replace('\\', "/");
				let name = file
					.file_stem()
					.map(|stem| stem.to_string_lossy().to_string())
					.unwrap_or_default();
				let file_name = file
					.file_name()
					.map(|name| name.to_string_lossy().to_string())
					.unwrap_or_default();
				self.format
					.replace("{name}", &name)
					.replace("{file}", &file_name)
					.replace("{path}", &rel)
			})
			.collect();
		Ok(lines.join("\n"))
	}
}

/// Placeholder key registered by [`SubstitutionRegistry::with_builtins`].
pub const TARGET_KEY: &str = "TARGET";

/// Placeholder key to generator table.
///
/// Read-only once a build starts; keys are unique.
#[derive(Default)]
pub struct SubstitutionRegistry {
	generators: BTreeMap<String, Box<dyn Generator>>,
}

impl fmt::Debug for SubstitutionRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SubstitutionRegistry")
			.field("keys", &self.generators.keys().collect::<Vec<_>>())
			.finish()
	}
}

impl SubstitutionRegistry {
	/// An empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// A registry preloaded with `{{{TARGET}}}`.
	pub fn with_builtins() -> Self {
		let mut registry = Self::new();
		registry
			.generators
			.insert(TARGET_KEY.to_string(), Box::new(TargetName));
		registry
	}

	/// Register a generator. Fails if the key is malformed or already taken.
	pub fn register(
		&mut self,
		key: impl Into<String>,
		generator: impl Generator + 'static,
	) -> MdgenResult<()> {
		let key = key.into();
		if !is_valid_key(&key) {
			return Err(MdgenError::InvalidPlaceholderKey(key));
		}
		if self.generators.contains_key(&key) {
			return Err(MdgenError::DuplicatePlaceholder(key));
		}

		self.generators.insert(key, Box::new(generator));
		Ok(())
	}

	/// Builder-style [`register`](Self::register).
	pub fn with(
		mut self,
		key: impl Into<String>,
		generator: impl Generator + 'static,
	) -> MdgenResult<Self> {
		self.register(key, generator)?;
		Ok(self)
	}

	pub fn contains(&self, key: &str) -> bool {
		self.generators.contains_key(key)
	}

	pub fn get(&self, key: &str) -> Option<&dyn Generator> {
		self.generators.get(key).map(|generator| &**generator)
	}

	/// Registered keys in sorted order.
	pub fn keys(&self) -> impl Iterator<Item = &str> {
		self.generators.keys().map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.generators.len()
	}

	pub fn is_empty(&self) -> bool {
		self.generators.is_empty()
	}
}
