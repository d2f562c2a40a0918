//! Declarative source → destination file mappings and their expansion.
//!
//! A [`Manifest`] is plain data: a list of [`FileMapping`]s plus the output
//! root of each [`BuildTarget`]. [`expand_manifest`] turns it into the
//! concrete, ordered list of files for one target.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use derive_more::Deref;
use globset::GlobBuilder;
use globset::GlobMatcher;
use ignore::gitignore::Gitignore;
use ignore::gitignore::GitignoreBuilder;

use crate::BuildTarget;
use crate::MdgenError;
use crate::MdgenResult;

/// Substitution point for the matched file's stem in a destination template.
pub const NAME_PLACEHOLDER: &str = "{name}";

/// A single mapping rule. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct FileMapping {
	source: String,
	destination: String,
	targets: BTreeSet<BuildTarget>,
	required: bool,
	raw: bool,
	matcher: Option<GlobMatcher>,
}

impl FileMapping {
	/// Create a mapping for the given targets.
	///
	/// `source` is a project-relative path or glob. A glob source needs a
	/// destination with exactly one `{name}`; a literal source needs a literal
	/// destination. Destinations are relative to the target's output root.
	pub fn new(
		source: impl Into<String>,
		destination: impl Into<String>,
		targets: impl IntoIterator<Item = BuildTarget>,
	) -> MdgenResult<Self> {
		let source = normalize_pattern(&source.into());
		let destination = normalize_pattern(&destination.into());
		let targets: BTreeSet<BuildTarget> = targets.into_iter().collect();

		let invalid = |reason: &str| {
			Err(MdgenError::InvalidMapping {
				source_pattern: source.clone(),
				reason: reason.to_string(),
			})
		};

		if source.is_empty() {
			return invalid("source is empty");
		}
		if destination.is_empty() {
			return invalid("destination is empty");
		}
		if targets.is_empty() {
			return invalid("mapping applies to no targets");
		}
		if !is_contained_relative(&source) {
			return invalid("source must be a relative path inside the project root");
		}
		if !is_contained_relative(&destination) {
			return invalid("destination must be a relative path inside the output directory");
		}

		let placeholders = destination.matches(NAME_PLACEHOLDER).count();
		let matcher = if is_glob(&source) {
			if placeholders != 1 {
				return invalid("glob source requires exactly one `{name}` in the destination");
			}
			Some(compile_glob(&source)?)
		} else {
			if placeholders != 0 || is_glob(&destination) {
				return invalid("literal source requires a literal destination");
			}
			None
		};

		Ok(Self {
			source,
			destination,
			targets,
			required: false,
			raw: false,
			matcher,
		})
	}

	/// Create a mapping that applies to every target.
	pub fn for_all_targets(
		source: impl Into<String>,
		destination: impl Into<String>,
	) -> MdgenResult<Self> {
		Self::new(source, destination, BuildTarget::ALL)
	}

	/// Fail expansion when this mapping matches nothing.
	#[must_use]
	pub fn required(mut self) -> Self {
		self.required = true;
		self
	}

	/// Copy matched files verbatim without placeholder substitution.
	#[must_use]
	pub fn raw(mut self) -> Self {
		self.raw = true;
		self
	}

	pub fn source(&self) -> &str {
		&self.source
	}

	pub fn destination(&self) -> &str {
		&self.destination
	}

	pub fn targets(&self) -> &BTreeSet<BuildTarget> {
		&self.targets
	}

	pub fn is_required(&self) -> bool {
		self.required
	}

	pub fn is_raw(&self) -> bool {
		self.raw
	}

	pub fn is_glob(&self) -> bool {
		self.matcher.is_some()
	}

	pub fn applies_to(&self, target: BuildTarget) -> bool {
		self.targets.contains(&target)
	}

	/// Check whether a project-relative path is a source of this mapping.
	pub fn matches_path(&self, relative: &Path) -> bool {
		let relative = path_key(relative);
		match &self.matcher {
			Some(matcher) => matcher.is_match(&relative),
			None => relative == self.source,
		}
	}

	/// Destination for a matched source file, relative to the output root.
	fn destination_for(&self, source: &Path) -> PathBuf {
		if self.matcher.is_none() {
			return PathBuf::from(&self.destination);
		}

		let name = file_stem(source);
		PathBuf::from(self.destination.replace(NAME_PLACEHOLDER, &name))
	}
}

/// Every mapping rule plus the output root of each target.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
	mappings: Vec<FileMapping>,
	outputs: BTreeMap<BuildTarget, PathBuf>,
	exclude: Vec<String>,
}

impl Manifest {
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn with_mapping(mut self, mapping: FileMapping) -> Self {
		self.mappings.push(mapping);
		self
	}

	pub fn push(&mut self, mapping: FileMapping) {
		self.mappings.push(mapping);
	}

	/// Set the project-relative output directory for `target`.
	#[must_use]
	pub fn with_output(mut self, target: BuildTarget, dir: impl Into<PathBuf>) -> Self {
		self.outputs.insert(target, dir.into());
		self
	}

	/// Gitignore-style patterns removed from every glob expansion.
	#[must_use]
	pub fn with_exclude(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
		self.exclude.extend(patterns.into_iter().map(Into::into));
		self
	}

	pub fn mappings(&self) -> &[FileMapping] {
		&self.mappings
	}

	/// Mappings that apply to `target`, with their declaration index.
	pub fn mappings_for(
		&self,
		target: BuildTarget,
	) -> impl Iterator<Item = (usize, &FileMapping)> + '_ {
		self.mappings
			.iter()
			.enumerate()
			.filter(move |(_, mapping)| mapping.applies_to(target))
	}

	/// Project-relative output directory for `target`.
	pub fn output_dir(&self, target: BuildTarget) -> PathBuf {
		self.outputs
			.get(&target)
			.cloned()
			.unwrap_or_else(|| target.default_output_dir())
	}

	/// Project-relative output directory of every target.
	pub fn output_dirs(&self) -> Vec<PathBuf> {
		BuildTarget::ALL
			.iter()
			.map(|target| self.output_dir(*target))
			.collect()
	}

	pub fn exclude_patterns(&self) -> &[String] {
		&self.exclude
	}
}

/// Paths glob expansion never returns: gitignore-style excludes and every
/// target's output directory, so earlier build output is never read back as
/// a source.
#[derive(Debug, Clone, Default)]
pub struct SourceFilter {
	exclude: Option<Gitignore>,
	output_dirs: Vec<PathBuf>,
}

impl SourceFilter {
	/// `output_dirs` are resolved against `root` unless already absolute.
	pub fn new(
		root: &Path,
		exclude: &[String],
		output_dirs: impl IntoIterator<Item = PathBuf>,
	) -> MdgenResult<Self> {
		let exclude = if exclude.is_empty() {
			None
		} else {
			Some(build_exclude_matcher(root, exclude)?)
		};

		Ok(Self {
			exclude,
			output_dirs: output_dirs.into_iter().map(|dir| root.join(dir)).collect(),
		})
	}

	pub fn for_manifest(manifest: &Manifest, root: &Path) -> MdgenResult<Self> {
		Self::new(root, &manifest.exclude, manifest.output_dirs())
	}

	fn is_output(&self, path: &Path) -> bool {
		self.output_dirs.iter().any(|dir| path.starts_with(dir))
	}

	fn skips(&self, path: &Path, is_dir: bool) -> bool {
		if is_dir && self.is_output(path) {
			return true;
		}
		self.exclude
			.as_ref()
			.is_some_and(|rules| rules.matched(path, is_dir).is_ignore())
	}
}

/// One concrete file to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMapping {
	/// Absolute source path.
	pub source: PathBuf,
	/// Absolute destination path.
	pub destination: PathBuf,
	/// Destination relative to the target's output root.
	pub relative_destination: PathBuf,
	/// Index of the originating [`FileMapping`] in the manifest.
	pub mapping: usize,
	/// Copy without substitution.
	pub raw: bool,
}

/// The expansion of a manifest for one target, in build order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref)]
pub struct ResolvedMappings(Vec<ResolvedMapping>);

impl ResolvedMappings {
	pub fn into_inner(self) -> Vec<ResolvedMapping> {
		self.0
	}

	/// Entries produced by the given manifest mappings.
	pub fn for_mappings(&self, indices: &BTreeSet<usize>) -> Vec<&ResolvedMapping> {
		self.0
			.iter()
			.filter(|resolved| indices.contains(&resolved.mapping))
			.collect()
	}
}

/// Options for [`expand_manifest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandOptions {
	/// Fail with [`EmptyGlob`](MdgenError::EmptyGlob) when a required mapping
	/// matches nothing. When false the mapping is skipped with a warning.
	pub strict: bool,
}

impl Default for ExpandOptions {
	fn default() -> Self {
		Self { strict: true }
	}
}

/// Expand every mapping that applies to `target` into concrete file pairs.
///
/// Ordering is declaration order of the mappings, then the matched file name
/// within each glob, so repeated expansions of an unchanged tree are
/// identical. The same source mapped twice to the same destination is kept
/// once; two different sources for one destination is a
/// [`Conflict`](MdgenError::Conflict).
pub fn expand_manifest(
	manifest: &Manifest,
	root: &Path,
	target: BuildTarget,
	options: &ExpandOptions,
) -> MdgenResult<ResolvedMappings> {
	let output_root = root.join(manifest.output_dir(target));
	let filter = SourceFilter::for_manifest(manifest, root)?;
	let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();
	let mut resolved = Vec::new();

	for (index, mapping) in manifest.mappings_for(target) {
		let sources = match &mapping.matcher {
			Some(matcher) => {
				let mut files = collect_matching(root, &mapping.source, matcher, &filter)?;
				files.sort_by(|a, b| file_stem(a).cmp(&file_stem(b)).then_with(|| a.cmp(b)));
				files
			}
			None => {
				let path = root.join(&mapping.source);
				if path.is_file() { vec![path] } else { Vec::new() }
			}
		};

		if sources.is_empty() {
			if mapping.required && options.strict {
				return Err(MdgenError::EmptyGlob {
					pattern: mapping.source.clone(),
				});
			}
			if mapping.required {
				tracing::warn!(pattern = %mapping.source, %target, "required mapping matched no files");
			} else {
				tracing::info!(pattern = %mapping.source, %target, "mapping matched no files");
			}
			continue;
		}

		for source in sources {
			let relative_destination = mapping.destination_for(&source);
			let destination = output_root.join(&relative_destination);

			if let Some(existing) = claimed.get(&destination) {
				if existing == &source {
					continue;
				}
				return Err(MdgenError::Conflict {
					destination: destination.display().to_string(),
					first_source: existing.display().to_string(),
					second_source: source.display().to_string(),
				});
			}

			tracing::debug!(
				source = %source.display(),
				destination = %destination.display(),
				mapping = index,
				"resolved mapping"
			);
			claimed.insert(destination.clone(), source.clone());
			resolved.push(ResolvedMapping {
				source,
				destination,
				relative_destination,
				mapping: index,
				raw: mapping.raw,
			});
		}
	}

	Ok(ResolvedMappings(resolved))
}

/// Sorted list of files under `root` matching a project-relative glob.
pub fn glob_files(
	root: &Path,
	pattern: &str,
	filter: &SourceFilter,
) -> MdgenResult<Vec<PathBuf>> {
	let pattern = normalize_pattern(pattern);
	let matcher = compile_glob(&pattern)?;
	let mut files = collect_matching(root, &pattern, &matcher, filter)?;
	files.sort();
	Ok(files)
}

/// Build a `Gitignore` matcher from gitignore-style exclude patterns.
pub fn build_exclude_matcher(root: &Path, patterns: &[String]) -> MdgenResult<Gitignore> {
	let mut builder = GitignoreBuilder::new(root);
	for pattern in patterns {
		builder.add_line(None, pattern).map_err(|e| {
			MdgenError::ConfigParse(format!("invalid exclude pattern `{pattern}`: {e}"))
		})?;
	}
	builder
		.build()
		.map_err(|e| MdgenError::ConfigParse(format!("failed to build exclude rules: {e}")))
}

fn compile_glob(pattern: &str) -> MdgenResult<GlobMatcher> {
	GlobBuilder::new(pattern)
		.literal_separator(true)
		.build()
		.map(|glob| glob.compile_matcher())
		.map_err(|e| {
			MdgenError::InvalidPattern {
				pattern: pattern.to_string(),
				reason: e.kind().to_string(),
			}
		})
}

fn collect_matching(
	root: &Path,
	pattern: &str,
	matcher: &GlobMatcher,
	filter: &SourceFilter,
) -> MdgenResult<Vec<PathBuf>> {
	let components: Vec<&str> = pattern.split('/').collect();
	let literal_len = components
		.iter()
		.take_while(|component| !is_glob(component))
		.count();
	let base = components[..literal_len]
		.iter()
		.fold(root.to_path_buf(), |path, component| path.join(component));
	if base.as_path() != root && filter.is_output(&base) {
		return Ok(Vec::new());
	}
	let remaining = &components[literal_len..];
	// `None` means unbounded depth.
	let max_depth = if remaining.contains(&"**") {
		None
	} else {
		Some(remaining.len())
	};

	let mut files = Vec::new();
	let mut visited = HashSet::new();
	walk_matching(
		root,
		&base,
		max_depth,
		matcher,
		filter,
		&mut visited,
		&mut files,
	)?;
	Ok(files)
}

fn walk_matching(
	root: &Path,
	dir: &Path,
	depth_left: Option<usize>,
	matcher: &GlobMatcher,
	filter: &SourceFilter,
	visited: &mut HashSet<PathBuf>,
	files: &mut Vec<PathBuf>,
) -> MdgenResult<()> {
	if depth_left == Some(0) || !dir.is_dir() {
		return Ok(());
	}

	let canonical = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
	if !visited.insert(canonical) {
		tracing::debug!(dir = %dir.display(), "skipping already visited directory");
		return Ok(());
	}

	for entry in std::fs::read_dir(dir)? {
		let path = entry?.path();
		let is_dir = path.is_dir();

		if filter.skips(&path, is_dir) {
			continue;
		}

		if is_dir {
			let hidden = path
				.file_name()
				.and_then(|name| name.to_str())
				.is_some_and(is_ignored_directory_name);
			if !hidden {
				walk_matching(
					root,
					&path,
					depth_left.map(|depth| depth - 1),
					matcher,
					filter,
					visited,
					files,
				)?;
			}
			continue;
		}

		let relative = path.strip_prefix(root).unwrap_or(&path);
		if matcher.is_match(path_key(relative)) {
			files.push(path);
		}
	}

	Ok(())
}

fn is_ignored_directory_name(name: &str) -> bool {
	name.starts_with('.') || name == "node_modules" || name == "target"
}

/// Whether a pattern contains glob syntax.
///
/// The `{name}` destination placeholder is not glob syntax.
pub fn is_glob(pattern: &str) -> bool {
	pattern
		.replace(NAME_PLACEHOLDER, "")
		.contains(['*', '?', '[', '{'])
}

fn normalize_pattern(pattern: &str) -> String {
	let pattern = pattern.trim().replace('\\', "/");
	pattern
		.strip_prefix("./")
		.map_or_else(|| pattern.clone(), str::to_string)
}

fn is_contained_relative(path: &str) -> bool {
	let path = Path::new(path);
	path.components()
		.all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

fn path_key(path: &Path) -> String {
	path.to_string_lossy().replace('\\', "/")
}

fn file_stem(path: &Path) -> String {
	path.file_stem()
		.map(|stem| stem.to_string_lossy().to_string())
		.unwrap_or_default()
}
