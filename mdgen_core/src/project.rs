use std::path::Path;
use std::path::PathBuf;

use crate::BuildContext;
use crate::BuildTarget;
use crate::ExpandOptions;
use crate::Manifest;
use crate::MdgenConfig;
use crate::MdgenError;
use crate::MdgenResult;
use crate::ResolvedMapping;
use crate::ResolvedMappings;
use crate::SubstitutionOptions;
use crate::SubstitutionRegistry;
use crate::expand_manifest;
use crate::resolve_document;

/// Options shared by every build of a [`Project`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
	pub substitution: SubstitutionOptions,
	pub expand: ExpandOptions,
}

/// A project root together with its manifest and substitution registry.
///
/// This is the unit consumed by [`compute_outputs`], [`check_outputs`] and
/// [`expected_files`]. Nothing in it changes during a build.
#[derive(Debug)]
pub struct Project {
	pub root: PathBuf,
	pub manifest: Manifest,
	pub registry: SubstitutionRegistry,
	pub options: BuildOptions,
}

impl Project {
	pub fn new(root: impl Into<PathBuf>, manifest: Manifest, registry: SubstitutionRegistry) -> Self {
		Self {
			root: root.into(),
			manifest,
			registry,
			options: BuildOptions::default(),
		}
	}

	#[must_use]
	pub fn with_options(mut self, options: BuildOptions) -> Self {
		self.options = options;
		self
	}

	/// Load the project described by the config file discovered at `root`.
	pub fn load(root: &Path) -> MdgenResult<Self> {
		let config = MdgenConfig::load(root)?.ok_or_else(|| {
			MdgenError::MissingConfig {
				root: root.display().to_string(),
			}
		})?;
		Self::from_config(root, &config)
	}

	pub fn from_config(root: &Path, config: &MdgenConfig) -> MdgenResult<Self> {
		let project = Self::new(root, config.manifest()?, config.registry()?).with_options(
			BuildOptions {
				substitution: config.substitution_options(),
				expand: ExpandOptions::default(),
			},
		);
		Ok(project)
	}

	/// The immutable context handed to every generator for `target`.
	pub fn context(&self, target: BuildTarget) -> BuildContext {
		BuildContext::new(target, self.root.clone())
	}

	/// Expand the manifest for `target`.
	pub fn expand(&self, target: BuildTarget) -> MdgenResult<ResolvedMappings> {
		expand_manifest(&self.manifest, &self.root, target, &self.options.expand)
	}

	/// Absolute output directory of `target`.
	pub fn output_dir(&self, target: BuildTarget) -> PathBuf {
		self.root.join(self.manifest.output_dir(target))
	}
}

/// One generated output file, not yet written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFile {
	pub source: PathBuf,
	pub destination: PathBuf,
	/// Destination relative to the target's output root.
	pub relative_destination: PathBuf,
	pub content: String,
	/// Whether every known placeholder was resolved. Always true for raw
	/// copies.
	pub converged: bool,
}

/// The rendered outputs of one target, in build order.
#[derive(Debug, Clone)]
pub struct BuildResult {
	pub target: BuildTarget,
	pub files: Vec<RenderedFile>,
}

impl BuildResult {
	/// Outputs that still contain unresolved known placeholders.
	pub fn diverged(&self) -> impl Iterator<Item = &RenderedFile> {
		self.files.iter().filter(|file| !file.converged)
	}
}

/// An output whose on-disk content differs from what a build would write.
#[derive(Debug, Clone)]
pub struct StaleOutput {
	pub destination: PathBuf,
	pub relative_destination: PathBuf,
	pub current: String,
	pub expected: String,
}

/// Result of comparing a target's output tree against a fresh build.
#[derive(Debug, Clone)]
pub struct CheckResult {
	pub target: BuildTarget,
	pub stale: Vec<StaleOutput>,
	/// Expected outputs that do not exist yet, relative to the output root.
	pub missing: Vec<PathBuf>,
}

impl CheckResult {
	/// Returns true if every output exists and is up to date.
	pub fn is_ok(&self) -> bool {
		self.stale.is_empty() && self.missing.is_empty()
	}
}

/// Render every output of `target` without touching the output tree.
///
/// Conflicts and empty required globs abort before any file is read.
pub fn compute_outputs(project: &Project, target: BuildTarget) -> MdgenResult<BuildResult> {
	let resolved = project.expand(target)?;
	let ctx = project.context(target);
	let files = resolved
		.iter()
		.map(|entry| render_file(project, &ctx, entry))
		.collect::<MdgenResult<Vec<_>>>()?;

	tracing::debug!(%target, files = files.len(), "computed outputs");

	Ok(BuildResult { target, files })
}

/// Read, substitute and return one resolved mapping.
pub fn render_file(
	project: &Project,
	ctx: &BuildContext,
	entry: &ResolvedMapping,
) -> MdgenResult<RenderedFile> {
	let raw = std::fs::read_to_string(&entry.source)?;
	let (content, converged) = if entry.raw {
		(raw, true)
	} else {
		let document = relative_display(&project.root, &entry.source);
		let resolution = resolve_document(
			&document,
			&normalize_line_endings(&raw),
			&project.registry,
			ctx,
			&project.options.substitution,
		)?;
		(resolution.content, resolution.converged)
	};

	Ok(RenderedFile {
		source: entry.source.clone(),
		destination: entry.destination.clone(),
		relative_destination: entry.relative_destination.clone(),
		content,
		converged,
	})
}

/// Write rendered outputs to disk, creating parent directories as needed.
/// Files whose content is already current are left untouched. Returns the
/// number of files written.
pub fn write_outputs(result: &BuildResult) -> MdgenResult<usize> {
	let mut written = 0;

	for file in &result.files {
		if write_if_changed(&file.destination, &file.content)? {
			tracing::info!(destination = %file.destination.display(), "wrote output");
			written += 1;
		}
	}

	Ok(written)
}

/// Write `content` to `path` unless it already holds exactly that content.
pub(crate) fn write_if_changed(path: &Path, content: &str) -> MdgenResult<bool> {
	if std::fs::read_to_string(path).is_ok_and(|current| current == content) {
		return Ok(false);
	}

	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent)?;
	}
	std::fs::write(path, content)?;
	Ok(true)
}

/// Compare the output tree of `target` with a fresh build.
pub fn check_outputs(project: &Project, target: BuildTarget) -> MdgenResult<CheckResult> {
	let result = compute_outputs(project, target)?;
	let mut stale = Vec::new();
	let mut missing = Vec::new();

	for file in result.files {
		match std::fs::read_to_string(&file.destination) {
			Ok(current) if current == file.content => {}
			Ok(current) => {
				stale.push(StaleOutput {
					destination: file.destination,
					relative_destination: file.relative_destination,
					current,
					expected: file.content,
				});
			}
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				missing.push(file.relative_destination);
			}
			Err(e) => return Err(e.into()),
		}
	}

	Ok(CheckResult {
		target,
		stale,
		missing,
	})
}

/// Destination paths of `target`, relative to its output root, in build
/// order. This is the list an installer compares the output tree against.
pub fn expected_files(project: &Project, target: BuildTarget) -> MdgenResult<Vec<PathBuf>> {
	Ok(project
		.expand(target)?
		.iter()
		.map(|entry| entry.relative_destination.clone())
		.collect())
}

/// Normalize CRLF line endings to LF.
pub fn normalize_line_endings(content: &str) -> String {
	if content.contains('\r') {
		content.replace("\r\n", "\n").replace('\r', "\n")
	} else {
		content.to_string()
	}
}

fn relative_display(root: &Path, path: &Path) -> String {
	path.strip_prefix(root)
		.unwrap_or(path)
		.to_string_lossy()
		.replace('\\', "/")
}
