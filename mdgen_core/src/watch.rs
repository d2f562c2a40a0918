//! Primitives for incremental rebuilds in watch mode.
//!
//! The filesystem listener itself lives in the CLI. This module decides which
//! mappings a change touches and makes sure a superseded rebuild never
//! overwrites the output of a newer one.

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;

use crate::BuildTarget;
use crate::Manifest;
use crate::MdgenResult;
use crate::Project;
use crate::ResolvedMapping;
use crate::project::render_file;
use crate::project::write_if_changed;

/// Window used to coalesce a burst of filesystem events into one rebuild.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);

/// Monotonic generation counter per destination path.
///
/// Every rebuild of a destination calls [`begin`](Self::begin) before it
/// renders and [`commit`](Self::commit) when done. The commit only writes
/// if no newer rebuild of the same destination has begun in between.
#[derive(Debug, Default)]
pub struct GenerationTracker {
	generations: Mutex<HashMap<PathBuf, u64>>,
}

impl GenerationTracker {
	pub fn new() -> Self {
		Self::default()
	}

	/// Start a new generation for `destination` and return its number.
	pub fn begin(&self, destination: &Path) -> u64 {
		let mut generations = self.lock();
		let generation = generations.entry(destination.to_path_buf()).or_insert(0);
		*generation += 1;
		*generation
	}

	/// The latest generation started for `destination` (0 if none).
	pub fn current(&self, destination: &Path) -> u64 {
		self.lock().get(destination).copied().unwrap_or(0)
	}

	pub fn is_current(&self, destination: &Path, generation: u64) -> bool {
		self.current(destination) == generation
	}

	/// Write `content` to `destination` if `generation` is still the newest.
	///
	/// The check and the write happen under the same lock, so a newer
	/// generation can't slip in between them. Returns false when the result
	/// was discarded.
	pub fn commit(&self, destination: &Path, generation: u64, content: &str) -> MdgenResult<bool> {
		let generations = self.lock();
		if generations.get(destination).copied().unwrap_or(0) != generation {
			tracing::debug!(
				destination = %destination.display(),
				generation,
				"discarding superseded rebuild"
			);
			return Ok(false);
		}

		write_if_changed(destination, content)?;
		Ok(true)
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, u64>> {
		self.generations
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
	}
}

/// Indices of the manifest mappings for `target` whose source pattern matches
/// any of the changed paths. Paths outside `root` are ignored.
pub fn affected_mappings(
	manifest: &Manifest,
	root: &Path,
	changed: &[PathBuf],
	target: BuildTarget,
) -> BTreeSet<usize> {
	let mut affected = BTreeSet::new();

	for path in changed {
		let Ok(relative) = path.strip_prefix(root) else {
			continue;
		};

		for (index, mapping) in manifest.mappings_for(target) {
			if mapping.matches_path(relative) {
				affected.insert(index);
			}
		}
	}

	affected
}

/// Outcome of [`rebuild_affected`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildReport {
	/// Destinations written by this rebuild.
	pub written: Vec<PathBuf>,
	/// Destinations skipped because a newer rebuild had already started.
	pub superseded: Vec<PathBuf>,
}

/// A rebuild whose generations were taken when its event batch was
/// dispatched. Executing it later, possibly on another thread, can't reorder
/// it ahead of a batch dispatched after it.
#[derive(Debug, Clone)]
pub struct RebuildPlan {
	pub target: BuildTarget,
	entries: Vec<(ResolvedMapping, u64)>,
}

impl RebuildPlan {
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

/// Expand the manifest and begin a new generation for every output of the
/// given mappings.
///
/// The whole manifest is expanded so that a newly added source can't
/// introduce a destination conflict unnoticed.
pub fn plan_rebuild(
	project: &Project,
	target: BuildTarget,
	mappings: &BTreeSet<usize>,
	tracker: &GenerationTracker,
) -> MdgenResult<RebuildPlan> {
	let resolved = project.expand(target)?;
	let entries = resolved
		.for_mappings(mappings)
		.into_iter()
		.map(|entry| (entry.clone(), tracker.begin(&entry.destination)))
		.collect();

	Ok(RebuildPlan { target, entries })
}

/// Render and commit every output of `plan`. Outputs whose generation was
/// superseded in the meantime are left alone.
pub fn execute_rebuild(
	project: &Project,
	plan: &RebuildPlan,
	tracker: &GenerationTracker,
) -> MdgenResult<RebuildReport> {
	let target = plan.target;
	let ctx = project.context(target);
	let mut report = RebuildReport::default();

	for (entry, generation) in &plan.entries {
		let rendered = render_file(project, &ctx, entry)?;
		if tracker.commit(&rendered.destination, *generation, &rendered.content)? {
			report.written.push(rendered.destination);
		} else {
			report.superseded.push(rendered.destination);
		}
	}

	tracing::debug!(
		%target,
		written = report.written.len(),
		superseded = report.superseded.len(),
		"incremental rebuild finished"
	);

	Ok(report)
}

/// Plan and immediately execute a rebuild of the given mappings.
pub fn rebuild_affected(
	project: &Project,
	target: BuildTarget,
	mappings: &BTreeSet<usize>,
	tracker: &GenerationTracker,
) -> MdgenResult<RebuildReport> {
	let plan = plan_rebuild(project, target, mappings, tracker)?;
	execute_rebuild(project, &plan, tracker)
}
