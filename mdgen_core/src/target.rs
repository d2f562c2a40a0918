use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::MdgenError;

/// A named distribution output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildTarget {
	/// The local development tree.
	Local,
	/// The packaged distribution published to a registry.
	Packaged,
	/// The plugin-style bundle.
	Plugin,
}

impl BuildTarget {
	/// Every target, in declaration order.
	pub const ALL: [BuildTarget; 3] = [Self::Local, Self::Packaged, Self::Plugin];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Local => "local",
			Self::Packaged => "packaged",
			Self::Plugin => "plugin",
		}
	}

	/// Output directory used when the config does not name one.
	pub fn default_output_dir(self) -> PathBuf {
		PathBuf::from("dist").join(self.as_str())
	}
}

impl fmt::Display for BuildTarget {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for BuildTarget {
	type Err = MdgenError;

	fn from_str(value: &str) -> Result<Self, Self::Err> {
		match value.trim().to_ascii_lowercase().as_str() {
			"local" => Ok(Self::Local),
			"packaged" | "package" => Ok(Self::Packaged),
			"plugin" => Ok(Self::Plugin),
			_ => Err(MdgenError::UnknownTarget(value.to_string())),
		}
	}
}

/// Immutable context handed to every placeholder generator.
///
/// Generators read the target and resolve auxiliary files relative to
/// `root`; nothing else about the build is visible to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
	pub target: BuildTarget,
	pub root: PathBuf,
}

impl BuildContext {
	pub fn new(target: BuildTarget, root: impl Into<PathBuf>) -> Self {
		Self {
			target,
			root: root.into(),
		}
	}

	/// Resolve a project-relative path against the build root.
	pub fn resolve(&self, path: &Path) -> PathBuf {
		if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.root.join(path)
		}
	}
}
