use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use mdgen_core::BuildTarget;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Generate per-target distribution trees from markdown sources.",
	long_about = "mdgen expands declarative file mappings into output trees for each build \
	              target and resolves `{{{KEY}}}` placeholders in every document until nothing \
	              changes.\n\nQuick start:\n  mdgen init                   Create mdgen.toml\n  \
	              mdgen build --target local   Build one target\n  mdgen check                  \
	              Verify every output tree is current\n  mdgen list --target plugin   Print \
	              the expected file list"
)]
pub struct MdgenCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Path to the project root directory.
	#[arg(long, short, global = true)]
	pub path: Option<PathBuf>,

	/// Enable verbose output.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Initialize mdgen in a project by creating a sample `mdgen.toml`.
	///
	/// If a config file already exists, this command is a no-op and exits
	/// successfully.
	Init,
	/// Build the output tree of one target, or of every target with `--all`.
	///
	/// Expands the manifest, substitutes placeholders, and writes every
	/// output. Files whose content is already current are not rewritten.
	Build {
		/// The target to build.
		#[arg(long, short, value_enum, required_unless_present = "all", conflicts_with = "all")]
		target: Option<TargetArg>,

		/// Build every target.
		#[arg(long, default_value_t = false)]
		all: bool,

		/// Fail when placeholder substitution does not converge instead of
		/// writing best-effort output.
		#[arg(long, default_value_t = false)]
		strict: bool,

		/// Print the files that would be written without touching disk.
		#[arg(long, default_value_t = false)]
		dry_run: bool,

		/// Rebuild affected outputs whenever a source file changes. Changing
		/// the config file reloads the project and rebuilds everything.
		#[arg(long, default_value_t = false, conflicts_with = "dry_run")]
		watch: bool,
	},
	/// Check that generated outputs are up to date.
	///
	/// Recomputes every output and compares it with the file on disk. Exits
	/// with status 1 if any output is stale or missing. Checks every target
	/// unless `--target` is given.
	Check {
		/// The target to check.
		#[arg(long, short, value_enum)]
		target: Option<TargetArg>,

		/// Show a unified diff for each stale output.
		#[arg(long, default_value_t = false)]
		diff: bool,

		/// Output format for check results. Use `github` for GitHub Actions
		/// annotations.
		#[arg(long, value_enum, default_value_t = OutputFormat::Text)]
		format: OutputFormat,
	},
	/// List the files a target is expected to contain, relative to its
	/// output directory and in build order.
	List {
		/// The target to list.
		#[arg(long, short, value_enum)]
		target: TargetArg,

		/// Output format.
		#[arg(long, value_enum, default_value_t = ListFormat::Text)]
		format: ListFormat,
	},
	/// Print one section of a markdown file.
	///
	/// Headings inside fenced code blocks, front matter, and tag regions are
	/// ignored. Prefix the heading with `#` to select it by anchor.
	Extract {
		/// The markdown file to read.
		file: PathBuf,

		/// Heading title, or `#anchor`.
		heading: String,
	},
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TargetArg {
	/// The local development tree.
	Local,
	/// The packaged distribution.
	Packaged,
	/// The plugin bundle.
	Plugin,
}

impl From<TargetArg> for BuildTarget {
	fn from(value: TargetArg) -> Self {
		match value {
			TargetArg::Local => BuildTarget::Local,
			TargetArg::Packaged => BuildTarget::Packaged,
			TargetArg::Plugin => BuildTarget::Plugin,
		}
	}
}

/// Resolve an optional target flag to the targets it selects.
pub fn selected_targets(target: Option<TargetArg>) -> Vec<BuildTarget> {
	match target {
		Some(target) => vec![target.into()],
		None => BuildTarget::ALL.to_vec(),
	}
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
	/// Human-readable text output with colors and formatting.
	Text,
	/// JSON output for programmatic consumption.
	Json,
	/// GitHub Actions annotation format.
	Github,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ListFormat {
	/// One path per line.
	Text,
	/// A JSON array of paths.
	Json,
}
