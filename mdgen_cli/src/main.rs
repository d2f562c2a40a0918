use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::mpsc;

use clap::Parser;
use mdgen_cli::Commands;
use mdgen_cli::ListFormat;
use mdgen_cli::MdgenCli;
use mdgen_cli::OutputFormat;
use mdgen_cli::TargetArg;
use mdgen_cli::selected_targets;
use mdgen_core::AnyEmptyResult;
use mdgen_core::AnyResult;
use mdgen_core::BuildTarget;
use mdgen_core::CheckResult;
use mdgen_core::DEFAULT_DEBOUNCE;
use mdgen_core::GenerationTracker;
use mdgen_core::MdgenConfig;
use mdgen_core::MdgenError;
use mdgen_core::MdgenResult;
use mdgen_core::Project;
use mdgen_core::SectionQuery;
use mdgen_core::affected_mappings;
use mdgen_core::check_outputs;
use mdgen_core::compute_outputs;
use mdgen_core::execute_rebuild;
use mdgen_core::expected_files;
use mdgen_core::extract_section;
use mdgen_core::normalize_line_endings;
use mdgen_core::plan_rebuild;
use mdgen_core::write_outputs;
use notify::Watcher;
use owo_colors::OwoColorize;
use similar::ChangeTag;
use similar::TextDiff;
use tracing_subscriber::EnvFilter;

static USE_COLOR: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(std::sync::atomic::Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,green) => {
		if color_enabled() {
			format!("{}", $text.green())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,yellow) => {
		if color_enabled() {
			format!("{}", $text.yellow())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,bold) => {
		if color_enabled() {
			format!("{}", $text.bold())
		} else {
			format!("{}", $text)
		}
	};
}

const SAMPLE_CONFIG: &str = r#"# mdgen configuration

# Output directory of each build target, relative to this file.
[targets]
local = "dist/local"
packaged = "dist/packaged"
plugin = "dist/plugin"

# Map source files to destinations. A glob source needs exactly one `{name}`
# (the matched file's stem) in its destination.
[[mappings]]
source = "src/*.md"
destination = "{name}.md"
# targets = ["local", "plugin"]
# required = true

# Values for `{{{KEY}}}` placeholders. `{{{TARGET}}}` is always available.
[placeholders]
# VERSION = { data = "package.json", field = "version" }
# USAGE = { section = "README.md", heading = "Usage" }

[build]
max_iterations = 10
strict = false
"#;

fn main() {
	let args = MdgenCli::parse();

	// Respect NO_COLOR env var and --no-color flag.
	let use_color = !args.no_color
		&& std::env::var_os("NO_COLOR").is_none()
		&& supports_color::on(supports_color::Stream::Stderr).is_some();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	// Install miette's fancy handler for rich error diagnostics.
	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	init_tracing(args.verbose, use_color);

	let result = match &args.command {
		Some(Commands::Init) => run_init(&args),
		Some(Commands::Build {
			target,
			all,
			strict,
			dry_run,
			watch,
		}) => {
			let targets = if *all {
				BuildTarget::ALL.to_vec()
			} else {
				selected_targets(*target)
			};
			run_build(&args, &targets, *strict, *dry_run, *watch)
		}
		Some(Commands::Check {
			target,
			diff,
			format,
		}) => run_check(&args, *target, *diff, *format),
		Some(Commands::List { target, format }) => run_list(&args, *target, *format),
		Some(Commands::Extract { file, heading }) => run_extract(&args, file, heading),
		None => {
			eprintln!("No subcommand specified. Run `mdgen --help` for usage.");
			process::exit(1);
		}
	};

	if let Err(e) = result {
		// Try to render through miette for rich diagnostics with help text
		// and error codes.
		match e.downcast::<MdgenError>() {
			Ok(mdgen_err) => print_error(*mdgen_err),
			Err(e) => {
				eprintln!("{} {e}", colored!("error:", red));
			}
		}
		process::exit(2);
	}
}

/// Log to stderr. `RUST_LOG` overrides the default level.
fn init_tracing(verbose: bool, use_color: bool) {
	let default_directives = if verbose {
		"warn,mdgen=debug,mdgen_core=debug"
	} else {
		"warn"
	};
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(use_color)
		.with_target(false)
		.try_init()
		.ok();
}

fn print_error(error: MdgenError) {
	let report: miette::Report = error.into();
	eprintln!("{report:?}");
}

fn resolve_root(args: &MdgenCli) -> PathBuf {
	let root = args
		.path
		.clone()
		.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
	root.canonicalize().unwrap_or(root)
}

fn load_project(root: &Path, strict: bool) -> MdgenResult<Project> {
	let mut project = Project::load(root)?;
	if strict {
		project.options.substitution.strict = true;
	}
	Ok(project)
}

fn run_init(args: &MdgenCli) -> AnyEmptyResult {
	let root = resolve_root(args);

	if let Some(existing) = MdgenConfig::resolve_path(&root) {
		println!("Config file already exists: {}", existing.display());
		return Ok(());
	}

	let config_path = root.join("mdgen.toml");
	std::fs::write(&config_path, SAMPLE_CONFIG)?;
	println!("Created {}", config_path.display());
	println!();
	println!("Next steps:");
	println!("  1. Edit mdgen.toml to map your sources to destinations");
	println!("  2. Add {{{{{{KEY}}}}}} placeholders to your markdown sources");
	println!("  3. Run `mdgen build --all` to generate every target");

	Ok(())
}

fn run_build(
	args: &MdgenCli,
	targets: &[BuildTarget],
	strict: bool,
	dry_run: bool,
	watch: bool,
) -> AnyEmptyResult {
	let root = resolve_root(args);
	let project = load_project(&root, strict)?;

	for target in targets {
		build_once(&project, *target, dry_run, args.verbose)?;
	}

	if !watch {
		return Ok(());
	}

	run_watch(&root, project, targets, strict)
}

fn build_once(project: &Project, target: BuildTarget, dry_run: bool, verbose: bool) -> AnyEmptyResult {
	let result = compute_outputs(project, target)?;
	let output_dir = make_relative(&project.output_dir(target), &project.root);

	if dry_run {
		println!(
			"Dry run: would write {} file(s) for target `{target}` to {output_dir}:",
			result.files.len()
		);
		for file in &result.files {
			println!("  {}", display_path(&file.relative_destination));
		}
		return Ok(());
	}

	let written = write_outputs(&result)?;
	println!(
		"Built target `{target}`: {} file(s), {written} written to {output_dir}.",
		result.files.len()
	);

	if verbose {
		for file in &result.files {
			println!("  {}", display_path(&file.relative_destination));
		}
	}

	for file in result.diverged() {
		eprintln!(
			"{} placeholders in {} did not converge",
			colored!("warning:", yellow),
			make_relative(&file.source, &project.root)
		);
	}

	Ok(())
}

/// Rebuild affected outputs on every debounced batch of filesystem events.
fn run_watch(
	root: &Path,
	project: Project,
	targets: &[BuildTarget],
	strict: bool,
) -> AnyEmptyResult {
	println!("\nWatching for file changes... (press Ctrl+C to stop)");

	let (tx, rx) = mpsc::channel::<Vec<PathBuf>>();
	let mut watcher =
		notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
			if let Ok(event) = res {
				if matches!(
					event.kind,
					notify::EventKind::Modify(_)
						| notify::EventKind::Create(_)
						| notify::EventKind::Remove(_)
				) {
					let _ = tx.send(event.paths);
				}
			}
		})?;
	watcher.watch(root, notify::RecursiveMode::Recursive)?;

	let config_path = MdgenConfig::resolve_path(root);
	let tracker = Arc::new(GenerationTracker::new());
	let mut project = Arc::new(project);

	loop {
		let mut changed: BTreeSet<PathBuf> = rx.recv()?.into_iter().collect();
		// Debounce: coalesce the burst of events from one logical edit.
		while let Ok(paths) = rx.recv_timeout(DEFAULT_DEBOUNCE) {
			changed.extend(paths);
		}

		let config_changed = config_path
			.as_ref()
			.is_some_and(|config| changed.contains(config));
		let outputs: Vec<PathBuf> = BuildTarget::ALL
			.iter()
			.map(|target| project.output_dir(*target))
			.collect();
		let total = changed.len();
		let changed: Vec<PathBuf> = changed
			.into_iter()
			.filter(|path| !outputs.iter().any(|output| path.starts_with(output)))
			.collect();
		tracing::debug!(
			changed = changed.len(),
			ignored = total - changed.len(),
			config_changed,
			"watch batch"
		);

		let mut batch = Vec::new();
		if config_changed {
			println!("\nConfig changed, reloading...");
			match load_project(root, strict) {
				Ok(reloaded) => project = Arc::new(reloaded),
				Err(e) => {
					print_error(e);
					continue;
				}
			}

			for target in targets {
				let all: BTreeSet<usize> = project
					.manifest
					.mappings_for(*target)
					.map(|(index, _)| index)
					.collect();
				batch.push((*target, all));
			}
		} else {
			for target in targets {
				let affected = affected_mappings(&project.manifest, root, &changed, *target);
				if !affected.is_empty() {
					batch.push((*target, affected));
				}
			}
		}

		if batch.is_empty() {
			tracing::debug!("no mapping matches the changed files");
			continue;
		}

		println!("\nFile change detected, rebuilding...");
		// Generations are taken here, in dispatch order, so a slow rebuild
		// thread can never commit over a newer batch.
		let mut plans = Vec::new();
		for (target, mappings) in batch {
			match plan_rebuild(&project, target, &mappings, &tracker) {
				Ok(plan) => plans.push(plan),
				Err(e) => print_error(e),
			}
		}

		let project = Arc::clone(&project);
		let tracker = Arc::clone(&tracker);
		std::thread::spawn(move || {
			for plan in plans {
				match execute_rebuild(&project, &plan, &tracker) {
					Ok(report) => {
						for path in &report.written {
							println!("  [{}] {}", plan.target, make_relative(path, &project.root));
						}
					}
					Err(e) => print_error(e),
				}
			}
		});
	}
}

fn run_check(
	args: &MdgenCli,
	target: Option<TargetArg>,
	show_diff: bool,
	format: OutputFormat,
) -> AnyEmptyResult {
	let root = resolve_root(args);
	let project = load_project(&root, false)?;
	let results = selected_targets(target)
		.into_iter()
		.map(|target| check_outputs(&project, target))
		.collect::<MdgenResult<Vec<_>>>()?;

	if results.iter().all(CheckResult::is_ok) {
		match format {
			OutputFormat::Json => {
				let targets: Vec<serde_json::Value> = results
					.iter()
					.map(|result| {
						serde_json::json!({ "target": result.target, "stale": [], "missing": [] })
					})
					.collect();
				println!("{}", serde_json::json!({ "ok": true, "targets": targets }));
			}
			OutputFormat::Github => {
				println!("All generated outputs are up to date.");
			}
			OutputFormat::Text => {
				println!("Check passed: all generated outputs are up to date.");
			}
		}
		return Ok(());
	}

	match format {
		OutputFormat::Json => {
			let targets: Vec<serde_json::Value> = results
				.iter()
				.map(|result| {
					let stale: Vec<String> = result
						.stale
						.iter()
						.map(|entry| display_path(&entry.relative_destination))
						.collect();
					let missing: Vec<String> =
						result.missing.iter().map(|path| display_path(path)).collect();
					serde_json::json!({
						"target": result.target,
						"stale": stale,
						"missing": missing,
					})
				})
				.collect();
			println!("{}", serde_json::json!({ "ok": false, "targets": targets }));
		}
		OutputFormat::Github => {
			for result in &results {
				let output_dir = project.output_dir(result.target);
				for entry in &result.stale {
					let rel = make_relative(&entry.destination, &root);
					println!(
						"::warning file={rel}::Generated output for target `{}` is out of date",
						result.target
					);
				}
				for path in &result.missing {
					let rel = make_relative(&output_dir.join(path), &root);
					println!(
						"::error file={rel}::Generated output for target `{}` is missing",
						result.target
					);
				}
			}
			eprintln!("{}", check_summary(&results));
		}
		OutputFormat::Text => {
			eprintln!("Check failed.");
			for result in &results {
				if result.is_ok() {
					continue;
				}

				eprintln!();
				eprintln!("{}", colored!(format!("Target `{}`:", result.target), bold));
				for entry in &result.stale {
					eprintln!("  stale   {}", display_path(&entry.relative_destination));
					if show_diff {
						print_diff(&entry.current, &entry.expected);
					}
				}
				for path in &result.missing {
					eprintln!("  missing {}", display_path(path));
				}
			}

			eprintln!();
			eprintln!("{}", check_summary(&results));
		}
	}

	process::exit(1);
}

fn check_summary(results: &[CheckResult]) -> String {
	let stale: usize = results.iter().map(|result| result.stale.len()).sum();
	let missing: usize = results.iter().map(|result| result.missing.len()).sum();
	let mut parts = Vec::new();
	if stale > 0 {
		parts.push(format!("{stale} output(s) are out of date"));
	}
	if missing > 0 {
		parts.push(format!("{missing} output(s) are missing"));
	}

	format!(
		"{}. Run `mdgen build --all` to regenerate.",
		parts.join(", ")
	)
}

fn run_list(args: &MdgenCli, target: TargetArg, format: ListFormat) -> AnyEmptyResult {
	let root = resolve_root(args);
	let project = load_project(&root, false)?;
	let target = BuildTarget::from(target);
	let files: Vec<String> = expected_files(&project, target)?
		.iter()
		.map(|path| display_path(path))
		.collect();

	match format {
		ListFormat::Json => {
			println!("{}", serde_json::to_string(&files)?);
		}
		ListFormat::Text => {
			if files.is_empty() {
				eprintln!("No files expected for target `{target}`.");
			}
			for file in &files {
				println!("{file}");
			}
		}
	}

	Ok(())
}

fn run_extract(args: &MdgenCli, file: &Path, heading: &str) -> AnyEmptyResult {
	let root = resolve_root(args);
	let path = if file.is_absolute() {
		file.to_path_buf()
	} else {
		root.join(file)
	};
	let content = normalize_line_endings(&read_document(&path)?);
	let section = extract_section(&display_path(file), &content, &SectionQuery::parse(heading))?;
	print!("{}", section.content);

	Ok(())
}

fn read_document(path: &Path) -> AnyResult<String> {
	Ok(std::fs::read_to_string(path).map_err(MdgenError::from)?)
}

/// Print a unified diff between two strings, colorized.
fn print_diff(current: &str, expected: &str) {
	let diff = TextDiff::from_lines(current, expected);
	for change in diff.iter_all_changes() {
		match change.tag() {
			ChangeTag::Delete => {
				eprint!("    {}", colored!(format!("-{change}"), red));
			}
			ChangeTag::Insert => {
				eprint!("    {}", colored!(format!("+{change}"), green));
			}
			ChangeTag::Equal => {
				eprint!("     {change}");
			}
		}
	}
}

/// Make a path relative to root for display purposes.
fn make_relative(path: &Path, root: &Path) -> String {
	display_path(path.strip_prefix(root).unwrap_or(path))
}

fn display_path(path: &Path) -> String {
	path.to_string_lossy().replace('\\', "/")
}
