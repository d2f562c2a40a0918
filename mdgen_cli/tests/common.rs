#![allow(dead_code)]

use std::path::Path;

use assert_cmd::Command;
use insta_cmd::get_cargo_bin;

pub const PROJECT_CONFIG: &str = r#"
[[mappings]]
source = "src/commands/*.md"
destination = "commands/{name}.md"

[[mappings]]
source = "README.md"
destination = "README.md"
targets = ["packaged"]

[placeholders]
GREETING = "Hello from {{{TARGET}}}"
"#;

pub fn mdgen_cmd() -> Command {
	let mut cmd = Command::new(get_cargo_bin("mdgen"));
	cmd.env("NO_COLOR", "1");
	cmd.env_remove("RUST_LOG");
	cmd
}

pub fn write_files(root: &Path, files: &[(&str, &str)]) -> std::io::Result<()> {
	for (path, content) in files {
		let path = root.join(path);
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		std::fs::write(path, content)?;
	}
	Ok(())
}

/// Two commands for every target plus a readme for the packaged target.
pub fn write_project(root: &Path) -> std::io::Result<()> {
	write_files(
		root,
		&[
			("mdgen.toml", PROJECT_CONFIG),
			("src/commands/hello.md", "# Hello\n\n{{{GREETING}}}\n"),
			("src/commands/bye.md", "# Bye\n"),
			("README.md", "# Readme\n"),
		],
	)
}
