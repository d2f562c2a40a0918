use std::path::Path;

use tempfile::TempDir;

use crate::BuildContext;
use crate::BuildTarget;
use crate::SubstitutionRegistry;
use crate::registry::Literal;

/// A real section containing a fenced sample with a heading-like line.
pub const FENCED_DOCUMENT: &str = "# Doc\n\n## Real\n\nintro\n\n```md\n## Fake\n```\n\nafter\n\n## \
                                   Next\n\nnext body\n";

/// A four-backtick fence wrapping a three-backtick fence.
pub const NESTED_FENCE_DOCUMENT: &str = "## First\n\n````md\n```rust\n## Inner\n```\n# Also \
                                         fake\n````\n\n## Second\n\nsecond body\n\n## Third\n";

/// Nested `<example>` regions hiding headings.
pub const TAGGED_DOCUMENT: &str = "## Usage\n\n<example>\n## Not a \
                                   heading\n<example>\n# nested\n</example>\n</example>\n\ntext\n\n# \
                                   End\n";

pub const CONFIG_TOML: &str = r#"
[targets]
local = "out/local"
plugin = "out/plugin"

[[mappings]]
source = "src/commands/*.md"
destination = "commands/{name}.md"
required = true

[[mappings]]
source = "src/settings.json"
destination = "settings.json"
targets = ["plugin"]
raw = true

[placeholders]
BANNER = "Generated for {{{TARGET}}}"
VERSION = { data = "package.json", field = "version" }
TOOLS = { section = "docs/tools.md", heading = "Tools" }
AGENTS = { list = "src/agents/*.md", format = "- {name}" }
COMMAND_DIR = { per_target = { local = ".claude/commands" }, default = "commands" }
"#;

pub const TOOLS_DOCUMENT: &str = "# Docs\n\n## Tools\n\n- grep\n\n```md\n## Fake\n```\n\n## \
                                  Other\n\nx\n";

pub fn context(target: BuildTarget) -> BuildContext {
	BuildContext::new(target, ".")
}

/// `A` → `B` → `C` → `done`.
pub fn chain_registry() -> SubstitutionRegistry {
	registry_of(&[("A", "{{{B}}}"), ("B", "{{{C}}}"), ("C", "done")])
}

/// `A` → `B` → `A`.
pub fn cyclic_registry() -> SubstitutionRegistry {
	registry_of(&[("A", "{{{B}}}"), ("B", "{{{A}}}")])
}

pub fn registry_of(entries: &[(&str, &str)]) -> SubstitutionRegistry {
	let mut registry = SubstitutionRegistry::with_builtins();
	for (key, value) in entries {
		registry
			.register(*key, Literal((*value).to_string()))
			.unwrap_or_else(|e| panic!("register {key}: {e}"));
	}
	registry
}

pub fn write_files(root: &Path, files: &[(&str, &str)]) {
	for (path, content) in files {
		let path = root.join(path);
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent).unwrap_or_else(|e| panic!("create dir: {e}"));
		}
		std::fs::write(&path, content).unwrap_or_else(|e| panic!("write {}: {e}", path.display()));
	}
}

pub fn read_file(path: &Path) -> String {
	std::fs::read_to_string(path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()))
}

/// Source tree used by the manifest tests.
pub fn source_tree() -> TempDir {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	write_files(
		tmp.path(),
		&[
			("src/commands/beta.md", "# Beta\n"),
			("src/commands/alpha.md", "# Alpha\n"),
			("src/commands/nested/gamma.md", "# Gamma\n"),
			("src/agents/reviewer.md", "# Reviewer\n"),
			("README.md", "# Readme\n"),
		],
	);
	tmp
}

/// A complete project with an `mdgen.toml`.
pub fn project_tree() -> TempDir {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	write_files(
		tmp.path(),
		&[
			("mdgen.toml", CONFIG_TOML),
			(
				"src/commands/alpha.md",
				"{{{BANNER}}}\n\nVersion {{{VERSION}}}\n\n{{{TOOLS}}}",
			),
			("src/agents/reviewer.md", "# Reviewer\n"),
			("src/settings.json", "{ \"raw\": \"{{{TARGET}}}\" }\n"),
			("package.json", r#"{ "name": "demo", "version": "1.2.3" }"#),
			("docs/tools.md", TOOLS_DOCUMENT),
		],
	);
	tmp
}
