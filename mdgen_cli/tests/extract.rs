mod common;

use mdgen_core::AnyEmptyResult;

const GUIDE: &str = "# Guide\n\n## Real {#real-one}\n\nintro\n\n```md\n## Fake\n```\n\nafter\n\n## \
                     Next\n\nnext body\n";

#[test]
fn extract_ignores_fenced_headings() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_files(tmp.path(), &[("docs/guide.md", GUIDE)])?;

	common::mdgen_cmd()
		.args(["extract", "docs/guide.md", "Real", "--path"])
		.arg(tmp.path())
		.assert()
		.success()
		.stdout("\nintro\n\n```md\n## Fake\n```\n\nafter\n\n");

	Ok(())
}

#[test]
fn extract_by_anchor() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_files(tmp.path(), &[("docs/guide.md", GUIDE)])?;

	common::mdgen_cmd()
		.args(["extract", "docs/guide.md", "#next", "--path"])
		.arg(tmp.path())
		.assert()
		.success()
		.stdout("\nnext body\n");

	Ok(())
}

#[test]
fn extract_missing_section_fails() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_files(tmp.path(), &[("docs/guide.md", GUIDE)])?;

	common::mdgen_cmd()
		.args(["extract", "docs/guide.md", "Fake", "--path"])
		.arg(tmp.path())
		.assert()
		.code(2)
		.stderr(predicates::str::contains("mdgen::section_not_found"));

	Ok(())
}
