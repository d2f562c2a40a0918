mod common;

use mdgen_core::AnyEmptyResult;
use rstest::rstest;

const MAPPING: &str = "[[mappings]]\nsource = \"a.md\"\ndestination = \"a.md\"\n";

#[rstest]
#[case::root("mdgen.toml")]
#[case::hidden(".mdgen.toml")]
#[case::config_dir(".config/mdgen.toml")]
fn config_is_discovered(#[case] config_file: &str) -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_files(tmp.path(), &[(config_file, MAPPING), ("a.md", "a\n")])?;

	common::mdgen_cmd()
		.args(["list", "--target", "local", "--path"])
		.arg(tmp.path())
		.assert()
		.success()
		.stdout("a.md\n");

	Ok(())
}

#[test]
fn visible_config_takes_precedence() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_files(
		tmp.path(),
		&[
			("mdgen.toml", MAPPING),
			(
				".mdgen.toml",
				"[[mappings]]\nsource = \"b.md\"\ndestination = \"b.md\"\n",
			),
			("a.md", "a\n"),
			("b.md", "b\n"),
		],
	)?;

	common::mdgen_cmd()
		.args(["list", "--target", "local", "--path"])
		.arg(tmp.path())
		.assert()
		.success()
		.stdout("a.md\n");

	Ok(())
}

#[test]
fn invalid_config_is_reported() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_files(tmp.path(), &[("mdgen.toml", "[[mappings]]\nsource = 1\n")])?;

	common::mdgen_cmd()
		.args(["list", "--target", "local", "--path"])
		.arg(tmp.path())
		.assert()
		.code(2)
		.stderr(predicates::str::contains("mdgen::config_parse"));

	Ok(())
}
