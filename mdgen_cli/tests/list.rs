mod common;

use mdgen_core::AnyEmptyResult;

#[test]
fn list_expected_files_in_build_order() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_project(tmp.path())?;

	common::mdgen_cmd()
		.args(["list", "--target", "packaged", "--path"])
		.arg(tmp.path())
		.assert()
		.success()
		.stdout("commands/bye.md\ncommands/hello.md\nREADME.md\n");

	Ok(())
}

#[test]
fn list_as_json() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_project(tmp.path())?;

	common::mdgen_cmd()
		.args(["list", "--target", "local", "--format", "json", "--path"])
		.arg(tmp.path())
		.assert()
		.success()
		.stdout("[\"commands/bye.md\",\"commands/hello.md\"]\n");

	Ok(())
}

#[test]
fn list_picks_up_new_sources() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_project(tmp.path())?;
	common::write_files(tmp.path(), &[("src/commands/again.md", "# Again\n")])?;

	common::mdgen_cmd()
		.args(["list", "--target", "plugin", "--path"])
		.arg(tmp.path())
		.assert()
		.success()
		.stdout("commands/again.md\ncommands/bye.md\ncommands/hello.md\n");

	Ok(())
}

#[test]
fn list_requires_a_known_target() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_project(tmp.path())?;

	common::mdgen_cmd()
		.args(["list", "--target", "staging", "--path"])
		.arg(tmp.path())
		.assert()
		.failure();

	Ok(())
}
