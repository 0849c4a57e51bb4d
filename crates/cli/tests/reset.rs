use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::path::Path;
use strata_datastore::Repo;
use strata_sats::TypeInfo;
use strata_schema::{Column, Schema};
use strata_table::Row;
use tempfile::TempDir;

fn strata(dir: &Path, args: &[&str]) -> assert_cmd::assert::Assert {
    let mut cmd = cargo_bin_cmd!("strata");
    cmd.arg("--repo").arg(dir).args(args).assert()
}

/// A repository whose HEAD commit created `table1` and `table2`,
/// with a row inserted into `table1` in working and staged.
fn repo_with_staged_edit() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    strata(dir.path(), &["init"]).success();

    let mut repo = Repo::open(dir.path()).unwrap();
    let schema = Schema::new(vec![Column::primary_key(1u64, "id", TypeInfo::Int)]).unwrap();
    let root = repo
        .working_root()
        .unwrap()
        .create_table("table1", schema.clone())
        .unwrap()
        .create_table("table2", schema)
        .unwrap();
    repo.set_working_root(&root).unwrap();
    drop(repo);
    strata(dir.path(), &["add", "."]).success();
    strata(dir.path(), &["commit", "-m", "create tables"])
        .success()
        .stdout(predicate::str::contains("create tables"));

    let mut repo = Repo::open(dir.path()).unwrap();
    let root = repo
        .working_root()
        .unwrap()
        .insert_row("table1", &Row::new().with(1u64, 1i64))
        .unwrap();
    repo.set_working_root(&root).unwrap();
    drop(repo);
    strata(dir.path(), &["add", "table1"]).success();
    dir
}

#[test]
fn flag_errors_exit_with_failure() {
    let dir = repo_with_staged_edit();
    strata(dir.path(), &["reset", "--hard", "--soft"])
        .failure()
        .code(1)
        .stderr(predicate::str::contains(
            "error: --hard and --soft are mutually exclusive options.",
        ));
    strata(dir.path(), &["reset", "--hard", "HEAD", "table1"])
        .failure()
        .code(1)
        .stderr(predicate::str::contains(
            "error: --hard supports at most one additional param",
        ));
}

#[test]
fn unknown_tables_are_listed() {
    let dir = repo_with_staged_edit();
    strata(dir.path(), &["reset", "nope"])
        .failure()
        .stderr(predicate::str::contains("Invalid Ref or Table:\n\tnope"));
    strata(dir.path(), &["reset", "nope", "gone"])
        .failure()
        .stderr(predicate::str::contains("Invalid Table(s):\n\tnope\n\tgone"));
}

#[test]
fn reset_table_reports_unstaged_changes() {
    let dir = repo_with_staged_edit();
    strata(dir.path(), &["status"])
        .success()
        .stdout(predicate::str::contains("Changes to be committed:\n\tmodified:\ttable1"));
    strata(dir.path(), &["reset", "table1"])
        .success()
        .stdout("Unstaged changes after reset:\nM\ttable1\n");
    strata(dir.path(), &["status"])
        .success()
        .stdout(predicate::str::contains("Changes to be committed").not())
        .stdout(predicate::str::contains("Changes not staged for commit:\n\tmodified:\ttable1"));
}

#[test]
fn hard_reset_cleans_everything() {
    let dir = repo_with_staged_edit();
    strata(dir.path(), &["reset", "--hard"]).success().stdout(predicate::str::is_empty());
    strata(dir.path(), &["status"])
        .success()
        .stdout(predicate::str::contains("nothing to commit, working tree clean"));
}

#[test]
fn hard_reset_to_parent_then_log() {
    let dir = repo_with_staged_edit();
    strata(dir.path(), &["commit", "-m", "insert row"]).success();
    strata(dir.path(), &["reset", "--hard", "HEAD~1"]).success();
    strata(dir.path(), &["log"])
        .success()
        .stdout(predicate::str::contains("create tables"))
        .stdout(predicate::str::contains("insert row").not());
    strata(dir.path(), &["status"])
        .success()
        .stdout(predicate::str::contains("nothing to commit, working tree clean"));
}

#[test]
fn commands_need_a_repository() {
    let dir = tempfile::tempdir().unwrap();
    strata(dir.path(), &["status"])
        .failure()
        .code(1)
        .stderr(predicate::str::contains("is not a strata repository"));
}
