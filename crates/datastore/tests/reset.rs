use pretty_assertions::assert_eq;
use strata_datastore::reset::unstaged_changes_after_reset;
use strata_datastore::{reset, DeltaKind, Repo, ResetArgs, ResetError, TableDelta};
use strata_sats::TypeInfo;
use strata_schema::{Column, Schema};
use strata_table::{RootValue, Row};
use tempfile::TempDir;

fn schema() -> Schema {
    Schema::new(vec![
        Column::primary_key(1u64, "id", TypeInfo::Int),
        Column::new(2u64, "v", TypeInfo::Text),
    ])
    .unwrap()
}

fn args(hard: bool, soft: bool, args: &[&str]) -> ResetArgs {
    ResetArgs {
        hard,
        soft,
        args: args.iter().map(|s| s.to_string()).collect(),
    }
}

fn edit_working(repo: &mut Repo, f: impl FnOnce(RootValue) -> RootValue) {
    let root = f(repo.working_root().unwrap());
    repo.set_working_root(&root).unwrap();
}

fn insert(root: RootValue, table: &str, id: i64) -> RootValue {
    root.insert_row(table, &Row::new().with(1u64, id).with(2u64, "x")).unwrap()
}

/// A repository with two commits after the initial one:
/// the first creates `table1` and `table2`, the second inserts a row into each.
fn repo_with_history() -> (TempDir, Repo) {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir().unwrap();
    let mut repo = Repo::init(dir.path()).unwrap();
    edit_working(&mut repo, |root| {
        root.create_table("table1", schema())
            .unwrap()
            .create_table("table2", schema())
            .unwrap()
    });
    repo.stage_all().unwrap();
    repo.commit("create tables").unwrap();
    edit_working(&mut repo, |root| insert(insert(root, "table1", 1), "table2", 1));
    repo.stage_all().unwrap();
    repo.commit("insert rows").unwrap();
    (dir, repo)
}

fn table_hash(root: &RootValue, name: &str) -> Option<strata_sats::Hash> {
    root.get_table(name).map(|t| t.hash())
}

#[test]
fn hard_reset_to_parent_commit() {
    let (_dir, mut repo) = repo_with_history();
    let parent = repo.resolve_revision("HEAD~1").unwrap();
    edit_working(&mut repo, |root| insert(root, "table1", 2));
    repo.stage_tables(&["table1"]).unwrap();
    edit_working(&mut repo, |root| insert(root, "table2", 2));

    reset(&mut repo, &args(true, false, &["HEAD~1"])).unwrap();

    assert_eq!(repo.head_commit_hash().unwrap(), parent);
    let expected = repo.read_commit(&parent).unwrap().root;
    assert_eq!(repo.head_root().unwrap().hash(), expected);
    assert_eq!(repo.staged_root().unwrap().hash(), expected);
    assert_eq!(repo.working_root().unwrap().hash(), expected);
    assert!(repo.status().unwrap().is_clean());
    assert_eq!(repo.working_root().unwrap().table("table1").unwrap().row_count(), 0);
}

#[test]
fn hard_reset_defaults_to_head() {
    let (_dir, mut repo) = repo_with_history();
    let head = repo.head_commit_hash().unwrap();
    edit_working(&mut repo, |root| root.remove_table("table2"));
    reset(&mut repo, &args(true, false, &[])).unwrap();
    assert_eq!(repo.head_commit_hash().unwrap(), head);
    assert!(repo.status().unwrap().is_clean());
    assert!(repo.working_root().unwrap().has_table("table2"));
}

#[test]
fn reset_named_table_unstages_only_that_table() {
    let (_dir, mut repo) = repo_with_history();
    edit_working(&mut repo, |root| insert(insert(root, "table1", 2), "table2", 2));
    repo.stage_all().unwrap();
    let working_before = repo.working_root().unwrap();
    let staged_before = repo.staged_root().unwrap();

    reset(&mut repo, &args(false, false, &["table1"])).unwrap();

    let head = repo.head_root().unwrap();
    let staged = repo.staged_root().unwrap();
    assert_eq!(table_hash(&staged, "table1"), table_hash(&head, "table1"));
    assert_eq!(table_hash(&staged, "table2"), table_hash(&staged_before, "table2"));
    assert_eq!(repo.working_root().unwrap().hash(), working_before.hash());

    let status = repo.status().unwrap();
    assert_eq!(
        status.staged,
        [TableDelta {
            name: "table2".into(),
            kind: DeltaKind::Modified
        }]
    );
    assert_eq!(
        unstaged_changes_after_reset(&repo).unwrap(),
        [TableDelta {
            name: "table1".into(),
            kind: DeltaKind::Modified
        }]
    );
}

#[test]
fn resetting_a_clean_stage_changes_nothing() {
    let (_dir, mut repo) = repo_with_history();
    let before = repo.staged_root().unwrap().hash();
    let forms: [&[&str]; 4] = [&[], &["."], &["HEAD"], &["table1", "table2"]];
    for form in forms {
        reset(&mut repo, &args(false, false, form)).unwrap();
        assert_eq!(repo.staged_root().unwrap().hash(), before, "{form:?}");
    }
}

#[test]
fn soft_reset_keeps_working() {
    let (_dir, mut repo) = repo_with_history();
    let head = repo.head_root().unwrap();
    let parent = repo.resolve_revision("HEAD~1").unwrap();
    reset(&mut repo, &args(false, true, &["HEAD~1"])).unwrap();

    assert_eq!(repo.head_commit_hash().unwrap(), parent);
    assert_eq!(repo.working_root().unwrap().hash(), head.hash());
    assert_eq!(repo.staged_root().unwrap().hash(), repo.head_root().unwrap().hash());
    let status = repo.status().unwrap();
    assert!(status.staged.is_empty());
    assert_eq!(status.unstaged.len(), 2);
}

#[test]
fn lone_revision_argument_moves_head() {
    let (_dir, mut repo) = repo_with_history();
    let parent = repo.resolve_revision("HEAD~1").unwrap();
    reset(&mut repo, &args(false, false, &[&parent.abbreviate()])).unwrap();
    assert_eq!(repo.head_commit_hash().unwrap(), parent);
}

#[test]
fn new_tables_are_not_reported() {
    let (_dir, mut repo) = repo_with_history();
    edit_working(&mut repo, |root| {
        root.create_table("table3", schema()).unwrap().remove_table("table2")
    });
    reset(&mut repo, &args(false, false, &[])).unwrap();
    assert_eq!(
        unstaged_changes_after_reset(&repo).unwrap(),
        [TableDelta {
            name: "table2".into(),
            kind: DeltaKind::Deleted
        }]
    );
}

#[test]
fn unknown_tables_fail_without_changes() {
    let (_dir, mut repo) = repo_with_history();
    let staged = repo.staged_root().unwrap().hash();
    let err = reset(&mut repo, &args(false, false, &["nope"])).unwrap_err();
    assert!(matches!(&err, ResetError::TablesNotFound(names) if names == &["nope"]));
    let err = reset(&mut repo, &args(false, false, &["table1", "nope", "gone"])).unwrap_err();
    assert!(matches!(&err, ResetError::TablesNotFound(names) if names == &["nope", "gone"]));
    assert!(matches!(
        reset(&mut repo, &args(true, true, &[])),
        Err(ResetError::MutuallyExclusiveFlags)
    ));
    assert!(matches!(
        reset(&mut repo, &args(true, false, &["HEAD", "table1"])),
        Err(ResetError::TooManyArguments)
    ));
    assert_eq!(repo.staged_root().unwrap().hash(), staged);
}

#[test]
fn reset_survives_reopen() {
    let (dir, mut repo) = repo_with_history();
    let parent = repo.resolve_revision("HEAD~1").unwrap();
    reset(&mut repo, &args(true, false, &["HEAD~1"])).unwrap();
    drop(repo);
    let repo = Repo::open(dir.path()).unwrap();
    assert_eq!(repo.head_commit_hash().unwrap(), parent);
    assert!(repo.status().unwrap().is_clean());
}
