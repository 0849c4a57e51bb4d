//! `reset`: moving `HEAD`, staged and working back to an earlier state.
//!
//! - `--hard [<rev>]` points `HEAD` at `rev` and makes staged and working equal to its root.
//!   This discards working changes.
//! - `--soft <rev>`, or a lone argument that names no table but resolves as a revision,
//!   points `HEAD` at `rev` and stages its root, leaving working alone.
//! - `<table>...` copies those tables from `HEAD` into staged, undoing `add`.
//! - No argument, `.` or `HEAD` unstages everything.

use crate::error::DatastoreError;
use crate::repo::{DeltaKind, Repo, TableDelta};
use strata_sats::Hash;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResetError {
    #[error("--hard and --soft are mutually exclusive options.")]
    MutuallyExclusiveFlags,
    #[error("--hard supports at most one additional param")]
    TooManyArguments,
    #[error("invalid table(s): {}", .0.join(", "))]
    TablesNotFound(Vec<String>),
    #[error(transparent)]
    Datastore(#[from] DatastoreError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetArgs {
    pub hard: bool,
    pub soft: bool,
    pub args: Vec<String>,
}

impl ResetArgs {
    /// Checks the flag combination before anything is read or written.
    pub fn validate(&self) -> Result<(), ResetError> {
        if self.hard && self.soft {
            return Err(ResetError::MutuallyExclusiveFlags);
        }
        if self.hard && self.args.len() > 1 {
            return Err(ResetError::TooManyArguments);
        }
        Ok(())
    }
}

pub fn reset(repo: &mut Repo, args: &ResetArgs) -> Result<(), ResetError> {
    args.validate()?;
    if args.hard {
        let rev = args.args.first().map_or("HEAD", |rev| rev.as_str());
        return reset_hard(repo, rev);
    }
    match &*args.args {
        [] => reset_staged(repo),
        [arg] if arg == "." || arg.eq_ignore_ascii_case("HEAD") => reset_staged(repo),
        [arg] if !names_table(repo, arg)? => match repo.resolve_revision(arg) {
            Ok(commit) => reset_soft(repo, commit),
            Err(DatastoreError::InvalidRevision(_)) => Err(ResetError::TablesNotFound(vec![arg.clone()])),
            Err(e) => Err(e.into()),
        },
        tables => reset_tables(repo, &tables.iter().map(String::as_str).collect::<Vec<_>>()),
    }
}

/// Whether `name` is a table of `HEAD`, staged or working.
fn names_table(repo: &Repo, name: &str) -> Result<bool, ResetError> {
    Ok(repo.head_root()?.has_table(name)
        || repo.staged_root()?.has_table(name)
        || repo.working_root()?.has_table(name))
}

fn reset_hard(repo: &mut Repo, rev: &str) -> Result<(), ResetError> {
    let commit = repo.resolve_revision(rev)?;
    let root = repo.commit_root(&commit)?;
    repo.set_working_root(&root)?;
    repo.set_staged_root(&root)?;
    repo.set_head(commit)?;
    log::debug!("RESET HARD: {} to {commit}", repo.head_branch());
    Ok(())
}

fn reset_soft(repo: &mut Repo, commit: Hash) -> Result<(), ResetError> {
    let root = repo.commit_root(&commit)?;
    repo.set_staged_root(&root)?;
    repo.set_head(commit)?;
    log::debug!("RESET SOFT: {} to {commit}", repo.head_branch());
    Ok(())
}

fn reset_staged(repo: &mut Repo) -> Result<(), ResetError> {
    let head = repo.head_root()?;
    repo.set_staged_root(&head)?;
    log::debug!("RESET STAGED: all tables");
    Ok(())
}

fn reset_tables(repo: &mut Repo, tables: &[&str]) -> Result<(), ResetError> {
    let head = repo.head_root()?;
    let staged = repo.staged_root()?;
    let working = repo.working_root()?;
    let missing = tables
        .iter()
        .filter(|name| !head.has_table(name) && !staged.has_table(name) && !working.has_table(name))
        .map(|name| name.to_string())
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(ResetError::TablesNotFound(missing));
    }
    repo.set_staged_root(&staged.with_tables_from(&head, tables))?;
    log::debug!("RESET STAGED: {}", tables.join(", "));
    Ok(())
}

/// The changes between staged and working worth reporting after a reset: new tables are left out.
pub fn unstaged_changes_after_reset(repo: &Repo) -> Result<Vec<TableDelta>, ResetError> {
    Ok(repo
        .status()?
        .unstaged
        .into_iter()
        .filter(|delta| delta.kind != DeltaKind::Added)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(hard: bool, soft: bool, args: &[&str]) -> ResetArgs {
        ResetArgs {
            hard,
            soft,
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn flag_preconditions() {
        assert!(matches!(
            args(true, true, &[]).validate(),
            Err(ResetError::MutuallyExclusiveFlags)
        ));
        assert!(matches!(
            args(true, false, &["HEAD", "t"]).validate(),
            Err(ResetError::TooManyArguments)
        ));
        assert!(args(true, false, &["HEAD~1"]).validate().is_ok());
        assert!(args(false, true, &["a", "b"]).validate().is_ok());
        assert_eq!(
            ResetError::MutuallyExclusiveFlags.to_string(),
            "--hard and --soft are mutually exclusive options."
        );
    }
}
