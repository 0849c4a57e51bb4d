use clap::{ArgMatches, Command};
use itertools::Itertools;
use std::path::Path;
use strata_datastore::{Repo, TableDelta};

pub fn cli() -> Command {
    Command::new("status").about("Show the staged and unstaged table changes")
}

fn deltas(deltas: &[TableDelta]) -> String {
    deltas
        .iter()
        .map(|delta| format!("\t{}:\t{}", delta.kind, delta.name))
        .join("\n")
}

pub fn exec(repo_dir: &Path, _args: &ArgMatches) -> anyhow::Result<()> {
    let repo = Repo::open(repo_dir)?;
    let status = repo.status()?;
    println!("On branch {}", repo.head_branch());
    if status.is_clean() {
        println!("nothing to commit, working tree clean");
        return Ok(());
    }
    if !status.staged.is_empty() {
        println!("Changes to be committed:\n{}", deltas(&status.staged));
    }
    if !status.unstaged.is_empty() {
        println!("Changes not staged for commit:\n{}", deltas(&status.unstaged));
    }
    Ok(())
}
