use clap::{ArgMatches, Command};
use std::path::Path;
use strata_datastore::Repo;

pub fn cli() -> Command {
    Command::new("init").about("Create an empty strata repository")
}

pub fn exec(repo_dir: &Path, _args: &ArgMatches) -> anyhow::Result<()> {
    let repo = Repo::init(repo_dir)?;
    println!(
        "Successfully initialized strata data repository on branch {}.",
        repo.head_branch()
    );
    Ok(())
}
