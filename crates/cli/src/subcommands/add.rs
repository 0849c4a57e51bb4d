use clap::{Arg, ArgMatches, Command};
use std::path::Path;
use strata_datastore::Repo;

pub fn cli() -> Command {
    Command::new("add").about("Add table changes to the list of staged table changes").arg(
        Arg::new("tables")
            .num_args(1..)
            .required(true)
            .value_name("TABLE")
            .help("The tables to stage, or `.` for every table"),
    )
}

pub fn exec(repo_dir: &Path, args: &ArgMatches) -> anyhow::Result<()> {
    let tables = args.get_many::<String>("tables").unwrap_or_default().map(String::as_str).collect::<Vec<_>>();
    let mut repo = Repo::open(repo_dir)?;
    if tables.contains(&".") {
        repo.stage_all()?;
    } else {
        repo.stage_tables(&tables)?;
    }
    Ok(())
}
