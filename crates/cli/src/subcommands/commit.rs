use clap::{Arg, ArgMatches, Command};
use std::path::Path;
use strata_datastore::Repo;

pub fn cli() -> Command {
    Command::new("commit").about("Record the staged tables as a new commit").arg(
        Arg::new("message")
            .long("message")
            .short('m')
            .required(true)
            .help("The commit message"),
    )
}

pub fn exec(repo_dir: &Path, args: &ArgMatches) -> anyhow::Result<()> {
    let message = args.get_one::<String>("message").map_or("", String::as_str);
    let mut repo = Repo::open(repo_dir)?;
    let hash = repo.commit(message)?;
    println!("[{} {}] {message}", repo.head_branch(), hash.abbreviate());
    Ok(())
}
