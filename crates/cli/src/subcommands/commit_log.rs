use clap::{Arg, ArgMatches, Command};
use std::path::Path;
use strata_datastore::Repo;

pub fn cli() -> Command {
    Command::new("log").about("Show the commit history").arg(
        Arg::new("revision")
            .default_value("HEAD")
            .help("The commit to start from"),
    )
}

pub fn exec(repo_dir: &Path, args: &ArgMatches) -> anyhow::Result<()> {
    let rev = args.get_one::<String>("revision").map_or("HEAD", String::as_str);
    let repo = Repo::open(repo_dir)?;
    for (hash, commit) in repo.log(repo.resolve_revision(rev)?)? {
        let meta = &commit.meta;
        println!("commit {hash}");
        println!("Author: {} <{}>", meta.name, meta.email);
        if let Some(time) = meta.time() {
            println!("Date:   {}", time.to_rfc2822());
        }
        println!("\n\t{}\n", meta.message);
    }
    Ok(())
}
