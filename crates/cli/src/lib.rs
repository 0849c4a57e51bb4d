mod common_args;
mod errors;
mod subcommands;

use clap::{ArgMatches, Command};
use std::path::Path;

pub use errors::{report, CliError};
pub use subcommands::*;

pub fn get_command() -> Command {
    Command::new("strata")
        .about("A versioned, content-addressed table store")
        .subcommand_required(true)
        .arg(common_args::repo())
        .subcommands(get_subcommands())
        .help_expected(true)
}

pub fn get_subcommands() -> Vec<Command> {
    vec![
        init::cli(),
        add::cli(),
        commit::cli(),
        status::cli(),
        commit_log::cli(),
        reset::cli(),
    ]
}

pub fn exec_subcommand(repo_dir: &Path, cmd: &str, args: &ArgMatches) -> anyhow::Result<()> {
    match cmd {
        "init" => init::exec(repo_dir, args),
        "add" => add::exec(repo_dir, args),
        "commit" => commit::exec(repo_dir, args),
        "status" => status::exec(repo_dir, args),
        "log" => commit_log::exec(repo_dir, args),
        "reset" => reset::exec(repo_dir, args),
        unknown => Err(anyhow::anyhow!("Invalid subcommand: {}", unknown)),
    }
}
