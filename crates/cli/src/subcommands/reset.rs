use crate::errors::CliError;
use clap::ArgAction::SetTrue;
use clap::{Arg, ArgMatches, Command};
use itertools::Itertools;
use std::path::Path;
use strata_datastore::reset::unstaged_changes_after_reset;
use strata_datastore::{reset, Repo, ResetArgs};

pub fn cli() -> Command {
    Command::new("reset")
        .about("Resets staged or working tables to HEAD or a specified commit")
        .long_about(
            "`strata reset <tables>...` resets the staged <tables> to their values at HEAD, \
             undoing `strata add <tables>`. It does not touch the working tables or the current branch.\n\n\
             `strata reset [--hard | --soft] <revision>` resets every table to the given revision. \
             --soft moves HEAD and the staged tables, keeping the working tables. \
             --hard also resets the working tables, discarding every uncommitted change.\n\n\
             `strata reset .` resets all staged tables to HEAD.",
        )
        .arg(
            Arg::new("hard")
                .long("hard")
                .action(SetTrue)
                .help("Reset the staged and working tables, discarding changes since the revision"),
        )
        .arg(
            Arg::new("soft")
                .long("soft")
                .action(SetTrue)
                .help("Reset HEAD and the staged tables, keeping the working tables"),
        )
        .arg(
            Arg::new("args")
                .num_args(0..)
                .value_name("REVISION_OR_TABLE")
                .help("A revision, or the tables to unstage"),
        )
}

pub fn exec(repo_dir: &Path, args: &ArgMatches) -> anyhow::Result<()> {
    let reset_args = ResetArgs {
        hard: args.get_flag("hard"),
        soft: args.get_flag("soft"),
        args: args.get_many::<String>("args").unwrap_or_default().cloned().collect(),
    };
    reset_args.validate().map_err(CliError::from)?;
    let mut repo = Repo::open(repo_dir)?;
    reset(&mut repo, &reset_args).map_err(CliError::from)?;
    print_unstaged(&repo);
    Ok(())
}

/// Lists what remains unstaged. Failing to do so does not fail the reset.
fn print_unstaged(repo: &Repo) {
    match unstaged_changes_after_reset(repo) {
        Ok(changes) if changes.is_empty() => {}
        Ok(changes) => {
            println!("Unstaged changes after reset:");
            println!(
                "{}",
                changes
                    .iter()
                    .map(|delta| format!("{}\t{}", delta.kind.code(), delta.name))
                    .join("\n")
            );
        }
        Err(e) => log::warn!("could not list unstaged changes: {e}"),
    }
}
