use std::path::PathBuf;
use std::process::ExitCode;
use strata_cli::*;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let matches = get_command().get_matches();
    let repo_dir = matches
        .get_one::<PathBuf>("repo")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("."));
    let Some((cmd, args)) = matches.subcommand() else {
        return ExitCode::FAILURE;
    };
    match exec_subcommand(&repo_dir, cmd, args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}
