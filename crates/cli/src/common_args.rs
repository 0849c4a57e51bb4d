use clap::{value_parser, Arg};
use std::path::PathBuf;

pub fn repo() -> Arg {
    Arg::new("repo")
        .long("repo")
        .global(true)
        .value_name("DIR")
        .value_parser(value_parser!(PathBuf))
        .default_value(".")
        .help("The directory holding the repository")
}
