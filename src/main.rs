use clap::Parser;
use paisabuddy::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
