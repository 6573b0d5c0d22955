//! `in` entrypoint: downloads the requested version into the directory named
//! on the command line.

use clap::Parser;
use metalink_resource::cli::InCli;
use metalink_resource::commands::{exit_code_for_run_result, init_logging, run_in};

fn main() {
    let cli = InCli::parse();
    init_logging();
    let mut stderr = std::io::stderr();
    let result = run_in(
        &mut std::io::stdin().lock(),
        &mut std::io::stdout().lock(),
        &mut std::io::stderr(),
        cli.destination.as_std_path(),
    );
    let exit_code = exit_code_for_run_result(result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}
