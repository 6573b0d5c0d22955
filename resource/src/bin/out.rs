//! `out` entrypoint: publishes a manifest built from the directory named on
//! the command line.

use clap::Parser;
use metalink_resource::cli::OutCli;
use metalink_resource::commands::{exit_code_for_run_result, init_logging, run_out};

fn main() {
    let cli = OutCli::parse();
    init_logging();
    let mut stderr = std::io::stderr();
    let result = run_out(
        &mut std::io::stdin().lock(),
        &mut std::io::stdout().lock(),
        cli.source_dir.as_std_path(),
    );
    let exit_code = exit_code_for_run_result(result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}
