//! `check` entrypoint: reads a request on stdin and prints versions on
//! stdout.

use clap::Parser;
use metalink_resource::cli::CheckCli;
use metalink_resource::commands::{exit_code_for_run_result, init_logging, run_check};

fn main() {
    let CheckCli {} = CheckCli::parse();
    init_logging();
    let mut stderr = std::io::stderr();
    let result = run_check(&mut std::io::stdin().lock(), &mut std::io::stdout().lock());
    let exit_code = exit_code_for_run_result(result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}
