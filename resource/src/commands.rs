//! Request/response plumbing for the three commands.
//!
//! Each runner decodes its request from `input`, performs the operation and
//! encodes the response onto `output`. Diagnostics that are not part of the
//! response, such as verification results, go to `diagnostics`.

use std::io::{Read, Write};
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::check::check;
use crate::download::fetch;
use crate::error::Result;
use crate::publish::publish;
use crate::request::{CheckRequest, InRequest, OutRequest};

/// Run `check`, writing the list of versions.
///
/// # Errors
///
/// Returns [`crate::error::ResourceError::Request`] for an undecodable
/// request and any error from [`check`].
pub fn run_check(input: &mut dyn Read, output: &mut dyn Write) -> Result<()> {
    let request: CheckRequest = decode(input)?;
    let versions = check(&request)?;
    encode(output, &versions)
}

/// Run `in`, downloading into `destination`.
///
/// # Errors
///
/// Returns [`crate::error::ResourceError::Request`] for an undecodable
/// request and any error from [`fetch`].
pub fn run_in(
    input: &mut dyn Read,
    output: &mut dyn Write,
    diagnostics: &mut dyn Write,
    destination: &Path,
) -> Result<()> {
    let request: InRequest = decode(input)?;
    let destination = std::path::absolute(destination)?;
    let response = fetch(&request, &destination, diagnostics)?;
    encode(output, &response)
}

/// Run `out`, resolving request paths against `source_dir`.
///
/// # Errors
///
/// Returns [`crate::error::ResourceError::Request`] for an undecodable
/// request and any error from [`publish`].
pub fn run_out(input: &mut dyn Read, output: &mut dyn Write, source_dir: &Path) -> Result<()> {
    let request: OutRequest = decode(input)?;
    let response = publish(&request, source_dir)?;
    encode(output, &response)
}

fn decode<T: DeserializeOwned>(input: &mut dyn Read) -> Result<T> {
    Ok(serde_json::from_reader(input)?)
}

fn encode<T: Serialize>(output: &mut dyn Write, value: &T) -> Result<()> {
    serde_json::to_writer(&mut *output, value)?;
    writeln!(output)?;
    Ok(())
}

/// Print `result`'s failure as `<category>: <message>` and map it to an exit
/// status.
pub fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, format_args!("{}: {err}", err.category()));
            1
        }
    }
}

fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort; nothing else can report the failure.
    }
}

/// Install the stderr logger used by the binaries.
///
/// The level defaults to `info` and honours `RUST_LOG`.
pub fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("info");
    if env_logger::Builder::from_env(env)
        .target(env_logger::Target::Stderr)
        .try_init()
        .is_err()
    {
        // Already initialised.
    }
}
