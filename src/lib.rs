//! Shared plumbing for the command-line tools.

use std::process::ExitCode;

/// Installs `env_logger`. `RUST_LOG` wins when set; otherwise the tools and
/// the pipeline log at info and everything else at warn.
pub fn init_logging() {
    let mut builder = env_logger::Builder::from_default_env();
    if std::env::var_os(env_logger::DEFAULT_FILTER_ENV).is_none() {
        builder
            .filter_level(log::LevelFilter::Warn)
            .filter_module("media_pipe", log::LevelFilter::Info)
            .filter_module("media_tools", log::LevelFilter::Info);
    }
    builder.init();
}

/// Parses the command line, exiting with 1 on usage errors and 0 after
/// printing help or version.
pub fn parse_args<T: clap::Parser>() -> T {
    match T::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let mut code = usage_exit_code(&e);
            if let Err(io) = e.print() {
                eprintln!("error: could not print usage: {}", io);
                // help or version that never reached the terminal is a failure
                code = 1;
            }
            std::process::exit(code);
        }
    }
}

/// 1 for real usage errors, 0 for `--help` and `--version`.
fn usage_exit_code(e: &clap::Error) -> i32 {
    if e.use_stderr() { 1 } else { 0 }
}

/// Runs a tool body after logging and FFmpeg are set up; any error is
/// reported and turned into exit code 1.
pub fn run<F>(body: F) -> ExitCode
where
    F: FnOnce() -> anyhow::Result<()>,
{
    init_logging();
    let result = media_pipe::init()
        .map_err(anyhow::Error::from)
        .and_then(|_| body());
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser, Debug)]
    #[command(name = "tool", version)]
    struct Args {
        input: String,
    }

    #[test]
    fn test_usage_exit_codes() {
        let missing = Args::try_parse_from(["tool"]).unwrap_err();
        assert_eq!(usage_exit_code(&missing), 1);
        let unknown = Args::try_parse_from(["tool", "a", "--bogus"]).unwrap_err();
        assert_eq!(usage_exit_code(&unknown), 1);

        let help = Args::try_parse_from(["tool", "--help"]).unwrap_err();
        assert_eq!(usage_exit_code(&help), 0);
        let version = Args::try_parse_from(["tool", "--version"]).unwrap_err();
        assert_eq!(usage_exit_code(&version), 0);
    }

    #[test]
    fn test_parse_ok() {
        let args = Args::try_parse_from(["tool", "clip.mkv"]).unwrap();
        assert_eq!(args.input, "clip.mkv");
    }
}
