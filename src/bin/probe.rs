use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

/// Print container and stream metadata of a media file.
#[derive(Parser, Debug)]
#[command(name = "probe")]
struct Args {
    input: PathBuf,
    /// Print JSON instead of the text summary
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let args: Args = media_tools::parse_args();
    media_tools::run(|| {
        let info = media_pipe::probe(&args.input)
            .with_context(|| format!("probe {}", args.input.display()))?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&info)?);
        } else {
            print!("{}", info);
        }
        Ok(())
    })
}
