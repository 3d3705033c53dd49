use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use media_pipe::config::{InterleaveMode, RemuxConfig};

/// Copy the video streams of one file and the audio streams of another
/// into a new container, without re-encoding.
#[derive(Parser, Debug)]
#[command(name = "remux")]
struct Args {
    /// File providing the video
    video_input: PathBuf,
    /// File providing the audio
    audio_input: PathBuf,
    output: PathBuf,
    /// sequential: all video then all audio; timestamp: merge by dts
    #[arg(long, default_value_t = InterleaveMode::Sequential)]
    interleave: InterleaveMode,
    /// Muxer name, e.g. "matroska"; guessed from the extension by default
    #[arg(long)]
    format: Option<String>,
}

fn main() -> ExitCode {
    let args: Args = media_tools::parse_args();
    media_tools::run(|| {
        let config = RemuxConfig {
            interleave: args.interleave,
            format: args.format,
        };
        let report = media_pipe::pipeline::remux(
            &args.video_input,
            &args.audio_input,
            &args.output,
            &config,
        )
        .with_context(|| format!("remux into {}", args.output.display()))?;
        for (index, packets) in report.packets_written.iter().enumerate() {
            println!("stream {}: {} packets", index, packets);
        }
        println!("dropped: {} packets", report.packets_dropped);
        Ok(())
    })
}
