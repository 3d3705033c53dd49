use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use media_pipe::{config::DecodeConfig, image::ImageFormat};

/// Decode the video stream of a file into one image per frame, named
/// <prefix>-<n>.<ext>.
#[derive(Parser, Debug)]
#[command(name = "decode-to-images")]
struct Args {
    input: PathBuf,
    output_prefix: String,
    /// pgm, ppm or jpeg
    #[arg(long, default_value_t = ImageFormat::Ppm)]
    format: ImageFormat,
    #[arg(long, requires = "height")]
    width: Option<u32>,
    #[arg(long, requires = "width")]
    height: Option<u32>,
    /// Decoder implementation to use for the stream's codec
    #[arg(long)]
    decoder: Option<String>,
}

fn main() -> ExitCode {
    let args: Args = media_tools::parse_args();
    media_tools::run(|| {
        let config = DecodeConfig {
            image_format: args.format,
            width: args.width,
            height: args.height,
            decoder: args.decoder,
            ..Default::default()
        };
        let report = media_pipe::pipeline::decode_to_images(&args.input, &args.output_prefix, &config)
            .with_context(|| format!("decode {}", args.input.display()))?;
        println!(
            "{} frames written as {}x{} {}",
            report.frames(),
            report.width,
            report.height,
            config.image_format
        );
        Ok(())
    })
}
