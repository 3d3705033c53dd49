use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use media_pipe::config::EncodeConfig;

/// Encode every image of a folder, in file name order, into a video.
#[derive(Parser, Debug)]
#[command(name = "images-to-encode")]
struct Args {
    image_folder: PathBuf,
    output_video: PathBuf,
    /// JSON file with encode settings; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
    #[arg(long)]
    fps: Option<u32>,
    /// Encoder name; falls back to mpeg4 when not available
    #[arg(long)]
    codec: Option<String>,
}

fn load_config(args: &Args) -> anyhow::Result<EncodeConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("read {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))?
        }
        None => EncodeConfig::default(),
    };
    let settings = &mut config.settings;
    if let Some(width) = args.width {
        settings.width = width;
    }
    if let Some(height) = args.height {
        settings.height = height;
    }
    if let Some(fps) = args.fps {
        settings.fps = fps;
    }
    if let Some(codec) = &args.codec {
        settings.codec = codec.clone();
    }
    Ok(config)
}

fn main() -> ExitCode {
    let args: Args = media_tools::parse_args();
    media_tools::run(|| {
        let config = load_config(&args)?;
        log::debug!("settings: {}", serde_json::to_string(&config)?);
        let report =
            media_pipe::pipeline::images_to_encode(&args.image_folder, &args.output_video, &config)
                .with_context(|| format!("encode {}", args.image_folder.display()))?;
        println!(
            "{}: {} frames, {} packets ({})",
            report.output.display(),
            report.frames,
            report.packets,
            report.codec
        );
        for skipped in &report.skipped {
            println!("skipped {}", skipped.display());
        }
        Ok(())
    })
}
