use std::ffi::CStr;
use std::process::ExitCode;

use clap::Parser;

/// Print the versions of the FFmpeg libraries this build links against.
#[derive(Parser, Debug)]
#[command(name = "ffmpeg-version")]
struct Args {
    /// Also print FFmpeg's configure line
    #[arg(long)]
    configuration: bool,
}

fn split(version: u32) -> String {
    format!("{}.{}.{}", version >> 16, (version >> 8) & 0xff, version & 0xff)
}

fn main() -> ExitCode {
    let args: Args = media_tools::parse_args();
    media_tools::run(|| {
        let (format, codec, util, info, configuration) = unsafe {
            (
                ffmpeg_sys_next::avformat_version(),
                ffmpeg_sys_next::avcodec_version(),
                ffmpeg_sys_next::avutil_version(),
                CStr::from_ptr(ffmpeg_sys_next::av_version_info()).to_string_lossy(),
                CStr::from_ptr(ffmpeg_sys_next::avformat_configuration()).to_string_lossy(),
            )
        };
        println!("ffmpeg {}", info);
        println!("libavformat {}", split(format));
        println!("libavcodec {}", split(codec));
        println!("libavutil {}", split(util));
        if args.configuration {
            println!("configuration: {}", configuration);
        }
        Ok(())
    })
}
