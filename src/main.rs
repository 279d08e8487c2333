use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cubemap_capture::host::RenderHost;
use cubemap_capture::host::synthetic::SyntheticHost;
use cubemap_capture::preview::{PreviewConfig, PreviewServer};
use cubemap_capture::{Algorithm, CaptureKind, CaptureRig, Stage, TICKS_PER_SECOND};

#[derive(Parser, Debug)]
#[command(name = "pano")]
#[command(about = "Periodic single-shot and cube-map panorama capture with live preview")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Run the capture pipeline against a procedural scene and serve live
    /// previews over HTTP
    Demo(DemoArgs),
}

#[derive(clap::Args, Debug)]
struct DemoArgs {
    /// How long to run: 30s, 2m, 1h, or raw seconds
    #[arg(short, long, default_value = "60s",
          help = "Run duration: 30s (seconds), 2m (minutes), 1h (hours)")]
    duration: String,

    /// Seconds between captures (both kinds)
    #[arg(short, long, default_value_t = 5.0,
          help = "Capture interval in seconds, minimum 0.1")]
    interval: f64,

    /// Panorama face resolution in pixels (faces are square)
    #[arg(short, long, default_value_t = 512)]
    resolution: u32,

    /// Downscale factor applied to panorama sheets (1 disables)
    #[arg(long, default_value_t = 1.0)]
    downscale: f64,

    /// Downscale stage: faces or cubemap
    #[arg(long, default_value = "cubemap")]
    stage: Stage,

    /// Downscale algorithm: nearest, bilinear, bicubic, box, supersample
    #[arg(long, default_value = "bicubic")]
    algorithm: Algorithm,

    /// Render all six faces back-to-back instead of spreading them
    #[arg(long)]
    precise: bool,

    /// Write each stitched sheet to the screenshots directory
    #[arg(long)]
    export: bool,

    /// Preview port for single-shot captures (0 = ephemeral)
    #[arg(long, default_value_t = 8090)]
    single_port: u16,

    /// Preview port for panorama captures (0 = ephemeral)
    #[arg(long, default_value_t = 8091)]
    panorama_port: u16,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let Cli {
        command: Command::Demo(args),
    } = Cli::parse();
    let seconds = parse_duration(&args.duration)?;
    if args.interval < cubemap_capture::config::MIN_INTERVAL_SECONDS {
        return Err(anyhow!(
            "interval must be at least {}s",
            cubemap_capture::config::MIN_INTERVAL_SECONDS
        ));
    }

    let mut host = SyntheticHost::new();
    let mut rig = CaptureRig::new();

    rig.panorama.set_resolution(&mut host, args.resolution);
    if args.downscale > 1.0 {
        rig.panorama
            .set_downscale(&mut host, args.downscale, Some(args.stage), Some(args.algorithm));
    }
    if args.precise {
        rig.panorama.set_mode(&mut host, true);
    }
    if args.export {
        rig.panorama.set_export(&mut host, true);
    }

    let single_preview = PreviewServer::start(
        &PreviewConfig {
            port: args.single_port,
            ..PreviewConfig::default()
        },
        CaptureKind::Single,
        rig.single_state(),
    )
    .context("starting single preview server")?;
    let panorama_preview = PreviewServer::start(
        &PreviewConfig {
            port: args.panorama_port,
            ..PreviewConfig::default()
        },
        CaptureKind::Panorama,
        rig.panorama_state(),
    )
    .context("starting panorama preview server")?;

    tracing::info!(url = %single_preview.url(), "single preview");
    tracing::info!(url = %panorama_preview.url(), "panorama preview");

    // One kind runs at a time: single shots for the first half of the run,
    // panorama cycles for the second.
    rig.start_single(&mut host, args.interval);
    let mut switched = false;

    let tick = Duration::from_secs_f64(1.0 / TICKS_PER_SECOND);
    let start = Instant::now();
    let deadline = start + Duration::from_secs(seconds);
    let halfway = start + Duration::from_secs(seconds / 2);
    while Instant::now() < deadline {
        let began = Instant::now();
        if !switched && began >= halfway {
            switched = true;
            rig.start_panorama(&mut host, args.interval);
        }
        rig.tick(&mut host);
        if let Some(rest) = tick.checked_sub(began.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    host.notify(&rig.single.status().describe());
    host.notify(&rig.panorama.status().describe());
    if switched {
        rig.stop_panorama(&mut host);
    } else {
        rig.stop_single(&mut host);
    }
    host.notify("Demo finished");
    Ok(())
}

/// Parse a duration like "30s", "2m", "1h", or bare seconds.
fn parse_duration(duration: &str) -> Result<u64> {
    if let Ok(seconds) = duration.parse::<u64>() {
        return Ok(seconds);
    }
    let len = duration.len();
    if len < 2 {
        return Err(anyhow!("invalid duration: {}", duration));
    }
    let (num_str, unit) = duration.split_at(len - 1);
    let num: u64 = num_str
        .parse()
        .map_err(|_| anyhow!("invalid number in duration: {}", num_str))?;
    match unit {
        "s" => Ok(num),
        "m" => Ok(num * 60),
        "h" => Ok(num * 3600),
        _ => Err(anyhow!("invalid duration unit: {} (use s, m, or h)", unit)),
    }
}
