//! gesture_replay - run a scripted gesture sequence through ingestion and the
//! morph engine without a window.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use image::DynamicImage;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use morph_tree::config::MorphConfig;
use morph_tree::data::SessionRecorder;
use morph_tree::detector::{HandDetector, HandPose, SimulatedDetector};
use morph_tree::layout::Layout;
use morph_tree::mode::ModeChannel;
use morph_tree::morph::MorphEngine;
use morph_tree::tracking::{HandTracker, Liveness};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Comma-separated `pose:frames` steps. Poses: open, closed, ambiguous,
    /// none, two (open hand plus a second, closed hand).
    #[arg(long, default_value = "none:5,open:10,ambiguous:4,open:3,closed:12,none:6")]
    script: String,
    /// Ingestion rate of the replay.
    #[arg(long, default_value_t = 30)]
    fps: u32,
    /// Extra seconds of animation after the script ends.
    #[arg(long, default_value_t = 2.0)]
    settle: f32,
    /// Config file; falls back to MORPH_CONFIG, then defaults.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Export the session CSV and summary under this directory.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn parse_script(script: &str) -> Result<Vec<Vec<HandPose>>> {
    let mut frames = Vec::new();
    for step in script.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (pose, count) = step
            .split_once(':')
            .ok_or_else(|| anyhow!("step `{}` must look like pose:frames", step))?;
        let count: usize = count
            .trim()
            .parse()
            .with_context(|| format!("bad frame count in `{}`", step))?;
        let hands = match pose.trim() {
            "open" => vec![HandPose::open(0.5, 0.5)],
            "closed" => vec![HandPose::closed(0.5, 0.5)],
            "ambiguous" => vec![HandPose::with_fingers(0.5, 0.5, 2)],
            "none" => Vec::new(),
            "two" => vec![HandPose::open(0.35, 0.5), HandPose::closed(0.65, 0.5)],
            other => return Err(anyhow!("unknown pose `{}`", other)),
        };
        frames.extend(std::iter::repeat(hands).take(count));
    }
    Ok(frames)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => MorphConfig::load_from(path),
        None => MorphConfig::load(),
    }
    .context("loading configuration")?;
    if args.fps == 0 {
        return Err(anyhow!("--fps must be positive"));
    }

    let script = parse_script(&args.script)?;
    let frame_count = script.len();
    info!(frames = frame_count, fps = args.fps, "replaying gesture script");

    let initial = config.tracking.initial_mode;
    let channel = ModeChannel::new(initial);
    let mut tracker = HandTracker::new(config.gesture.clone(), &config.tracking, channel.clone(), Liveness::new());
    let detector = SimulatedDetector::scripted(script);
    tracker.initialize(move || Ok(Box::new(detector) as Box<dyn HandDetector>));

    let layout = Layout::build(&config.layout).context("building layouts")?;
    let mut engine = MorphEngine::new(layout, config.animation.clone(), initial);
    let mut recorder = SessionRecorder::new(args.out.clone().unwrap_or_default(), None);

    let dt = 1.0 / args.fps as f32;
    let frame = DynamicImage::new_rgb8(1, 1);
    for i in 0..frame_count {
        let Some(report) = tracker.process(&frame) else {
            break;
        };
        engine.update(dt, &channel.snapshot());
        if let Some(t) = report.transition {
            info!(frame = i, from = %t.from, to = %t.to, "mode committed");
        }
        recorder.record(&report, i as f64 * dt as f64, Some(&engine));
    }

    let settle_frames = (args.settle.max(0.0) * args.fps as f32).round() as usize;
    for _ in 0..settle_frames {
        engine.update(dt, &channel.snapshot());
    }
    tracker.shutdown();

    println!("Final mode:     {}", channel.mode());
    println!("Progress:       {:.3}", engine.overall_progress());
    println!("{}", recorder.summary());

    if args.out.is_some() {
        let csv = recorder.export_csv()?;
        let summary = recorder.write_summary()?;
        println!("CSV:            {}", csv.display());
        println!("Summary:        {}", summary.display());
    }
    Ok(())
}
