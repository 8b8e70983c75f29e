//! Replays recorded detections through the tracking pipeline.
//!
//! Input is JSON lines, one frame per line:
//! `{"timestamp": 0.04, "detections": [{"bbox": [x1, y1, x2, y2], "class": "car", "p": 0.91}]}`.
//! Every processed frame is printed back as a JSON line of tracked detections.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use log::{error, info, warn};
use serde_derive::{Deserialize, Serialize};

use speedtrap::{
    Capture, CaptureWriter, Detector, Error, FrameOutcome, NoPlateReader, NullRenderer, Pipeline,
    PipelineConfig, RawDetection, SpeedLimit, TrackedDetection,
};

#[derive(Parser, Debug)]
#[command(version, about = "Replay recorded detections through the speed pipeline")]
struct Args {
    /// JSON lines file with recorded frames, `-` for stdin.
    input: PathBuf,

    /// Pipeline configuration (JSON).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Speed limit overriding the configuration.
    #[arg(long, conflicts_with = "preset")]
    speed_limit: Option<f32>,

    /// Named speed limit.
    #[arg(long, value_enum)]
    preset: Option<Preset>,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
enum Preset {
    School,
    Residential,
    Carriageway,
    Motorway,
}

impl From<Preset> for SpeedLimit {
    fn from(p: Preset) -> Self {
        match p {
            Preset::School => SpeedLimit::SchoolZone,
            Preset::Residential => SpeedLimit::Residential,
            Preset::Carriageway => SpeedLimit::Carriageway,
            Preset::Motorway => SpeedLimit::Motorway,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
struct RecordedFrame {
    timestamp: f64,
    detections: Vec<RawDetection>,
}

#[derive(Serialize)]
struct FrameReport<'a> {
    timestamp: f64,
    tracks: &'a [TrackedDetection],
}

struct RecordedDetector;

impl Detector<RecordedFrame> for RecordedDetector {
    fn detect(&mut self, image: &RecordedFrame) -> Result<Vec<RawDetection>, Error> {
        Ok(image.detections.clone())
    }
}

/// Logs captures instead of writing images; recordings carry no pixels.
struct LogWriter;

impl CaptureWriter<RecordedFrame> for LogWriter {
    fn write(&mut self, capture: &Capture<'_, RecordedFrame>) -> Result<(), Error> {
        info!(
            "capture {} for track {} at {:.1} ({:?})",
            capture.file_name,
            capture.detection.track_id,
            capture.detection.speed.unwrap_or_default(),
            capture.detection.plate,
        );

        Ok(())
    }
}

fn open_input(path: &Path) -> Result<Box<dyn BufRead>, Error> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(std::io::BufReader::new(std::io::stdin())));
    }

    let file = std::fs::File::open(path)?;
    Ok(Box::new(std::io::BufReader::new(file)))
}

fn run(args: Args) -> Result<(), Error> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_path(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(limit) = args.speed_limit {
        config.capture.speed_limit = Some(limit);
    }
    if let Some(preset) = args.preset {
        config.capture.speed_limit = Some(SpeedLimit::from(preset).mph());
    }

    let mut pipeline = Pipeline::new(
        config,
        RecordedDetector,
        NoPlateReader,
        NullRenderer,
        LogWriter,
    );

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    for (lineno, line) in open_input(&args.input)?.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let frame: RecordedFrame = match serde_json::from_str(&line) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("line {}: wrong frame format: {}", lineno + 1, err);
                continue;
            }
        };

        let timestamp = frame.timestamp;
        if let FrameOutcome::Annotated { detections, .. } = pipeline.run_frame(frame, timestamp) {
            let report = FrameReport {
                timestamp,
                tracks: &detections,
            };

            serde_json::to_writer(&mut out, &report)?;
            writeln!(out)?;
        }
    }

    info!(
        "done: {} live tracks, {} pending offenders",
        pipeline.tracker().tracks().len(),
        pipeline.captures().len()
    );

    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run(Args::parse()) {
        error!("{}", err);
        std::process::exit(1);
    }
}
