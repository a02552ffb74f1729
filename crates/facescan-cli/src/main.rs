use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use facescan_core::io::{annotated_path, load_image, save_image};
use facescan_core::{
    detect_faces, detect_smiles, CascadeSource, ClaheParams, Classifier, DetectorConfig,
    FaceDetectionConfig, FacePipeline, GroupingParams, Rect, RegionHits, ScanParams,
    SmileDetectionConfig,
};
use facescan_hw::Camera;
use image::RgbImage;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod config;
mod display;
mod live;
mod signal;

use config::{Backend, Config};

#[derive(Parser)]
#[command(name = "facescan", about = "Cascade face and smile detection", version)]
struct Cli {
    /// Cascade backend [env: FACESCAN_BACKEND]
    #[arg(long, global = true, value_enum)]
    backend: Option<Backend>,
    /// Directory holding cascade model files [env: FACESCAN_MODEL_DIR]
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ScanArgs {
    /// Cascade to run; repeat to combine several (default, alt2, alt-tree, seeta, or a file)
    #[arg(long = "cascade")]
    cascades: Vec<String>,
    /// Step between scan scales
    #[arg(long)]
    scale_factor: Option<f64>,
    /// Raw hits required per candidate
    #[arg(long)]
    min_neighbors: Option<u32>,
    /// Smallest face side in pixels
    #[arg(long)]
    min_size: Option<u32>,
}

#[derive(Args)]
struct OutputArgs {
    /// Where to write the annotated image (default: <input>_annotated.png)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Print detections as JSON instead of a count line
    #[arg(long)]
    json: bool,
    /// Open a window with the result (opencv builds)
    #[arg(long)]
    show: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect faces in an image with merged multi-cascade detection
    Faces {
        image: PathBuf,
        #[command(flatten)]
        scan: ScanArgs,
        /// CLAHE clip limit (0 disables clipping)
        #[arg(long, default_value_t = 3.0)]
        clahe_clip: f32,
        /// CLAHE tiles per side
        #[arg(long, default_value_t = 8)]
        clahe_grid: u32,
        /// Skip CLAHE and detect on plain grayscale
        #[arg(long)]
        no_clahe: bool,
        /// Minimum extra hits a group needs to be kept
        #[arg(long, default_value_t = 2)]
        group_threshold: u32,
        /// Relative tolerance for merging rectangles
        #[arg(long, default_value_t = 0.2)]
        eps: f64,
        /// Drop groups nested inside better supported groups
        #[arg(long)]
        suppress_nested: bool,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// Detect smiles in the lower half of every detected face
    Smiles {
        image: PathBuf,
        /// Fraction of the face height skipped before searching
        #[arg(long, default_value_t = 0.5)]
        offset: f64,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// Real-time face detection on a webcam
    Live {
        /// Camera index, /dev/video<N> [env: FACESCAN_CAMERA_INDEX]
        #[arg(long)]
        camera: Option<u32>,
        #[command(flatten)]
        scan: ScanArgs,
        /// Overwrite this image with each annotated frame
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Stop after this many frames
        #[arg(long)]
        max_frames: Option<u64>,
    },
    /// List V4L2 capture devices
    Devices,
}

#[derive(Serialize)]
struct FacesReport<'a> {
    faces: &'a [Rect],
}

#[derive(Serialize)]
struct SmilesReport<'a> {
    faces: &'a [Rect],
    smiles: Vec<SmileReport<'a>>,
    total: usize,
}

#[derive(Serialize)]
struct SmileReport<'a> {
    face: usize,
    region: Option<Rect>,
    local: &'a [Rect],
    image: Vec<Rect>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(dir) = cli.model_dir {
        config.model_dir = dir;
    }

    match cli.command {
        Commands::Faces {
            image,
            scan,
            clahe_clip,
            clahe_grid,
            no_clahe,
            group_threshold,
            eps,
            suppress_nested,
            out,
        } => {
            let defaults = ScanParams::new(1.05, 3, (40, 40));
            let face_config = FaceDetectionConfig {
                cascades: cascade_configs(&scan, &config, defaults, true),
                clahe: (!no_clahe).then_some(ClaheParams {
                    clip_limit: clahe_clip,
                    grid: (clahe_grid, clahe_grid),
                }),
                grouping: Some(GroupingParams {
                    group_threshold,
                    eps,
                    suppress_nested,
                }),
                ..FaceDetectionConfig::default()
            };
            run_faces(&config, &image, &face_config, &out)
        }
        Commands::Smiles { image, offset, out } => {
            let smile_config = SmileDetectionConfig {
                vertical_offset_fraction: offset,
                ..SmileDetectionConfig::default()
            };
            run_smiles(&config, &image, &smile_config, &out)
        }
        Commands::Live {
            camera,
            scan,
            output,
            max_frames,
        } => {
            let live = FaceDetectionConfig::live();
            let defaults = live.cascades[0].params;
            let face_config = FaceDetectionConfig {
                cascades: cascade_configs(&scan, &config, defaults, false),
                ..live
            };
            let index = camera.unwrap_or(config.camera_index);
            run_live(&config, index, face_config, output, max_frames)
        }
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No capture devices found");
            }
            for dev in devices {
                println!("{}\t{} ({}, {})", dev.path, dev.name, dev.driver, dev.bus);
            }
            Ok(())
        }
    }
}

/// Build detector passes from CLI flags, falling back to the backend's defaults.
fn cascade_configs(
    scan: &ScanArgs,
    config: &Config,
    defaults: ScanParams,
    all_faces: bool,
) -> Vec<DetectorConfig> {
    let params = ScanParams {
        scale_factor: scan.scale_factor.unwrap_or(defaults.scale_factor),
        min_neighbors: scan.min_neighbors.unwrap_or(defaults.min_neighbors),
        min_size: scan.min_size.map(|s| (s, s)).unwrap_or(defaults.min_size),
    };

    let classifiers: Vec<Classifier> = if !scan.cascades.is_empty() {
        scan.cascades.iter().map(|name| Classifier::parse(name)).collect()
    } else if all_faces && config.backend == Backend::Opencv {
        vec![
            Classifier::FrontalFaceDefault,
            Classifier::FrontalFaceAlt2,
            Classifier::FrontalFaceAltTree,
        ]
    } else {
        vec![config.backend.face_classifier()]
    };

    classifiers
        .into_iter()
        .map(|classifier| DetectorConfig::new(classifier, params))
        .collect()
}

fn open_source(config: &Config) -> Result<Box<dyn CascadeSource>> {
    tracing::info!(
        backend = ?config.backend,
        model_dir = %config.model_dir.display(),
        "cascade source"
    );
    config.backend.source(&config.model_dir)
}

fn run_faces(
    config: &Config,
    path: &Path,
    face_config: &FaceDetectionConfig,
    out: &OutputArgs,
) -> Result<()> {
    let image = load_image(path)?;
    let source = open_source(config)?;
    let result =
        detect_faces(source.as_ref(), &image, face_config).context("face detection failed")?;

    let title = format!("Faces detected: {}", result.faces.len());
    if out.json {
        println!("{}", serde_json::to_string_pretty(&FacesReport { faces: &result.faces })?);
    } else {
        println!("{title}");
    }
    finish_output(path, &result.annotated, &title, out)
}

fn run_smiles(
    config: &Config,
    path: &Path,
    smile_config: &SmileDetectionConfig,
    out: &OutputArgs,
) -> Result<()> {
    // The smile model only exists as a Haar cascade.
    if config.backend != Backend::Opencv {
        bail!("smiles needs the `opencv` backend (current: {:?})", config.backend);
    }
    let image = load_image(path)?;
    let source = open_source(config)?;
    let result =
        detect_smiles(source.as_ref(), &image, smile_config).context("smile detection failed")?;

    let total = result.total_smiles();
    let title = format!("Smiles detected: {total}");
    if out.json {
        let report = SmilesReport {
            faces: &result.faces,
            smiles: result.smiles.iter().map(smile_report).collect(),
            total,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{title}");
    }
    finish_output(path, &result.annotated, &title, out)
}

fn smile_report(hits: &RegionHits) -> SmileReport<'_> {
    SmileReport {
        face: hits.outer_index,
        region: hits.region,
        local: &hits.hits,
        image: hits.to_image_coords(),
    }
}

fn finish_output(input: &Path, annotated: &RgbImage, title: &str, out: &OutputArgs) -> Result<()> {
    let target = out.output.clone().unwrap_or_else(|| annotated_path(input));
    save_image(annotated, &target)?;
    tracing::info!(path = %target.display(), "annotated image written");

    if out.show {
        display::show_image(title, annotated)?;
    }
    Ok(())
}

fn run_live(
    config: &Config,
    index: u32,
    face_config: FaceDetectionConfig,
    output: Option<PathBuf>,
    max_frames: Option<u64>,
) -> Result<()> {
    let source = open_source(config)?;
    let mut pipeline = FacePipeline::new(source.as_ref(), face_config)?;

    let camera = Camera::open_index(index, config.frame_width, config.frame_height)
        .with_context(|| format!("cannot open webcam {index}"))?;
    tracing::info!(
        device = %camera.device_path,
        format = ?camera.pixel_format(),
        width = camera.width,
        height = camera.height,
        "capturing"
    );
    let mut sink = display::live_sink(output)?;
    signal::install_interrupt_handler().context("installing SIGINT handler")?;

    println!("Starting real-time face detection. Press 'q' or Ctrl-C to quit.");

    let frames = live::run_loop(
        camera.stream()?,
        &mut pipeline,
        sink.as_mut(),
        max_frames,
        signal::interrupted,
    )?;
    tracing::info!(frames, "live detection stopped");
    Ok(())
}
