use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::{error, info};

use portrait_framing::batch::{run_analysis, run_composites, AnalyzeOptions, BatchReport};
use portrait_framing::overlay::find_legend_font;
use portrait_framing::pose_estimation::model_yolo_pose::YoloPoseModel;
use portrait_framing::{NoPoseModel, PipelineConfig, PoseEstimationModel};

#[derive(Parser)]
#[command(name = "portrait-framing", version, about = "Frame and composite character portraits")]
struct Cli {
    /// Root directory holding one directory per stack
    #[arg(long, global = true)]
    disciplines_dir: Option<PathBuf>,

    /// YAML pipeline configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compute crops for each discipline image and merge them into its metadata
    Analyze {
        /// Only stacks whose name starts with this prefix
        stack: Option<String>,
        /// Only this discipline index
        discipline: Option<u32>,
        #[arg(long)]
        dry_run: bool,
        /// Skip pose estimation and use fallback framing everywhere
        #[arg(long)]
        no_detect: bool,
        /// ONNX pose model
        #[arg(long)]
        model: Option<PathBuf>,
    },
    /// Build the aligned filmstrip composite of each stack
    Compose {
        /// Only stacks whose name starts with one of these prefixes
        stacks: Vec<String>,
        #[arg(long)]
        dry_run: bool,
    },
}

fn load_config(cli: &Cli) -> portrait_framing::Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = &cli.disciplines_dir {
        config.disciplines_dir = dir.clone();
    }
    Ok(config)
}

fn finish(report: BatchReport) -> ExitCode {
    println!("{}", report);
    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("failed to load config: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Command::Analyze {
            stack,
            discipline,
            dry_run,
            no_detect,
            model,
        } => {
            if let Some(path) = model {
                config.model.path = path;
            }

            let model: Box<dyn PoseEstimationModel> = if no_detect {
                Box::new(NoPoseModel)
            } else {
                match YoloPoseModel::from_config(&config.model) {
                    Ok(model) => Box::new(model),
                    Err(e) => {
                        error!("failed to load pose model {}: {}", config.model.path.display(), e);
                        return ExitCode::FAILURE;
                    }
                }
            };
            info!("pose model: {}", model.name());

            let font = find_legend_font(config.legend_font.as_deref());
            let options = AnalyzeOptions {
                stack_prefix: stack,
                discipline,
                dry_run,
            };
            finish(run_analysis(&config, model.as_ref(), font.as_ref(), &options))
        }
        Command::Compose { stacks, dry_run } => finish(run_composites(&config, &stacks, dry_run)),
    }
}
