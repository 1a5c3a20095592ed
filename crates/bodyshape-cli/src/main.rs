mod config;
mod report;

use anyhow::{Context, Result};
use bodyshape_core::provider::ProviderError;
use bodyshape_core::{
    Advisor, Analysis, AnalysisError, Analyzer, BodyType, Classifier, LandmarkProvider,
    MeasurementExtractor, PoseLandmarker, Ratios, RecommendationTable, RecordedLandmarks,
};
use clap::{Args, Parser, Subcommand};
use config::Config;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

/// Exit status when the photo was readable but no body could be measured.
const EXIT_NO_POSE: u8 = 2;

#[derive(Parser)]
#[command(name = "bodyshape", version, about = "Estimate body shape from a photo")]
struct Cli {
    /// Config file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a full-body photo
    Analyze(AnalyzeArgs),
    /// Classify body proportions given directly as ratios
    Classify {
        #[arg(long)]
        shoulder_to_hip: f32,
        #[arg(long)]
        waist_to_shoulder: f32,
        #[arg(long)]
        waist_to_hip: f32,
        #[arg(long)]
        json: bool,
    },
    /// Show style recommendations for a body type
    Recommend {
        /// rectangle, hourglass, inverted_triangle, pear or apple
        body_type: BodyType,
        #[arg(long)]
        json: bool,
    },
    /// Show format and size of a photo
    Info {
        image: PathBuf,
    },
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Path to a JPEG or PNG photo
    image: PathBuf,
    /// Print the result as JSON
    #[arg(long)]
    json: bool,
    /// Write the report to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Also save the JSON result in the working directory
    #[arg(long)]
    save: bool,
    /// Replay landmarks from a JSON file instead of running the pose model
    #[arg(long)]
    landmarks: Option<PathBuf>,
    /// Pose model path (overrides config)
    #[arg(long)]
    model: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let fallback = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback)),
        )
        .with_writer(std::io::stderr)
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(cli));
    // A timed-out inference may still occupy a blocking thread.
    runtime.shutdown_background();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            if let Some(analysis) = err.downcast_ref::<AnalysisError>() {
                eprintln!("{}", analysis.guidance());
            }
            ExitCode::from(exit_status(&err))
        }
    }
}

/// Process exit status for a failed command.
fn exit_status(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<AnalysisError>() {
        Some(analysis) if analysis.is_no_pose() => EXIT_NO_POSE,
        _ => 1,
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyze(args) => analyze(&config, &args, Path::new("")).await,
        Commands::Classify {
            shoulder_to_hip,
            waist_to_shoulder,
            waist_to_hip,
            json,
        } => {
            let classifier = Classifier::new(config.thresholds)?;
            let result =
                classifier.classify(Ratios::new(shoulder_to_hip, waist_to_shoulder, waist_to_hip))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print!("{}", report::classification(&result));
            }
            Ok(())
        }
        Commands::Recommend { body_type, json } => {
            let table = recommendation_table(&config)?;
            let record = table.get(body_type);
            if json {
                let value = serde_json::json!({
                    "body_type": body_type,
                    "display_name": body_type.display_name(),
                    "recommendations": record,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                print!("{}", report::recommendations(body_type, record));
            }
            Ok(())
        }
        Commands::Info { image } => {
            let info = bodyshape_core::photo::inspect(&image).map_err(AnalysisError::from)?;
            print!("{}", report::image_info(&image.display().to_string(), &info));
            Ok(())
        }
    }
}

/// Analyze one photo and write the report. With `--save` the JSON result
/// goes to `save_dir`.
async fn analyze(config: &Config, args: &AnalyzeArgs, save_dir: &Path) -> Result<()> {
    let analysis = run_analysis(config, args).await?;

    let json_report = serde_json::to_string_pretty(&analysis)?;
    let rendered = if args.json {
        format!("{json_report}\n")
    } else {
        report::analysis(&args.image.display().to_string(), &analysis)
    };

    match &args.output {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Report written to {}", path.display());
        }
        None => print!("{rendered}"),
    }

    if args.save {
        let path = save_dir.join(saved_result_name(&args.image));
        std::fs::write(&path, format!("{json_report}\n"))
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Result saved to {}", path.display());
    }

    Ok(())
}

/// Build the pipeline and run it off the async executor, bounded by the
/// configured timeout.
async fn run_analysis(config: &Config, args: &AnalyzeArgs) -> Result<Analysis> {
    let table = recommendation_table(config)?;
    let classifier = Classifier::new(config.thresholds)?;
    let extractor = MeasurementExtractor::new(config.min_visibility)?;

    let provider: Box<dyn LandmarkProvider + Send> = match &args.landmarks {
        Some(path) => Box::new(
            RecordedLandmarks::from_json_file(path).map_err(AnalysisError::provider_unavailable)?,
        ),
        None => {
            let model_path = args.model.as_ref().unwrap_or(&config.model_path);
            Box::new(
                PoseLandmarker::load(model_path, config.pose)
                    .map_err(AnalysisError::provider_unavailable)?,
            )
        }
    };

    let mut analyzer = Analyzer::new(provider, extractor, classifier, Advisor::new(table))
        .with_max_dimension(config.max_dimension);

    tracing::info!(image = %args.image.display(), "analyzing photo");
    let path = args.image.clone();
    let task = tokio::task::spawn_blocking(move || analyzer.analyze_path(&path));
    let analysis = if config.inference_timeout_secs > 0 {
        let limit = Duration::from_secs(config.inference_timeout_secs);
        match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined.context("analysis task failed")??,
            Err(_) => {
                return Err(AnalysisError::Inference(ProviderError::InferenceFailed(format!(
                    "timed out after {}s",
                    config.inference_timeout_secs
                )))
                .into())
            }
        }
    } else {
        task.await.context("analysis task failed")??
    };

    Ok(analysis)
}

fn recommendation_table(config: &Config) -> Result<RecommendationTable> {
    let table = match &config.recommendations {
        Some(path) => RecommendationTable::load(path)?,
        None => RecommendationTable::builtin()?,
    };
    Ok(table)
}

/// `photos/me.jpg` saves to `analysis_result_me.jpg.json`.
fn saved_result_name(image: &Path) -> String {
    let name = image
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "photo".to_string());
    format!("analysis_result_{name}.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    /// Landmarks of a figure with shoulders 1.75 times the hip width.
    const BROAD_SHOULDERS: &str = r#"[
        {"name": "nose", "x": 0.5, "y": 0.1, "visibility": 0.99},
        {"name": "left_shoulder", "x": 0.675, "y": 0.25, "visibility": 0.9},
        {"name": "right_shoulder", "x": 0.325, "y": 0.25, "visibility": 0.9},
        {"name": "left_hip", "x": 0.6, "y": 0.55, "visibility": 0.9},
        {"name": "right_hip", "x": 0.4, "y": 0.55, "visibility": 0.9}
    ]"#;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("bodyshape-cli-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_photo(dir: &Path) -> PathBuf {
        let path = dir.join("me.png");
        image::RgbImage::from_pixel(24, 48, image::Rgb([120, 110, 100]))
            .save(&path)
            .unwrap();
        path
    }

    fn analyze_args(image: PathBuf, landmarks: PathBuf) -> AnalyzeArgs {
        AnalyzeArgs {
            image,
            json: false,
            output: None,
            save: false,
            landmarks: Some(landmarks),
            model: None,
        }
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_recommend_display_name() {
        let cli = Cli::try_parse_from(["bodyshape", "recommend", "Inverted-Triangle"]).unwrap();
        match cli.command {
            Commands::Recommend { body_type, json } => {
                assert_eq!(body_type, BodyType::InvertedTriangle);
                assert!(!json);
            }
            _ => panic!("expected recommend"),
        }
    }

    #[test]
    fn test_parse_recommend_rejects_unknown() {
        assert!(Cli::try_parse_from(["bodyshape", "recommend", "diamond"]).is_err());
    }

    #[test]
    fn test_parse_analyze_flags() {
        let cli = Cli::try_parse_from([
            "bodyshape", "-vv", "analyze", "me.jpg", "--json", "--save", "--landmarks", "pts.json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Analyze(args) => {
                assert_eq!(args.image, PathBuf::from("me.jpg"));
                assert!(args.json && args.save);
                assert_eq!(args.landmarks, Some(PathBuf::from("pts.json")));
                assert!(args.output.is_none() && args.model.is_none());
            }
            _ => panic!("expected analyze"),
        }
    }

    #[test]
    fn test_saved_result_name_keeps_extension() {
        assert_eq!(
            saved_result_name(Path::new("photos/me.jpg")),
            "analysis_result_me.jpg.json"
        );
    }

    #[test]
    fn test_exit_status() {
        let no_pose = anyhow::Error::from(AnalysisError::NoPose(ProviderError::NoPoseDetected));
        assert_eq!(exit_status(&no_pose), EXIT_NO_POSE);

        let unavailable = anyhow::Error::from(AnalysisError::provider_unavailable(
            ProviderError::ModelNotFound("pose.onnx".into()),
        ));
        assert_eq!(exit_status(&unavailable), 1);

        assert_eq!(exit_status(&anyhow::anyhow!("bad config")), 1);
    }

    #[tokio::test]
    async fn test_analyze_replayed_landmarks_writes_report_and_result() {
        let dir = scratch_dir("report");
        let image = write_photo(&dir);
        let landmarks = dir.join("pts.json");
        std::fs::write(&landmarks, BROAD_SHOULDERS).unwrap();
        let report_path = dir.join("report.txt");

        let args = AnalyzeArgs {
            output: Some(report_path.clone()),
            save: true,
            ..analyze_args(image, landmarks)
        };
        analyze(&Config::default(), &args, &dir).await.unwrap();

        let report = std::fs::read_to_string(&report_path).unwrap();
        let saved = std::fs::read_to_string(dir.join("analysis_result_me.png.json")).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert!(report.contains("BODY TYPE ANALYSIS:"));
        assert!(report.contains("Detected body type: Inverted Triangle"));
        assert!(report.contains("STYLE RECOMMENDATIONS FOR INVERTED TRIANGLE"));

        let json: serde_json::Value = serde_json::from_str(&saved).unwrap();
        assert_eq!(json["body_type"], "inverted_triangle");
        assert_eq!(json["display_name"], "Inverted Triangle");
        assert!(json["confidence"].as_f64().unwrap() > 0.9);
        assert!(json["measurements"]["shoulder_width"].is_number());
        assert!(json["recommendations"]["tops"].is_array());
    }

    #[tokio::test]
    async fn test_analyze_json_output() {
        let dir = scratch_dir("json");
        let image = write_photo(&dir);
        let landmarks = dir.join("pts.json");
        std::fs::write(&landmarks, BROAD_SHOULDERS).unwrap();
        let output = dir.join("out.json");

        let args = AnalyzeArgs {
            json: true,
            output: Some(output.clone()),
            ..analyze_args(image, landmarks)
        };
        analyze(&Config::default(), &args, &dir).await.unwrap();

        let written = std::fs::read_to_string(&output).unwrap();
        let saved_exists = dir.join("analysis_result_me.png.json").exists();
        std::fs::remove_dir_all(&dir).ok();

        let json: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(json["body_type"], "inverted_triangle");
        assert!(!saved_exists);
    }

    #[tokio::test]
    async fn test_analyze_without_body_exits_no_pose() {
        let dir = scratch_dir("nopose");
        let image = write_photo(&dir);
        let landmarks = dir.join("empty.json");
        std::fs::write(&landmarks, "[]").unwrap();

        let err = analyze(&Config::default(), &analyze_args(image, landmarks), &dir)
            .await
            .unwrap_err();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(exit_status(&err), EXIT_NO_POSE);
        let analysis = err.downcast_ref::<AnalysisError>().unwrap();
        assert!(analysis.guidance().contains("full body"));
    }

    #[tokio::test]
    async fn test_analyze_missing_model_is_general_failure() {
        let dir = scratch_dir("nomodel");
        let image = write_photo(&dir);

        let args = AnalyzeArgs {
            image,
            json: false,
            output: None,
            save: false,
            landmarks: None,
            model: Some(dir.join("missing.onnx")),
        };
        let err = analyze(&Config::default(), &args, &dir).await.unwrap_err();
        std::fs::remove_dir_all(&dir).ok();

        assert!(matches!(
            err.downcast_ref::<AnalysisError>(),
            Some(AnalysisError::ProviderUnavailable(ProviderError::ModelNotFound(_)))
        ));
        assert_eq!(exit_status(&err), 1);
    }

    #[tokio::test]
    async fn test_invalid_min_visibility_is_rejected() {
        let dir = scratch_dir("visibility");
        let image = write_photo(&dir);
        let landmarks = dir.join("pts.json");
        std::fs::write(&landmarks, BROAD_SHOULDERS).unwrap();

        let config = Config {
            min_visibility: 1.5,
            ..Config::default()
        };
        let result = analyze(&config, &analyze_args(image, landmarks), &dir).await;
        std::fs::remove_dir_all(&dir).ok();

        let err = result.unwrap_err();
        assert!(err.to_string().contains("minimum visibility"), "{err:#}");
        assert_eq!(exit_status(&err), 1);
    }
}
