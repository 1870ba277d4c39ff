//! immopredict CLI
//!
//! Command-line interface for exploring, cleaning, fitting, evaluating and
//! serving the price-estimation pipeline.

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::artifacts::{ArtifactStore, ModelArtifacts};
use crate::inference::{FeatureRecord, LinearPredictor, PredictionService};
use crate::preprocessing::{audit, clean, CleaningConfig, EncoderConfig, FeatureGroups, ImputeStrategy, ScalerType};
use crate::target::TargetTransform;
use crate::training::{evaluate, fit_artifacts, FitConfig, TrainingData, TrainingPaths};
use crate::utils::{load_data, write_csv};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn list(label: &str, names: &[String]) {
    let shown = if names.is_empty() { dim("none").to_string() } else { names.join(", ") };
    println!("  {:<18} {}", muted(label), shown);
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "immopredict")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Real-estate price estimation: preprocessing, fit artifacts and serving")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Audit a table: column types, gaps, constants, outliers
    Inspect {
        /// Input data file (CSV, JSON, or Parquet)
        #[arg(short, long)]
        data: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Clean a raw table and write it as CSV
    Clean {
        #[arg(short, long)]
        data: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Numeric fill strategy
        #[arg(long, value_enum, default_value_t = ImputeArg::Median)]
        impute: ImputeArg,

        /// Fill value for missing categories
        #[arg(long, default_value = "missing")]
        fill: String,

        /// Keep accents and case in category text
        #[arg(long)]
        keep_text: bool,
    },

    /// Fit the encoder and write the model artifacts
    Fit {
        /// Directory holding X_train, y_train, X_test and y_test CSV files
        #[arg(short, long)]
        data_dir: PathBuf,

        /// Model directory to write
        #[arg(short, long, default_value = "models")]
        output: PathBuf,

        /// Target column of the y tables
        #[arg(short, long)]
        target: Option<String>,

        /// Comma-separated input columns to keep
        #[arg(long, value_delimiter = ',')]
        features: Option<Vec<String>>,

        /// Comma-separated numeric feature columns
        #[arg(long, value_delimiter = ',')]
        numeric: Option<Vec<String>>,

        /// Comma-separated categorical feature columns, one-hot encoded even
        /// when stored as integer codes
        #[arg(long, value_delimiter = ',')]
        categorical: Option<Vec<String>>,

        /// Comma-separated 0/1 flag columns
        #[arg(long, value_delimiter = ',')]
        binary: Option<Vec<String>>,

        #[arg(long, value_enum, default_value_t = TransformArg::Log1p)]
        transform: TransformArg,

        /// Disable standardization of numeric features
        #[arg(long)]
        no_scale: bool,

        /// Also write the encoded training matrix to this CSV file
        #[arg(long)]
        export: Option<PathBuf>,

        /// Write a constant predictor (mean transformed target) as model.json
        #[arg(long)]
        baseline: bool,
    },

    /// Score the model directory on the test split
    Evaluate {
        #[arg(short, long, default_value = "models")]
        models: PathBuf,

        #[arg(short, long)]
        data_dir: PathBuf,

        #[arg(short, long)]
        target: Option<String>,
    },

    /// Predict one JSON record or every row of a table
    Predict {
        #[arg(short, long, default_value = "models")]
        models: PathBuf,

        /// A JSON object of feature values
        #[arg(short, long, conflicts_with = "data", required_unless_present = "data")]
        record: Option<String>,

        /// Input data file
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Output predictions file (CSV)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start the prediction server
    Serve {
        /// Server port (default API_PORT or 8000)
        #[arg(short, long)]
        port: Option<u16>,

        /// Server host (default API_HOST or 0.0.0.0)
        #[arg(long)]
        host: Option<String>,

        /// Model directory (default MODELS_DIR or ./models)
        #[arg(short, long)]
        models: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImputeArg {
    Mean,
    Median,
    Mode,
    Zero,
}

impl From<ImputeArg> for ImputeStrategy {
    fn from(arg: ImputeArg) -> Self {
        match arg {
            ImputeArg::Mean => ImputeStrategy::Mean,
            ImputeArg::Median => ImputeStrategy::Median,
            ImputeArg::Mode => ImputeStrategy::MostFrequent,
            ImputeArg::Zero => ImputeStrategy::zero(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransformArg {
    Log1p,
    Log,
    Identity,
}

impl From<TransformArg> for TargetTransform {
    fn from(arg: TransformArg) -> Self {
        match arg {
            TransformArg::Log1p => TargetTransform::Log1p,
            TransformArg::Log => TargetTransform::Log,
            TransformArg::Identity => TargetTransform::Identity,
        }
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_inspect(data_path: &Path, as_json: bool) -> anyhow::Result<()> {
    let df = load_data(data_path)?;
    let report = audit(&df)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    section("Inspect");
    println!("  {:<18} {}", muted("Rows"), report.rows.to_string().white());
    println!("  {:<18} {}", muted("Columns"), report.columns.to_string().white());
    println!();
    list("Boolean", &report.partition.boolean);
    list("Numeric", &report.partition.numeric);
    list("Categorical", &report.partition.categorical);
    println!();
    list("Empty", &report.empty);
    list("Constant", &report.constant);
    list("Mostly missing", &report.high_missing);
    list("High cardinality", &report.high_cardinality);
    list("Has missing", &report.missing_like);

    if !report.outliers.is_empty() {
        println!();
        println!("  {:<24} {:>10}", muted("Column"), muted("Outliers"));
        println!("  {}", dim(&"─".repeat(36)));
        for (name, count) in &report.outliers {
            let count = if *count > 0 { count.to_string().yellow() } else { count.to_string().normal() };
            println!("  {:<24} {:>10}", name, count);
        }
    }
    println!();
    Ok(())
}

pub fn cmd_clean(
    data_path: &Path,
    output_path: &Path,
    impute: ImputeArg,
    fill: &str,
    keep_text: bool,
) -> anyhow::Result<()> {
    section("Clean");

    step_run("Loading data");
    let df = load_data(data_path)?;
    step_done(&format!("{} rows × {} cols", df.height(), df.width()));

    let config = CleaningConfig::default()
        .with_numeric_strategy(impute.into())
        .with_categorical_fill(fill)
        .with_text_normalization(!keep_text);

    step_run("Cleaning");
    let start = Instant::now();
    let cleaned = clean(&df, &config)?;
    step_done(&format!("{:?}", start.elapsed()));

    step_run(&format!("Saving → {}", output_path.display()));
    write_csv(&cleaned.data, output_path)?;
    step_done(&format!("{} rows × {} cols", cleaned.data.height(), cleaned.data.width()));

    println!();
    list("Dropped", &cleaned.dropped);
    println!();
    Ok(())
}

#[allow(clippy::too_many_arguments)]
/// Feature groups named on the command line. Without any group flag the
/// groups are derived from the column partition.
pub fn designated_groups(
    numeric: Option<Vec<String>>,
    categorical: Option<Vec<String>>,
    binary: Option<Vec<String>>,
) -> Option<FeatureGroups> {
    if numeric.is_none() && categorical.is_none() && binary.is_none() {
        return None;
    }
    Some(FeatureGroups::new(
        numeric.unwrap_or_default(),
        categorical.unwrap_or_default(),
        binary.unwrap_or_default(),
    ))
}

pub fn cmd_fit(
    data_dir: &Path,
    output: &Path,
    target: Option<&str>,
    features: Option<Vec<String>>,
    groups: Option<FeatureGroups>,
    transform: TransformArg,
    no_scale: bool,
    export: Option<&Path>,
    baseline: bool,
) -> anyhow::Result<()> {
    section("Fit");

    step_run("Loading splits");
    let data = TrainingData::load(&TrainingPaths::from_dir(data_dir), target)?;
    step_done(&format!(
        "{} train / {} test rows",
        data.x_train.height(),
        data.x_test.height()
    ));

    let encoder = if no_scale {
        EncoderConfig::default().with_scaler(ScalerType::None)
    } else {
        EncoderConfig::default()
    };
    let mut config = FitConfig::new()
        .with_encoder(encoder)
        .with_target_transform(transform.into());
    if let Some(features) = features {
        config = config.with_features(features);
    }
    if let Some(groups) = groups {
        config = config.with_groups(groups);
    }

    step_run("Fitting encoder");
    let fitted = fit_artifacts(&data, &config)?;
    step_done(&format!("{:.3}s", fitted.report.elapsed_secs));

    std::fs::create_dir_all(output)?;
    let store = ArtifactStore::new(output);
    step_run(&format!("Saving → {}", output.display()));
    fitted.save(&store)?;
    step_done("");

    if let Some(path) = export {
        step_run(&format!("Exporting → {}", path.display()));
        fitted.export_training_matrix(path)?;
        step_done(&format!("{} rows", fitted.report.train_rows));
    }

    if baseline {
        let mean = fitted.y_train.mean().unwrap_or(0.0);
        LinearPredictor::constant(fitted.report.encoded_width, mean).save(&store)?;
        println!("  {} baseline predictor ({:.4})", ok("✓"), mean);
    }

    let report = &fitted.report;
    println!();
    println!("  {:<16} {}", muted("Inputs"), report.input_columns.len().to_string().white());
    println!("  {:<16} {}", muted("Encoded width"), report.encoded_width.to_string().white().bold());
    println!("  {:<16} {}", muted("Target"), report.target.white());
    println!("  {:<16} {}", muted("Transform"), report.target_transform.to_string().white());
    println!(
        "  {:<16} {}",
        muted("Target range"),
        format!("{:.4} .. {:.4}", report.target_range.0, report.target_range.1).white()
    );
    println!();
    Ok(())
}

pub fn cmd_evaluate(models: &Path, data_dir: &Path, target: Option<&str>) -> anyhow::Result<()> {
    section("Evaluate");

    let store = ArtifactStore::new(models);
    step_run("Loading model");
    let artifacts = ModelArtifacts::load(&store)?;
    let predictor = LinearPredictor::load(&store)?;
    step_done(&format!("{} features", artifacts.encoder.output_width()));

    let target = target.unwrap_or(artifacts.config.target.as_str()).to_string();
    step_run("Loading splits");
    let data = TrainingData::load(&TrainingPaths::from_dir(data_dir), Some(&target))?;
    step_done(&format!("{} test rows", data.x_test.height()));

    let report = evaluate(&artifacts, &predictor, &data.x_test, &data.y_test)?;

    println!();
    println!("  {:<16} {}", muted("R²"), format!("{:.4}", report.transformed.r2).white().bold());
    println!("  {:<16} {}", muted("RMSE"), format!("{:.4}", report.transformed.rmse).white());
    println!("  {:<16} {}", muted("MAE"), format!("{:.4}", report.transformed.mae).white());
    println!("  {:<16} {}", muted("MAE (€)"), format!("{:.0}", report.currency_mae).white());
    if report.invalid_predictions > 0 {
        println!("  {:<16} {}", muted("Invalid"), report.invalid_predictions.to_string().red());
    }
    println!();
    Ok(())
}

pub fn cmd_predict(
    models: &Path,
    record: Option<&str>,
    data_path: Option<&Path>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let service = PredictionService::load(models)?;

    if let Some(json) = record {
        let record: FeatureRecord = serde_json::from_str(json)?;
        let response = service.respond(&record);
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    let Some(data_path) = data_path else {
        anyhow::bail!("either --record or --data is required");
    };

    section("Predict");
    step_run("Loading data");
    let df = load_data(data_path)?;
    step_done(&format!("{} rows", df.height()));

    step_run("Predicting");
    let start = Instant::now();
    let results = service.predict_batch(&df)?;
    step_done(&format!("{:?}", start.elapsed()));

    let invalid = results.iter().filter(|r| !r.is_valid()).count();
    if invalid > 0 {
        println!("  {} {} non-finite predictions", "!".yellow(), invalid);
    }

    match output {
        Some(path) => {
            let predictions = DataFrame::new(vec![
                Series::new(
                    "raw_prediction".into(),
                    results.iter().map(|r| r.raw_output).collect::<Vec<f64>>(),
                )
                .into(),
                Series::new(
                    "prediction".into(),
                    results.iter().map(|r| r.value).collect::<Vec<Option<f64>>>(),
                )
                .into(),
            ])?;
            write_csv(&predictions, path)?;
            println!("  {} {} predictions → {}", ok("✓"), results.len(), path.display());
        }
        None => {
            for (i, r) in results.iter().enumerate() {
                match r.value {
                    Some(v) => println!("  {:>6}  {:>14.0}", i, v),
                    None => println!("  {:>6}  {:>14}", i, "invalid".red()),
                }
            }
        }
    }
    println!();
    Ok(())
}

pub async fn cmd_serve(host: Option<String>, port: Option<u16>, models: Option<PathBuf>) -> anyhow::Result<()> {
    use crate::server::{run_server, ServerConfig};

    let mut config = ServerConfig::from_env();
    if let Some(host) = host {
        config = config.with_host(host);
    }
    if let Some(port) = port {
        config = config.with_port(port);
    }
    if let Some(models) = models {
        config = config.with_models_dir(models.display().to_string());
    }

    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "immopredict".white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("Health ", &format!("http://{}:{}/health", config.host, config.port)));
    line_box(&kv("Schema ", &format!("http://{}:{}/schema", config.host, config.port)));
    line_box(&kv("Predict", &format!("http://{}:{}/predict", config.host, config.port)));
    line_box(&kv("Models ", &config.models_dir));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box_center(&format!("{}", dim("ctrl+c to stop")));
    line_box_empty();
    line_box_bottom();
    println!();

    run_server(config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fit() {
        let cli = Cli::try_parse_from([
            "immopredict", "fit", "--data-dir", "data", "--features", "sq_mt_built,n_rooms", "--transform", "log",
        ])
        .unwrap();
        match cli.command {
            Commands::Fit { features, transform, output, .. } => {
                assert_eq!(features, Some(vec!["sq_mt_built".to_string(), "n_rooms".to_string()]));
                assert_eq!(transform, TransformArg::Log);
                assert_eq!(output, PathBuf::from("models"));
            }
            _ => panic!("expected fit"),
        }
    }

    #[test]
    fn test_parse_fit_groups() {
        let cli = Cli::try_parse_from([
            "immopredict", "fit", "--data-dir", "data", "--numeric", "sq_mt_built,n_rooms", "--categorical",
            "neighborhood", "--binary", "has_lift,has_parking",
        ])
        .unwrap();
        match cli.command {
            Commands::Fit { numeric, categorical, binary, .. } => {
                let groups = designated_groups(numeric, categorical, binary).unwrap();
                assert_eq!(
                    groups,
                    FeatureGroups::new(["sq_mt_built", "n_rooms"], ["neighborhood"], ["has_lift", "has_parking"])
                );
            }
            _ => panic!("expected fit"),
        }
        assert!(designated_groups(None, None, None).is_none());
    }

    #[test]
    fn test_fit_with_designated_categorical_codes() {
        let dir = tempfile::tempdir().unwrap();
        let x = df!(
            "sq_mt_built" => &[60.0, 80.0, 100.0, 140.0, 75.0],
            "neighborhood" => &[55i64, 12, 55, 7, 12],
            "has_lift" => &[1i64, 0, 1, 1, 0]
        )
        .unwrap();
        let y = df!("buy_price" => &[210000.0, 250000.0, 400000.0, 600000.0, 230000.0]).unwrap();
        for (name, table) in [("X_train.csv", &x), ("X_test.csv", &x), ("y_train.csv", &y), ("y_test.csv", &y)] {
            write_csv(table, dir.path().join(name)).unwrap();
        }

        let models = dir.path().join("models");
        let groups = designated_groups(
            Some(vec!["sq_mt_built".to_string()]),
            Some(vec!["neighborhood".to_string()]),
            Some(vec!["has_lift".to_string()]),
        );
        cmd_fit(dir.path(), &models, None, None, groups, TransformArg::Log1p, false, None, true).unwrap();

        let artifacts = ModelArtifacts::load(&ArtifactStore::new(&models)).unwrap();
        assert_eq!(artifacts.encoder.levels("neighborhood").unwrap(), &["12", "55", "7"]);
        assert_eq!(
            artifacts.encoder.feature_names(),
            &["sq_mt_built", "neighborhood_12", "neighborhood_55", "neighborhood_7", "has_lift"]
        );

        let out = dir.path().join("predictions.csv");
        cmd_predict(&models, None, Some(&dir.path().join("X_test.csv")), Some(&out)).unwrap();
        let predictions = load_data(&out).unwrap();
        assert_eq!(predictions.height(), 5);
        let names: Vec<&str> = predictions.get_column_names().iter().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["raw_prediction", "prediction"]);
    }

    #[test]
    fn test_predict_needs_input() {
        assert!(Cli::try_parse_from(["immopredict", "predict"]).is_err());
        assert!(Cli::try_parse_from(["immopredict", "predict", "--record", "{}"]).is_ok());
    }

    #[test]
    fn test_strip_ansi() {
        let s = format!("{}", "x".red());
        assert_eq!(strip_ansi(&s), "x");
    }
}
