//! Scorecast CLI Module
//!
//! Command-line interface for training and batch prediction.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::pipeline::{PredictPipeline, TrainPipeline};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    println!("  {} {}...", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("  {} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "scorecast")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train and select a regression model for student math scores")]
#[command(long_about = None)]
pub struct Cli {
    /// JSON pipeline configuration; defaults apply to absent fields
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run ingestion, transformation and model training (the default)
    Train,

    /// Predict math scores with the saved preprocessor and model
    Predict {
        /// Input CSV with the feature columns
        #[arg(short, long)]
        data: PathBuf,

        /// Write the input with a prediction column appended
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    Ok(match path {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    })
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(config: PipelineConfig) -> anyhow::Result<()> {
    section("Train");
    println!(
        "  {:<16} {}",
        muted("Source"),
        config.ingestion.source_path.display().to_string().white()
    );
    println!(
        "  {:<16} {}",
        muted("Candidates"),
        config.trainer.roster.len().to_string().white()
    );

    step_run("Running pipeline");
    let start = Instant::now();
    let summary = TrainPipeline::new(config).run()?;
    step_done(&format!("{:.2?}", start.elapsed()));

    println!();
    println!("  {:<24} {:>10} {:>10}", muted("Model"), muted("CV R²"), muted("Test R²"));
    println!("  {}", dim(&"─".repeat(46)));
    for entry in &summary.scores {
        let cv = entry
            .cv_score
            .map(|s| format!("{:.4}", s))
            .unwrap_or_else(|| "-".to_string());
        println!("  {:<24} {:>10} {:>10.4}", entry.name, cv, entry.test_r2);
    }
    println!("  {}", dim(&"─".repeat(46)));

    println!();
    println!(
        "  {} {} {} {:.4}",
        ok("best"),
        summary.best_model.white().bold(),
        muted("R²:"),
        summary.r2_score
    );
    println!(
        "  {:<16} {}",
        muted("Model"),
        summary.artifacts.model.display().to_string().white()
    );
    println!();
    Ok(())
}

pub fn cmd_predict(config: &PipelineConfig, data: &Path, output: Option<&PathBuf>) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading artifacts");
    let pipeline = PredictPipeline::load(
        &config.transformation.preprocessor_path,
        &config.trainer.model_path,
    )?;
    step_done(pipeline.model_name());

    step_run(&format!("Scoring {}", data.display()));
    let start = Instant::now();
    let predictions = pipeline.predict_csv(data, output)?;
    step_done(&format!("{} rows in {:.2?}", predictions.len(), start.elapsed()));

    if output.is_none() {
        println!();
        for (i, p) in predictions.iter().take(10).enumerate() {
            println!("  {:>6} {:>10.2}", muted(&i.to_string()), p);
        }
        if predictions.len() > 10 {
            println!("  {}", dim(&format!("... {} more", predictions.len() - 10)));
        }
    }
    println!();
    Ok(())
}
