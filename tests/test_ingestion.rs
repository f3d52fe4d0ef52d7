//! Integration tests for the ingestion stage: raw copy and seeded split

use std::fs;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use scorecast::config::IngestionConfig;
use scorecast::error::Stage;
use scorecast::ingestion::{test_count, DataIngestion};
use scorecast::utils::{DataLoader, DataSaver};
use tempfile::TempDir;

fn write_source(dir: &Path, n: usize) -> PathBuf {
    let ids: Vec<i64> = (0..n as i64).collect();
    let reading: Vec<i64> = (0..n as i64).map(|i| 40 + (i * 7) % 60).collect();
    let gender: Vec<&str> = (0..n).map(|i| if i % 2 == 0 { "female" } else { "male" }).collect();
    let mut df = df!(
        "id" => &ids,
        "gender" => &gender,
        "reading score" => &reading
    )
    .unwrap();

    let path = dir.join("source").join("stud.csv");
    DataSaver::save_csv(&mut df, &path).unwrap();
    path
}

fn config(dir: &Path, source: PathBuf) -> IngestionConfig {
    IngestionConfig::new()
        .with_source(source)
        .with_artifacts_dir(dir.join("artifacts"))
}

fn ids(path: &Path) -> Vec<i64> {
    let df = DataLoader::new().load_csv(path).unwrap();
    df.column("id")
        .unwrap()
        .i64()
        .unwrap()
        .into_no_null_iter()
        .collect()
}

#[test]
fn test_split_sizes_and_partition() {
    let dir = TempDir::new().unwrap();
    let source = write_source(dir.path(), 101);
    let artifact = DataIngestion::new(config(dir.path(), source))
        .initiate_data_ingestion()
        .unwrap();

    let train = ids(&artifact.train_data_path);
    let test = ids(&artifact.test_data_path);
    assert_eq!(test.len(), test_count(101, 0.2));
    assert_eq!(test.len(), 21);
    assert_eq!(train.len() + test.len(), 101);

    let mut all: Vec<i64> = train.iter().chain(test.iter()).copied().collect();
    all.sort_unstable();
    assert_eq!(all, (0..101).collect::<Vec<_>>());

    assert_eq!(ids(&artifact.raw_data_path), (0..101).collect::<Vec<_>>());
}

#[test]
fn test_split_is_byte_identical_across_runs() {
    let dir = TempDir::new().unwrap();
    let source = write_source(dir.path(), 50);
    let ingestion = DataIngestion::new(config(dir.path(), source));

    let first = ingestion.initiate_data_ingestion().unwrap();
    let train_a = fs::read(&first.train_data_path).unwrap();
    let test_a = fs::read(&first.test_data_path).unwrap();

    let second = ingestion.initiate_data_ingestion().unwrap();
    assert_eq!(fs::read(&second.train_data_path).unwrap(), train_a);
    assert_eq!(fs::read(&second.test_data_path).unwrap(), test_a);
}

#[test]
fn test_different_seed_changes_split() {
    let dir = TempDir::new().unwrap();
    let source = write_source(dir.path(), 60);

    let a = DataIngestion::new(config(dir.path(), source.clone()))
        .initiate_data_ingestion()
        .unwrap();
    let test_a = ids(&a.test_data_path);

    let b = DataIngestion::new(config(dir.path(), source).with_random_state(7))
        .initiate_data_ingestion()
        .unwrap();
    assert_ne!(ids(&b.test_data_path), test_a);
}

#[test]
fn test_missing_source_is_ingestion_error() {
    let dir = TempDir::new().unwrap();
    let err = DataIngestion::new(config(dir.path(), dir.path().join("nope.csv")))
        .initiate_data_ingestion()
        .unwrap_err();

    assert_eq!(err.stage, Stage::Ingestion);
    assert!(err.to_string().contains("during data ingestion"));
    assert!(!err.is_rejection());
}
