//! Utility functions and types

pub mod data_loader;

pub use data_loader::{numeric_column, string_column, take_rows, DataLoader, DataSaver};
