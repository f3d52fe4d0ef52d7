//! Data preprocessing
//!
//! - Missing value imputation (median / mean / most frequent)
//! - Standard scaling
//! - One-hot encoding; unseen categories encode as zeros
//! - The column transformer combining them, and the transformation stage

mod column_transformer;
mod encoder;
mod imputer;
mod scaler;
mod transformation;

pub use column_transformer::{ColumnTransformer, FittedParams};
pub use encoder::OneHotEncoder;
pub use imputer::{ImputeStrategy, ImputeValue, Imputer};
pub use scaler::{ScalerParams, StandardScaler};
pub use transformation::{
    attach_target, split_features_target, target_values, DataTransformation,
    TransformationArtifact,
};
