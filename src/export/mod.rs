//! Artifact persistence for fitted transforms and models

mod serializer;

pub use serializer::{
    load_object, read_artifact, save_object, ArtifactKind, ArtifactMetadata, SerializedArtifact,
};
