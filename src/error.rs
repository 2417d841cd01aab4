//! Error types shared across the crate
//!
//! Every rejected operation returns one of these and leaves the prior state
//! untouched. The render loop logs them and keeps going.

use std::path::PathBuf;

use crate::gfx::scene::NodeId;

/// Structural scene-graph edits that were refused.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    #[error("the root node cannot be removed")]
    RootRemoval,

    #[error("the root node cannot be {0}")]
    RootImmutable(&'static str),

    #[error("node {0:?} does not exist in the scene")]
    NodeNotFound(NodeId),

    #[error("node {0:?} has no parent")]
    ParentNotFound(NodeId),

    #[error("cannot move node {node:?} under its own descendant {new_parent:?}")]
    CyclicReparent { node: NodeId, new_parent: NodeId },
}

/// Shadow frustum edits that violate plane ordering.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ShadowError {
    #[error(
        "invalid shadow frustum: left {left} right {right}, bottom {bottom} top {top}, near {near} far {far}"
    )]
    InvalidFrustum {
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    },
}

/// Failures while loading models or building shader modules.
#[derive(thiserror::Error, Debug)]
pub enum AssetError {
    #[error("failed to load model '{path}': {source}")]
    ModelLoad {
        path: String,
        #[source]
        source: tobj::LoadError,
    },

    #[error("model '{0}' contains no geometry")]
    EmptyModel(String),

    #[error("shader '{0}' has an empty source")]
    EmptyShader(String),

    #[error("shader '{name}' failed to compile: {message}")]
    ShaderCompile { name: String, message: String },

    #[error("could not read shader source {path:?}: {source}")]
    ShaderIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown shader '{0}'")]
    UnknownShader(String),
}

/// Configuration loading errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}
