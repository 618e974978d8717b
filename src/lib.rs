//! Styled Layer Descriptor styling engine for vector map tiles.
//!
//! An SLD document is parsed into a [`StyleSet`] once, which then selects
//! renderer styles for every feature based on its attributes and the
//! current map scale.

pub use crate::sld::StyleSet;

pub mod assets;
pub mod attributes;
pub mod config;
pub mod geometry;
pub mod sld;
pub mod style;
pub mod tiles;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Xml(#[from] roxmltree::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Configory(#[from] configory::Error),

    #[error("Unexpected root element {0:?}, expected StyledLayerDescriptor")]
    UnexpectedRoot(String),
}
