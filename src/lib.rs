//! PDF Shrinker Library
//!
//! Reduces the on-disk size of PDF documents by re-encoding their embedded
//! raster images at a lower quality and resolution, optionally converting
//! them to grayscale. Text, vector graphics, fonts, page layout, and metadata
//! are left untouched; only image XObject streams are rewritten.
//!
//! The pipeline runs in four layers: [`config`] holds the per-run transform
//! settings, [`transform`] re-encodes a single decoded raster, [`walker`]
//! traverses a document's page/resource graph and splices re-encoded images
//! back into the object graph, and [`batch`] drives whole input lists and
//! writes the results to disk. [`report`] does the size accounting.

pub mod batch;
pub mod config;
pub mod error;
pub mod report;
pub mod transform;
pub mod walker;

pub use batch::{
    preview_document, run_batch, shrink_document, spawn_batch, BatchHandle, OutputPolicy, Preview,
    OUTPUT_PREFIX,
};
pub use config::{QualityLevel, ResolutionLevel, TransformConfig};
pub use error::{ShrinkError, TransformError};
pub use report::{reduction_percent, BatchReport, DocumentOutcome, DocumentResult};
pub use transform::{EncodedRaster, Outcome, SkipReason};
pub use walker::{rewrite_images, WalkStats};
