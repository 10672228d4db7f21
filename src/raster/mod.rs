//! Raster access: identities, datasets, and the handle registry.
//!
//! - [`RasterLocator`] maps a [`RasterId`] to a dataset path
//! - [`DatasetOpener`] opens the path into a [`RasterDataset`]
//! - [`RasterRegistry`] keeps one open [`RasterHandle`] per identity
//!
//! Two dataset backends are provided: [`MemoryDataset`] (always available)
//! and `GdalDataset` behind the `gdal` cargo feature.

mod dataset;
#[cfg(feature = "gdal")]
mod gdal_source;
mod locator;
mod memory;
mod registry;
mod resample;

pub use dataset::{BandStack, DatasetOpener, RasterDataset};
#[cfg(feature = "gdal")]
pub use gdal_source::{GdalDataset, GdalOpener};
pub use locator::{DirectoryLocator, RasterId, RasterLocator, StaticLocator};
pub use memory::{MemoryDataset, MemoryOpener};
pub use registry::{HandleError, HandleSlot, RasterHandle, RasterRegistry};
pub use resample::{resample_bilinear, SourceBlock};
