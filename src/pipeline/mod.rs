//! Pipeline module - loading, cleaning and preparing the observation table

pub mod catalog;
pub mod clean;
pub mod coerce;
pub mod demographics;
pub mod dta;
pub mod features;
pub mod frame;
pub mod loader;
pub mod missing;
pub mod partition;
pub mod sentinel;
pub mod target;

pub use catalog::{Catalog, CatalogEntry, CatalogError, ColumnRole, ModelVariant, Schema};
pub use clean::{clean_dataset, CleanedData};
pub use frame::{LabelledFrame, ValueLabels, VariableMeta};
pub use loader::*;
pub use missing::*;
pub use target::*;
