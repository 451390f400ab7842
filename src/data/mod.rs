//! Data module - CSV loading, schema normalization, caching and filtering

mod cache;
mod filter;
mod loader;
pub mod schema;
mod table;

pub use cache::{CacheKey, TableCache};
pub use filter::{apply_filters, FilterOptions, FilterState, FilteredTables, WeekRange, DEFAULT_MAX_WEEK};
pub use loader::{read_file, DatasetLoader, InputOrigin, RawInputs, RETENTION_FILE, REVENUE_FILE};
pub use schema::{region_coordinates, CohortMonth, Coordinates};
pub use table::{Datasets, RetentionRecord, RetentionTable, RevenueColumns, RevenueRecord, RevenueTable};
