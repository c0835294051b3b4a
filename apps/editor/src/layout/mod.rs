// Layout: static font metrics, off-tree block measurement and page packing.
// Measurement never touches the live preview; it works on cloned subtrees.

pub mod font_metrics;
pub mod measure;
pub mod paginator;

pub use font_metrics::PageConfig;
pub use measure::{MeasureError, MeasurementSurface, MetricSurface};
pub use paginator::{Granularity, PaginationResult, PaginationTrigger, Paginator};
