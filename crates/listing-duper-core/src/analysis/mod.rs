pub mod annotate;
pub mod columns;
pub mod dates;
pub mod grouping;
pub mod normalize;
pub mod quality;
pub mod similarity;

pub use annotate::{AnnotatedRow, AnnotatedTable};
pub use columns::ColumnMap;
pub use grouping::{
    detect_duplicates, Decision, DetectionReport, DuplicateGrouper, Group, GroupAccumulator, Item,
};
pub use normalize::{advanced_normalize, basic_normalize, normalize, NormalizeMode};
pub use quality::DataQualityReport;
pub use similarity::similarity;
