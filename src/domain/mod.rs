//! The data model shared by every pipeline stage.

mod analysis;
mod evidence;
mod intent;
mod query;
mod response;
mod roi;

pub use analysis::{
    AnalysisErrorType, AnalysisResult, GeometryType, IndicatorStats, UhiDetails, UhiMethod,
};
pub use evidence::EvidenceTrail;
pub use intent::{GeeSubIntent, Indicator, IntentResult, ServiceType, TimeRange};
pub use query::{LocationEntity, LocationEntityType, LocationParseResult, Query, ResolvedLocation};
pub use response::FinalResponse;
pub use roi::{Roi, RoiSource, Tile, TileSet};
