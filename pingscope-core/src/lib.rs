pub mod bounds;
pub mod confidence;
pub mod config;
pub mod controller;
pub mod error;
pub mod geometry;
pub mod model;
pub mod normalize;
pub mod scene;
pub mod source;

pub use bounds::compute_bounds;
pub use confidence::{ColorToken, ConfidenceBadge, ConfidenceTier};
pub use config::{Config, MapConfig};
pub use controller::{
    process_body, transition, validate, Event, InferenceController, Notice, NoticeKind, Phase,
    QueryForm, Rendered, ViewState,
};
pub use error::{
    ConfigError, Field, FieldError, NetworkFailure, ParseFailure, QueryError, SchemaViolation,
};
pub use geometry::parse_point;
pub use model::{
    decode_inference_body, BoundingRegion, CellType, Coordinate, InferenceQuery, InferenceResult,
    ModelId, NormalizedPing, PingEvent, RawInference, Subscriber,
};
pub use normalize::{normalize, DEFAULT_MAX_PINGS};
pub use scene::{MapScene, Marker, MarkerIcon, Popup, SceneBuilder, Viewport};
pub use source::InferenceSource;
