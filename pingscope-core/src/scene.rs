//! Turns an [`InferenceResult`] into something a map widget can draw.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::bounds::compute_bounds;
use crate::confidence::{ColorToken, ConfidenceBadge};
use crate::config::MapConfig;
use crate::error::SchemaViolation;
use crate::model::{BoundingRegion, CellType, Coordinate, InferenceResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MarkerIcon {
    DataSession,
    VoiceCall,
    TextMessage,
}

impl MarkerIcon {
    pub fn for_cell_type(cell_type: CellType) -> Self {
        match cell_type {
            CellType::Data => MarkerIcon::DataSession,
            CellType::Voice => MarkerIcon::VoiceCall,
            CellType::Sms => MarkerIcon::TextMessage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Popup {
    pub state: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub position: Coordinate,
    pub icon: MarkerIcon,
    pub popup: Popup,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum Viewport {
    #[serde(rename_all = "camelCase")]
    FitTo {
        region: BoundingRegion,
        padding_px: u32,
    },
    Static { center: Coordinate, zoom: u8 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapScene {
    pub markers: Vec<Marker>,
    pub overlay: Option<BoundingRegion>,
    pub overlay_color: ColorToken,
    pub overlay_opacity: f64,
    pub viewport: Viewport,
    pub badge: ConfidenceBadge,
}

impl MapScene {
    pub fn auto_fit_to(&self) -> Option<&BoundingRegion> {
        match &self.viewport {
            Viewport::FitTo { region, .. } => Some(region),
            Viewport::Static { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SceneBuilder {
    map: MapConfig,
}

impl SceneBuilder {
    pub fn new(map: MapConfig) -> Self {
        Self { map }
    }

    /// Fails on the first ping whose cell type is not recognized; no partial
    /// scene is returned.
    pub fn build(&self, result: &InferenceResult) -> Result<MapScene, SchemaViolation> {
        let markers = result
            .pings
            .iter()
            .map(|ping| -> Result<Marker, SchemaViolation> {
                let cell_type: CellType = ping.event.cell_type.parse()?;
                Ok(Marker {
                    position: ping.coordinate,
                    icon: MarkerIcon::for_cell_type(cell_type),
                    popup: Popup {
                        state: ping.event.observed_state.clone(),
                        timestamp: ping.event.timestamp,
                    },
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let positions: Vec<Coordinate> = markers.iter().map(|m| m.position).collect();
        let overlay = compute_bounds(&positions);
        let badge = ConfidenceBadge::new(result.confidence_pct);
        let viewport = match &overlay {
            Some(region) => Viewport::FitTo {
                region: region.clone(),
                padding_px: self.map.fit_padding_px,
            },
            None => Viewport::Static {
                center: self.map.default_center,
                zoom: self.map.default_zoom,
            },
        };

        Ok(MapScene {
            markers,
            overlay,
            overlay_color: badge.color,
            overlay_opacity: self.map.overlay_opacity,
            viewport,
            badge,
        })
    }
}
