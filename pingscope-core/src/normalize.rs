use tracing::debug;

use crate::geometry::parse_point;
use crate::model::{NormalizedPing, PingEvent};

pub const DEFAULT_MAX_PINGS: usize = 100;

/// Keeps the first `max_count` events whose geometry parses, in input order.
/// Unparseable events are dropped without being reported to the caller.
pub fn normalize(events: &[PingEvent], max_count: usize) -> Vec<NormalizedPing> {
    let mut out = Vec::with_capacity(events.len().min(max_count));
    let mut dropped = 0usize;
    for event in events {
        if out.len() == max_count {
            break;
        }
        match parse_point(&event.geometry) {
            Ok(coordinate) => out.push(NormalizedPing {
                event: event.clone(),
                coordinate,
            }),
            Err(err) => {
                dropped += 1;
                debug!(ping_id = ?event.ping_id, %err, "dropping ping with unusable geometry");
            }
        }
    }
    if dropped > 0 || out.len() == max_count {
        debug!(
            received = events.len(),
            kept = out.len(),
            dropped,
            "normalized pings"
        );
    }
    out
}
