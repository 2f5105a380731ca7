//! Point geometry decoding.
//!
//! The service sends EWKT such as `SRID=4326;POINT (-74.0060 40.7128)`.
//! Tokens are ordered longitude then latitude; [`Coordinate`] is latitude
//! first, so the swap happens here and nowhere else.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::ParseFailure;
use crate::model::Coordinate;

fn point_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^\s*(?:SRID\s*=\s*\d+\s*;\s*)?POINT\s*\(([^()]*)\)\s*$")
            .expect("point pattern compiles")
    })
}

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)$").expect("number pattern compiles")
    })
}

pub fn parse_point(encoding: &str) -> Result<Coordinate, ParseFailure> {
    let caps = point_pattern()
        .captures(encoding)
        .ok_or_else(|| ParseFailure::NotAPoint {
            input: encoding.to_string(),
        })?;
    let body = caps.get(1).map(|m| m.as_str()).unwrap_or_default();

    let tokens: Vec<&str> = body.split_whitespace().collect();
    let [lon_tok, lat_tok] = tokens.as_slice() else {
        return Err(ParseFailure::WrongArity {
            found: tokens.len(),
        });
    };

    let longitude = parse_number(lon_tok)?;
    let latitude = parse_number(lat_tok)?;
    let coord = Coordinate::new(latitude, longitude);
    if !coord.is_valid() {
        return Err(ParseFailure::OutOfRange {
            latitude,
            longitude,
        });
    }
    Ok(coord)
}

fn parse_number(token: &str) -> Result<f64, ParseFailure> {
    if !number_pattern().is_match(token) {
        return Err(ParseFailure::InvalidNumber {
            token: token.to_string(),
        });
    }
    token.parse::<f64>().map_err(|_| ParseFailure::InvalidNumber {
        token: token.to_string(),
    })
}
