//! Parsing of query string values shared by the endpoints.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::coverage::{Operation, Resolution, DEFAULT_TIME_FORMAT};
use crate::error::{CovercatError, Result};
use crate::geometry::Rect;

fn invalid(param: &str, message: impl Into<String>) -> CovercatError {
    CovercatError::InvalidParameter {
        param: param.to_string(),
        message: message.into(),
    }
}

/// Parse a bounding box string "xmin,ymin,xmax,ymax".
pub fn parse_bbox(bbox: &str) -> Result<Rect> {
    let parts: Vec<&str> = bbox.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        return Err(invalid(
            "bbox",
            "Bounding box must be in format 'xmin,ymin,xmax,ymax'",
        ));
    }

    let mut values = [0f64; 4];
    for (value, (part, name)) in values
        .iter_mut()
        .zip(parts.iter().zip(["xmin", "ymin", "xmax", "ymax"]))
    {
        *value = part
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| invalid("bbox", format!("Invalid {}: {}", name, part)))?;
    }
    let [xmin, ymin, xmax, ymax] = values;

    if xmin >= xmax || ymin >= ymax {
        return Err(invalid(
            "bbox",
            format!(
                "Bounding box is empty: x [{}, {}], y [{}, {}]",
                xmin, xmax, ymin, ymax
            ),
        ));
    }
    Ok(Rect::from_bounds(xmin, ymin, xmax, ymax))
}

/// Parse "rx,ry", or a single value used on both axes.
pub fn parse_resolution(text: &str) -> Result<Resolution> {
    let values = text
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|_| invalid("resolution", format!("Invalid number: {}", part)))
        })
        .collect::<Result<Vec<_>>>()?;
    match values.as_slice() {
        [both] => Ok(Resolution::new(*both, *both)),
        [x, y] => Ok(Resolution::new(*x, *y)),
        _ => Err(invalid("resolution", "Expected 'r' or 'rx,ry'")),
    }
}

/// Parse an instant given as RFC 3339, as "YYYY-MM-DD HH:MM:SS" or as a date.
pub fn parse_time(param: &str, text: &str) -> Result<DateTime<Utc>> {
    if let Ok(time) = DateTime::parse_from_rfc3339(text) {
        return Ok(time.with_timezone(&Utc));
    }
    if let Ok(time) = NaiveDateTime::parse_from_str(text, DEFAULT_TIME_FORMAT) {
        return Ok(time.and_utc());
    }
    if let Some(time) = NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(time.and_utc());
    }
    Err(invalid(param, format!("Invalid time: {}", text)))
}

pub fn parse_operation(text: &str) -> Result<Operation> {
    text.parse::<Operation>()
}
