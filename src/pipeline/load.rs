use std::collections::HashMap;

use crate::error::LoadError;
use crate::types::route::{Point, Route};

/// Reads the routes file from a URL or a local path.
pub async fn fetch_routes(source: &str) -> Result<Vec<Route>, LoadError> {
    let text = if source.starts_with("http://") || source.starts_with("https://") {
        let response = reqwest::get(source)
            .await
            .map_err(|e| LoadError::Fetch(format!("Failed to fetch {}: {}", source, e)))?
            .error_for_status()
            .map_err(|e| LoadError::Fetch(format!("Failed to fetch {}: {}", source, e)))?;
        response
            .text()
            .await
            .map_err(|e| LoadError::Fetch(format!("Failed to read body of {}: {}", source, e)))?
    } else {
        tokio::fs::read_to_string(source)
            .await
            .map_err(|e| LoadError::Io(format!("Failed to read {}: {}", source, e)))?
    };

    parse_routes(&text)
}

/// Parses the routes CSV. Rows without usable `points` or `route_id` are
/// dropped; the rest keep file order.
pub fn parse_routes(text: &str) -> Result<Vec<Route>, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| LoadError::Csv(format!("Failed to read header row: {}", e)))?
        .iter()
        .map(|h| h.trim_matches('"').to_string())
        .collect();

    let mut routes = Vec::new();
    for (row_idx, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!("Skipping unreadable row {}: {}", row_idx + 1, e);
                continue;
            }
        };

        // empty values count as missing
        let fields: HashMap<&str, &str> = headers
            .iter()
            .map(String::as_str)
            .zip(record.iter())
            .filter(|(_, value)| !value.is_empty())
            .collect();

        match route_from_fields(&fields) {
            Some(route) => routes.push(route),
            None => tracing::debug!("Dropping row {} without valid route data", row_idx + 1),
        }
    }

    tracing::info!("Parsed {} routes", routes.len());
    Ok(routes)
}

fn route_from_fields(fields: &HashMap<&str, &str>) -> Option<Route> {
    let points = parse_points(fields.get("points")?)?;
    let route_id = parse_integer(fields.get("route_id")?)?;
    let leg_duration = fields
        .get("leg_duration")
        .and_then(|value| parse_integer(value))
        .unwrap_or(0);

    Some(Route {
        route_id,
        from_port: fields.get("from_port").unwrap_or(&"").to_string(),
        to_port: fields.get("to_port").unwrap_or(&"").to_string(),
        leg_duration,
        all_distance: 0.0,
        points,
    })
}

fn parse_points(raw: &str) -> Option<Vec<Point>> {
    let tuples: Vec<Vec<f64>> = serde_json::from_str(raw).ok()?;
    if tuples.is_empty() {
        return None;
    }
    // Segment distances are always derived from timestamps and speeds,
    // never taken from the source file.
    tuples
        .iter()
        .map(|tuple| match tuple.as_slice() {
            [lon, lat, timestamp, speed, ..] => Some(Point::new(*lon, *lat, *timestamp, *speed)),
            _ => None,
        })
        .collect()
}

/// Leading integer, also accepting a float that gets truncated.
fn parse_integer(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    raw.parse::<i64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .map(|value| value.trunc() as i64)
    })
}
