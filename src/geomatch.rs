//! Point-in-polygon matching against a MOWAS warning area.
//!
//! Pure, synchronous, no I/O — the kind of small heavily-unit-tested helper
//! the rest of this crate leans on (compare `addresses::extract_from_record`
//! in the teacher crate).

use anyhow::{format_err, Context};

use crate::Result;

/// Parse a MOWAS `polygon[0]` string (`"lon,lat lon,lat ..."`) into
/// `(lat, lon)` pairs.
///
/// The ring may or may not be explicitly closed (first point repeated as the
/// last); we don't require either form, since [`point_in_polygon`] tolerates
/// both.
pub fn parse_polygon(polygon_str: &str) -> Result<Vec<(f64, f64)>> {
    let mut points = Vec::new();
    for token in polygon_str.split_whitespace() {
        let (lon_str, lat_str) = token
            .split_once(',')
            .ok_or_else(|| format_err!("malformed polygon vertex {:?}", token))?;
        let lon: f64 = lon_str
            .parse()
            .with_context(|| format!("malformed longitude in {:?}", token))?;
        let lat: f64 = lat_str
            .parse()
            .with_context(|| format!("malformed latitude in {:?}", token))?;
        points.push((lat, lon));
    }
    if points.len() < 3 {
        return Err(format_err!(
            "polygon ring must have at least 3 vertices, found {}",
            points.len()
        ));
    }
    Ok(points)
}

/// Does `point` (as `(lat, lon)`) lie inside or on the boundary of the ring
/// described by `polygon` (also `(lat, lon)` pairs)?
///
/// Accepts both open rings (first vertex implicitly repeated as the last)
/// and closed ones (first vertex literally repeated) — both forms are
/// treated identically, since the ray-casting walk below already wraps the
/// index around to vertex 0.
pub fn point_in_polygon(polygon: &[(f64, f64)], point: (f64, f64)) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    if on_boundary(polygon, point) {
        return true;
    }

    let (py, px) = point;
    let mut inside = false;
    let n = polygon.len();
    let mut j = n - 1;
    for i in 0..n {
        let (yi, xi) = polygon[i];
        let (yj, xj) = polygon[j];
        let intersects = ((yi > py) != (yj > py))
            && (px < (xj - xi) * (py - yi) / (yj - yi) + xi);
        if intersects {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Is `point` on one of the polygon's edges (within floating-point
/// tolerance)?
fn on_boundary(polygon: &[(f64, f64)], point: (f64, f64)) -> bool {
    const EPS: f64 = 1e-9;
    let n = polygon.len();
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];
        if point_on_segment(a, b, point, EPS) {
            return true;
        }
    }
    false
}

fn point_on_segment(a: (f64, f64), b: (f64, f64), p: (f64, f64), eps: f64) -> bool {
    let cross = (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0);
    if cross.abs() > eps {
        return false;
    }
    let min_y = a.0.min(b.0) - eps;
    let max_y = a.0.max(b.0) + eps;
    let min_x = a.1.min(b.1) - eps;
    let max_x = a.1.max(b.1) + eps;
    p.0 >= min_y && p.0 <= max_y && p.1 >= min_x && p.1 <= max_x
}

/// Does any of `points` fall inside or on `polygon`?
pub fn any_point_matches(polygon: &[(f64, f64)], points: &[(f64, f64)]) -> bool {
    points.iter().any(|&p| point_in_polygon(polygon, p))
}
