//! Maidenhead locator and UTM projection helpers.
//!
//! The teacher's Python original leans on the third-party `maidenhead` and
//! `utm` packages (see `examples/original_source/src/geodata.py`); there's
//! no equivalent crate in the workspace's dependency stack, so these are
//! small, well-tested, pure-function reimplementations of the same
//! well-known algorithms, in the "pure computational helper" style of
//! `geomatch`.

/// Compute a Maidenhead grid-square locator string at the given precision
/// (number of field/pair groups; spec.md calls for precision 4, i.e. two
/// letter pairs plus two digit pairs, e.g. `"JO43oe"`).
///
/// Returns `None` for out-of-range coordinates, mirroring the Python
/// original's `abs(int(latitude)) <= 90 and abs(int(longitude)) <= 180`
/// guard.
pub fn to_maidenhead(latitude: f64, longitude: f64, precision: usize) -> Option<String> {
    if latitude.abs() > 90.0 || longitude.abs() > 180.0 {
        return None;
    }

    let mut lon = longitude + 180.0;
    let mut lat = latitude + 90.0;

    const FIELD: f64 = 20.0;
    const SQUARE: f64 = 2.0;
    const SUBSQUARE: f64 = FIELD / 24.0;

    let mut locator = String::new();

    // Field: 20-degree-wide letter pairs A-R.
    let lon_field = (lon / FIELD).floor() as u32;
    let lat_field = (lat / FIELD).floor() as u32;
    locator.push((b'A' + lon_field as u8) as char);
    locator.push((b'A' + lat_field as u8) as char);
    lon -= lon_field as f64 * FIELD;
    lat -= lat_field as f64 * FIELD;

    if precision >= 2 {
        let lon_square = (lon / SQUARE).floor() as u32;
        let lat_square = (lat / SQUARE).floor() as u32;
        locator.push_str(&lon_square.to_string());
        locator.push_str(&lat_square.to_string());
        lon -= lon_square as f64 * SQUARE;
        lat -= lat_square as f64 * SQUARE;
    }

    if precision >= 3 {
        let lon_sub = (lon / SUBSQUARE).floor() as u32;
        let lat_sub = (lat / (SQUARE / 24.0)).floor() as u32;
        locator.push((b'a' + lon_sub.min(23) as u8) as char);
        locator.push((b'a' + lat_sub.min(23) as u8) as char);
    }

    if precision >= 4 {
        // Recompute the sub-square remainder to extract the extended pair.
        let lon_sub_size = SUBSQUARE;
        let lat_sub_size = SQUARE / 24.0;
        let lon_sub = (lon / lon_sub_size).floor();
        let lat_sub = (lat / lat_sub_size).floor();
        let lon_rem = lon - lon_sub * lon_sub_size;
        let lat_rem = lat - lat_sub * lat_sub_size;
        let lon_digit = (lon_rem / (lon_sub_size / 10.0)).floor() as u32;
        let lat_digit = (lat_rem / (lat_sub_size / 10.0)).floor() as u32;
        locator.push_str(&lon_digit.min(9).to_string());
        locator.push_str(&lat_digit.min(9).to_string());
    }

    Some(locator)
}

/// The result of projecting a lat/lon pair into UTM coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Utm {
    pub zone_number: u8,
    pub zone_letter: char,
    pub easting: i64,
    pub northing: i64,
}

impl std::fmt::Display for Utm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{} {} {}",
            self.zone_number, self.zone_letter, self.easting, self.northing
        )
    }
}

/// The standard UTM latitude-band letters, south to north, skipping `I` and
/// `O`.
const LAT_BANDS: &[u8] = b"CDEFGHJKLMNPQRSTUVWXX";

fn utm_zone_number(latitude: f64, longitude: f64) -> u8 {
    // Norway/Svalbard exceptions, same as the reference `utm` package.
    if (56.0..64.0).contains(&latitude) && (3.0..12.0).contains(&longitude) {
        return 32;
    }
    if (72.0..84.0).contains(&latitude) {
        if (0.0..9.0).contains(&longitude) {
            return 31;
        } else if (9.0..21.0).contains(&longitude) {
            return 33;
        } else if (21.0..33.0).contains(&longitude) {
            return 35;
        } else if (33.0..42.0).contains(&longitude) {
            return 37;
        }
    }
    (((longitude + 180.0) / 6.0).floor() as i64 + 1).clamp(1, 60) as u8
}

fn utm_zone_letter(latitude: f64) -> char {
    if !(-80.0..=84.0).contains(&latitude) {
        return 'Z';
    }
    let index = ((latitude + 80.0) / 8.0).floor() as usize;
    LAT_BANDS[index.min(LAT_BANDS.len() - 1)] as char
}

/// Project `(latitude, longitude)` into UTM, rounding easting/northing to
/// the nearest meter (matching the Python original's `round()` calls).
pub fn to_utm(latitude: f64, longitude: f64) -> Utm {
    const K0: f64 = 0.9996;
    const A: f64 = 6_378_137.0;
    const E: f64 = 0.081_819_190_842_6;
    let e2 = E * E;
    let e_p2 = e2 / (1.0 - e2);

    let zone_number = utm_zone_number(latitude, longitude);
    let zone_letter = utm_zone_letter(latitude);
    let lon_origin = ((zone_number as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians();

    let lat_rad = latitude.to_radians();
    let lon_rad = longitude.to_radians();

    let n = A / (1.0 - e2 * lat_rad.sin().powi(2)).sqrt();
    let t = lat_rad.tan().powi(2);
    let c = e_p2 * lat_rad.cos().powi(2);
    let a = lat_rad.cos() * (lon_rad - lon_origin);

    let m = A
        * ((1.0 - e2 / 4.0 - 3.0 * e2 * e2 / 64.0 - 5.0 * e2 * e2 * e2 / 256.0) * lat_rad
            - (3.0 * e2 / 8.0 + 3.0 * e2 * e2 / 32.0 + 45.0 * e2 * e2 * e2 / 1024.0)
                * (2.0 * lat_rad).sin()
            + (15.0 * e2 * e2 / 256.0 + 45.0 * e2 * e2 * e2 / 1024.0) * (4.0 * lat_rad).sin()
            - (35.0 * e2 * e2 * e2 / 3072.0) * (6.0 * lat_rad).sin());

    let easting = K0
        * n
        * (a + (1.0 - t + c) * a.powi(3) / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * e_p2) * a.powi(5) / 120.0)
        + 500_000.0;

    let mut northing = K0
        * (m
            + n * lat_rad.tan()
                * (a * a / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * e_p2) * a.powi(6)
                        / 720.0));
    if latitude < 0.0 {
        northing += 10_000_000.0;
    }

    Utm {
        zone_number,
        zone_letter,
        easting: easting.round() as i64,
        northing: northing.round() as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maidenhead_out_of_range_is_none() {
        assert_eq!(to_maidenhead(91.0, 0.0, 4), None);
        assert_eq!(to_maidenhead(0.0, 181.0, 4), None);
    }

    #[test]
    fn maidenhead_produces_a_well_formed_locator() {
        // Augsburg, Germany, roughly.
        let locator = to_maidenhead(48.4781, 10.774, 4).unwrap();
        assert_eq!(locator.len(), 6);
        assert!(locator.starts_with("JN"));
    }

    #[test]
    fn utm_zone_number_matches_known_points() {
        // Augsburg is UTM zone 32.
        assert_eq!(utm_zone_number(48.4781, 10.774), 32);
    }

    #[test]
    fn utm_zone_letter_is_northern_band_for_germany() {
        assert_eq!(utm_zone_letter(48.4781), 'U');
    }

    #[test]
    fn utm_projects_to_plausible_magnitudes() {
        let utm = to_utm(48.4781, 10.774);
        assert_eq!(utm.zone_number, 32);
        assert_eq!(utm.zone_letter, 'U');
        // Easting is always in [100_000, 900_000] within a zone; northing is
        // positive in the northern hemisphere.
        assert!(utm.easting > 100_000 && utm.easting < 900_000);
        assert!(utm.northing > 0);
    }
}
