use serde::{Deserialize, Serialize};

/// Spherical earth radius in meters used for all distance math (WGS84 equatorial).
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance to `other` in meters (haversine).
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        haversine_distance(*self, *other)
    }

    /// Move `north_m` / `east_m` meters away using a local flat-earth approximation.
    /// Good enough for offsets of a few kilometers.
    pub fn offset(&self, north_m: f64, east_m: f64) -> Coordinate {
        let d_lat = (north_m / EARTH_RADIUS_M).to_degrees();
        let cos_lat = self.latitude.to_radians().cos().max(1e-12);
        let d_lon = (east_m / (EARTH_RADIUS_M * cos_lat)).to_degrees();
        Coordinate::new(self.latitude + d_lat, self.longitude + d_lon)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

impl std::str::FromStr for Coordinate {
    type Err = anyhow::Error;

    /// Parse `"lat,lon"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lon) = s
            .split_once(',')
            .ok_or_else(|| anyhow::anyhow!("expected LAT,LON but got {s:?}"))?;
        let latitude: f64 = lat.trim().parse()?;
        let longitude: f64 = lon.trim().parse()?;
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            anyhow::bail!("coordinate out of range: {s}");
        }
        Ok(Coordinate::new(latitude, longitude))
    }
}

/// Haversine distance between two coordinates in meters.
pub fn haversine_distance(p1: Coordinate, p2: Coordinate) -> f64 {
    let d_lat = (p2.latitude - p1.latitude).to_radians();
    let d_lon = (p2.longitude - p1.longitude).to_radians();
    let lat1 = p1.latitude.to_radians();
    let lat2 = p2.latitude.to_radians();

    let a = f64::sin(d_lat / 2.).powi(2)
        + f64::cos(lat1) * f64::cos(lat2) * f64::sin(d_lon / 2.).powi(2);
    // Rounding can push `a` a hair above 1 for antipodal points.
    let c = 2. * f64::asin(f64::sqrt(a.min(1.0)));

    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hundredth_degree_at_equator() {
        let d = haversine_distance(Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 0.01));
        assert!((d - 1113.0).abs() < 1.0, "got {d}");
    }

    #[test]
    fn same_point_is_zero() {
        let p = Coordinate::new(48.8584, 2.2945);
        assert_eq!(p.distance_to(&p), 0.0);
    }

    #[test]
    fn symmetric() {
        let a = Coordinate::new(52.37, 4.89);
        let b = Coordinate::new(51.92, 4.48);
        assert!((a.distance_to(&b) - b.distance_to(&a)).abs() < 1e-9);
    }

    #[test]
    fn offset_roundtrips_through_distance() {
        let origin = Coordinate::new(45.0, 7.0);
        let moved = origin.offset(300.0, 400.0);
        let d = origin.distance_to(&moved);
        assert!((d - 500.0).abs() < 1.0, "got {d}");
    }

    #[test]
    fn parse_coordinate() {
        let c: Coordinate = "52.1, -4.25".parse().unwrap();
        assert_eq!(c, Coordinate::new(52.1, -4.25));
        assert!("91,0".parse::<Coordinate>().is_err());
        assert!("nonsense".parse::<Coordinate>().is_err());
    }
}
