//! Great-circle distance between two coordinates, in miles.

use serde::{Deserialize, Serialize};

/// `loc` value the geolocation service returns when it cannot place an
/// address. Treated as "no location".
pub const PLACEHOLDER_LOC: &str = "37.7510,-97.8220";

const METERS_PER_MILE: f64 = 1609.344;

/// Mean Earth radius used by the haversine formula, in meters.
const EARTH_RADIUS_M: f64 = 6_378_100.0;

// WGS-84 ellipsoid
const WGS84_A: f64 = 6_378_137.0;
const WGS84_B: f64 = 6_356_752.314_2;
const WGS84_F: f64 = 1.0 / 298.257_223_563;

const VINCENTY_TOLERANCE: f64 = 1e-12;
const VINCENTY_MAX_ITERATIONS: u32 = 20;

/// A point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coord {
  pub lat: f64,
  pub lon: f64,
}

impl Coord {
  #[must_use]
  pub const fn new(lat: f64, lon: f64) -> Self {
    Self { lat, lon }
  }

  /// Parses `"lat,lon"` as is, placeholder included.
  ///
  /// Returns `None` for the empty string, non-numeric parts and
  /// out-of-range values.
  #[must_use]
  pub fn parse(loc: &str) -> Option<Self> {
    let (lat, lon) = loc.trim().split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lon: f64 = lon.trim().parse().ok()?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
      return None;
    }
    Some(Self { lat, lon })
  }

  /// Parses a looked-up address's `loc`. The placeholder location counts
  /// as no location.
  #[must_use]
  pub fn parse_loc(loc: &str) -> Option<Self> {
    if loc.trim() == PLACEHOLDER_LOC {
      return None;
    }
    Self::parse(loc)
  }
}

/// Which distance formula to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Formula {
  /// Spherical earth. Always yields a value.
  #[default]
  Haversine,
  /// WGS-84 ellipsoid. Yields nothing for coincident points or when the
  /// iteration does not converge.
  Vincenty,
}

impl Formula {
  #[must_use]
  pub fn miles(self, from: Coord, to: Coord) -> Option<f64> {
    match self {
      Self::Haversine => Some(haversine(from, to)),
      Self::Vincenty => vincenty(from, to),
    }
  }
}

/// Haversine distance in miles.
#[must_use]
pub fn haversine(from: Coord, to: Coord) -> f64 {
  let lat1 = from.lat.to_radians();
  let lat2 = to.lat.to_radians();
  let dlat = lat2 - lat1;
  let dlon = (to.lon - from.lon).to_radians();

  let h = (dlat / 2.0).sin().powi(2)
    + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
  // rounding can push h a hair above 1 for antipodal points
  let c = 2.0 * h.sqrt().min(1.0).asin();

  EARTH_RADIUS_M * c / METERS_PER_MILE
}

/// Vincenty inverse distance in miles on the WGS-84 ellipsoid.
#[must_use]
pub fn vincenty(from: Coord, to: Coord) -> Option<f64> {
  let l = (to.lon - from.lon).to_radians();
  let u1 = ((1.0 - WGS84_F) * from.lat.to_radians().tan()).atan();
  let u2 = ((1.0 - WGS84_F) * to.lat.to_radians().tan()).atan();
  let (sin_u1, cos_u1) = u1.sin_cos();
  let (sin_u2, cos_u2) = u2.sin_cos();

  let mut lambda = l;
  let mut converged = false;

  let (mut sin_sigma, mut cos_sigma, mut sigma) = (0.0, 0.0, 0.0);
  let (mut cos_sq_alpha, mut cos_2sigma_m) = (0.0, 0.0);

  for _ in 0..VINCENTY_MAX_ITERATIONS {
    let (sin_lambda, cos_lambda) = lambda.sin_cos();
    sin_sigma = ((cos_u2 * sin_lambda).powi(2)
      + (cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda).powi(2))
    .sqrt();
    if sin_sigma == 0.0 {
      return None;
    }

    cos_sigma = sin_u1 * sin_u2 + cos_u1 * cos_u2 * cos_lambda;
    sigma = sin_sigma.atan2(cos_sigma);
    let sin_alpha = cos_u1 * cos_u2 * sin_lambda / sin_sigma;
    cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
    // equatorial line
    cos_2sigma_m = if cos_sq_alpha == 0.0 {
      0.0
    } else {
      cos_sigma - 2.0 * sin_u1 * sin_u2 / cos_sq_alpha
    };

    let c = WGS84_F / 16.0
      * cos_sq_alpha
      * (4.0 + WGS84_F * (4.0 - 3.0 * cos_sq_alpha));
    let previous = lambda;
    lambda = l
      + (1.0 - c)
        * WGS84_F
        * sin_alpha
        * (sigma
          + c
            * sin_sigma
            * (cos_2sigma_m
              + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m.powi(2))));

    if (lambda - previous).abs() <= VINCENTY_TOLERANCE {
      converged = true;
      break;
    }
  }

  if !converged {
    return None;
  }

  let u_sq = cos_sq_alpha * (WGS84_A.powi(2) - WGS84_B.powi(2)) / WGS84_B.powi(2);
  let a = 1.0
    + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
  let b = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));
  let delta_sigma = b
    * sin_sigma
    * (cos_2sigma_m
      + b / 4.0
        * (cos_sigma * (-1.0 + 2.0 * cos_2sigma_m.powi(2))
          - b / 6.0
            * cos_2sigma_m
            * (-3.0 + 4.0 * sin_sigma.powi(2))
            * (-3.0 + 4.0 * cos_2sigma_m.powi(2))));

  let meters = WGS84_B * a * (sigma - delta_sigma);
  Some(meters / METERS_PER_MILE)
}

#[cfg(test)]
mod tests {
  use super::*;

  const ASHBURN: Coord = Coord::new(39.0481, -77.4728);
  const SAN_JOSE: Coord = Coord::new(37.3382, -121.8863);

  #[test]
  fn test_identical_points_are_zero() {
    for p in [ASHBURN, SAN_JOSE, Coord::new(0.0, 0.0), Coord::new(-90.0, 0.0)]
    {
      assert!(haversine(p, p).abs() < f64::EPSILON);
    }
  }

  #[test]
  fn test_haversine_is_symmetric() {
    let there = haversine(ASHBURN, SAN_JOSE);
    let back = haversine(SAN_JOSE, ASHBURN);
    assert!((there - back).abs() < 1e-9);
  }

  #[test]
  fn test_haversine_known_distance() {
    let miles = haversine(ASHBURN, SAN_JOSE);
    assert!((miles - 2393.2).abs() < 1.0, "got {miles}");
  }

  #[test]
  fn test_haversine_antipodal_is_finite() {
    let miles = haversine(Coord::new(0.0, 0.0), Coord::new(0.0, 180.0));
    assert!(miles.is_finite());
    // half the circumference of a 6378.1 km sphere
    assert!((miles - 12_450.66).abs() < 1.0, "got {miles}");
  }

  #[test]
  fn test_vincenty_known_distance() {
    let miles = vincenty(ASHBURN, SAN_JOSE).expect("should converge");
    assert!((miles - 2396.25).abs() < 1.0, "got {miles}");
  }

  #[test]
  fn test_vincenty_coincident_points_unavailable() {
    assert_eq!(vincenty(ASHBURN, ASHBURN), None);
    assert_eq!(Formula::Vincenty.miles(SAN_JOSE, SAN_JOSE), None);
  }

  #[test]
  fn test_vincenty_nearly_antipodal_does_not_converge() {
    assert_eq!(vincenty(Coord::new(0.0, 0.0), Coord::new(0.5, 179.7)), None);
  }

  #[test]
  fn test_haversine_formula_always_yields() {
    assert_eq!(Formula::Haversine.miles(ASHBURN, ASHBURN), Some(0.0));
  }

  #[test]
  fn test_parse_loc() {
    assert_eq!(
      Coord::parse_loc("39.0481,-77.4728"),
      Some(Coord::new(39.0481, -77.4728))
    );
    assert_eq!(Coord::parse_loc(" 1.5 , 2.5 "), Some(Coord::new(1.5, 2.5)));
  }

  #[test]
  fn test_parse_loc_rejects_placeholder_and_garbage() {
    for loc in [PLACEHOLDER_LOC, "", "N/A", "12.0", "a,b", "91,0", "0,181"] {
      assert_eq!(Coord::parse_loc(loc), None, "{loc:?} should not parse");
    }
  }

  #[test]
  fn test_parse_accepts_placeholder() {
    assert_eq!(Coord::parse(PLACEHOLDER_LOC), Some(Coord::new(37.751, -97.822)));
    for loc in ["", "N/A", "a,b", "91,0"] {
      assert_eq!(Coord::parse(loc), None, "{loc:?} should not parse");
    }
  }
}
