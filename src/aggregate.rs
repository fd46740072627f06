//! Joins per-address geolocation back onto the user's inputs.

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;

use serde::{Serialize, Serializer};
use tracing::warn;

use crate::distance::{Coord, Formula};
use crate::providers::geo::{self, NOT_AVAILABLE};

/// Distance from the caller, if one could be computed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Distance {
  Miles(f64),
  Unavailable,
}

impl fmt::Display for Distance {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Miles(miles) => write!(f, "{miles:.2}"),
      Self::Unavailable => f.write_str(NOT_AVAILABLE),
    }
  }
}

impl Serialize for Distance {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match self {
      Self::Miles(miles) => serializer.serialize_f64(*miles),
      Self::Unavailable => serializer.serialize_str(NOT_AVAILABLE),
    }
  }
}

/// One line of the report: an input and where its address is.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Row {
  pub input: String,
  pub ip: String,
  pub hostname: String,
  pub org: String,
  pub city: String,
  pub region: String,
  pub country: String,
  pub loc: String,
  pub distance: Distance,
}

#[derive(Debug, Default)]
pub struct Aggregate {
  /// Sorted by input.
  pub rows: Vec<Row>,
  pub warnings: Vec<String>,
}

/// Builds report rows from geolocation results.
///
/// Failed lookups and IPv6 addresses produce no rows. An address without a
/// usable location keeps its row but gets `N/A` for city, region, location
/// and distance. Every input that resolved to an address gets its own row.
#[must_use]
pub fn rows(
  infos: &[geo::Info],
  index: &HashMap<IpAddr, Vec<String>>,
  origin: Coord,
  formula: Formula,
) -> Aggregate {
  let mut aggregate = Aggregate::default();

  for info in infos {
    if info.error.is_some() || info.ip.contains(':') {
      continue;
    }

    let inputs = info
      .ip
      .parse::<IpAddr>()
      .ok()
      .and_then(|ip| index.get(&ip))
      .filter(|inputs| !inputs.is_empty());
    let Some(inputs) = inputs else {
      warn!(ip = %info.ip, "no input maps to this address");
      aggregate
        .warnings
        .push(format!("No input maps to address {:?}", info.ip));
      continue;
    };

    let (city, region, loc, distance) = match Coord::parse_loc(&info.loc) {
      Some(coord) => (
        info.city.clone(),
        info.region.clone(),
        info.loc.clone(),
        formula
          .miles(origin, coord)
          .map_or(Distance::Unavailable, Distance::Miles),
      ),
      None => (
        NOT_AVAILABLE.to_string(),
        NOT_AVAILABLE.to_string(),
        NOT_AVAILABLE.to_string(),
        Distance::Unavailable,
      ),
    };

    for input in inputs {
      aggregate.rows.push(Row {
        input: input.clone(),
        ip: info.ip.clone(),
        hostname: info.hostname.clone(),
        org: info.org.clone(),
        city: city.clone(),
        region: region.clone(),
        country: info.country.clone(),
        loc: loc.clone(),
        distance,
      });
    }
  }

  // stable: ties keep the order above
  aggregate.rows.sort_by(|a, b| a.input.cmp(&b.input));
  aggregate
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::distance::PLACEHOLDER_LOC;

  const HOME: Coord = Coord::new(39.0481, -77.4728);

  fn info(ip: &str, loc: &str) -> geo::Info {
    geo::Info {
      ip: ip.to_string(),
      hostname: format!("host-{ip}"),
      city: "San Jose".to_string(),
      region: "California".to_string(),
      country: "US".to_string(),
      loc: loc.to_string(),
      org: "AS0 Example".to_string(),
      ..geo::Info::default()
    }
  }

  fn index(entries: &[(&str, &str)]) -> HashMap<IpAddr, Vec<String>> {
    let mut index: HashMap<IpAddr, Vec<String>> = HashMap::new();
    for (ip, input) in entries {
      index
        .entry(ip.parse().unwrap())
        .or_default()
        .push((*input).to_string());
    }
    index
  }

  #[test]
  fn test_distance_is_computed_from_origin() {
    let infos = [info("1.1.1.1", "37.3382,-121.8863")];
    let idx = index(&[("1.1.1.1", "one.example")]);

    let agg = rows(&infos, &idx, HOME, Formula::Haversine);

    assert_eq!(agg.rows.len(), 1);
    let row = &agg.rows[0];
    assert_eq!(row.input, "one.example");
    assert_eq!(row.city, "San Jose");
    match row.distance {
      Distance::Miles(m) => assert!((m - 2393.2).abs() < 1.0, "got {m}"),
      Distance::Unavailable => panic!("distance should be available"),
    }
    assert!(agg.warnings.is_empty());
  }

  #[test]
  fn test_placeholder_and_missing_loc_are_not_available() {
    let infos = [info("1.1.1.1", PLACEHOLDER_LOC), info("2.2.2.2", "")];
    let idx = index(&[("1.1.1.1", "a"), ("2.2.2.2", "b")]);

    let agg = rows(&infos, &idx, HOME, Formula::Haversine);

    assert_eq!(agg.rows.len(), 2);
    for row in &agg.rows {
      assert_eq!(row.distance, Distance::Unavailable);
      assert_eq!(row.distance.to_string(), "N/A");
      assert_eq!(row.city, "N/A");
      assert_eq!(row.region, "N/A");
      assert_eq!(row.loc, "N/A");
      assert_eq!(row.country, "US");
    }
  }

  #[test]
  fn test_invalid_ip_sentinel_is_reported() {
    let addr: IpAddr = "0.0.0.0".parse().unwrap();
    let infos = [geo::Info::invalid(Some(addr))];
    let idx = index(&[("0.0.0.0", "0.0.0.0")]);

    let agg = rows(&infos, &idx, HOME, Formula::Haversine);

    assert_eq!(agg.rows.len(), 1);
    assert_eq!(agg.rows[0].hostname, geo::INVALID_IP);
    assert_eq!(agg.rows[0].distance, Distance::Unavailable);
  }

  #[test]
  fn test_failed_lookups_and_ipv6_are_skipped() {
    let v6: IpAddr = "2001:db8::1".parse().unwrap();
    let failed: IpAddr = "3.3.3.3".parse().unwrap();
    let infos = [
      info("2001:db8::1", "1.0,1.0"),
      geo::Info::failed(failed, geo::Error::RateLimited),
      info("4.4.4.4", "1.0,1.0"),
    ];
    let mut idx = index(&[("3.3.3.3", "x.example"), ("4.4.4.4", "x.example")]);
    idx.insert(v6, vec!["x.example".to_string()]);

    let agg = rows(&infos, &idx, HOME, Formula::Haversine);

    assert_eq!(agg.rows.len(), 1);
    assert_eq!(agg.rows[0].ip, "4.4.4.4");
    assert!(agg.warnings.is_empty());
  }

  #[test]
  fn test_missing_index_entry_warns() {
    let infos = [info("5.5.5.5", "1.0,1.0")];
    let agg = rows(&infos, &HashMap::new(), HOME, Formula::Haversine);
    assert!(agg.rows.is_empty());
    assert_eq!(agg.warnings.len(), 1);
    assert!(agg.warnings[0].contains("5.5.5.5"));
  }

  #[test]
  fn test_one_row_per_input_sorted_and_stable() {
    let infos = [info("2.2.2.2", "2.0,2.0"), info("1.1.1.1", "1.0,1.0")];
    let idx = index(&[
      ("2.2.2.2", "user@github.com"),
      ("2.2.2.2", "https://cisco.com"),
      ("1.1.1.1", "user@github.com"),
      ("1.1.1.1", "1.2.3.4"),
    ]);

    let agg = rows(&infos, &idx, HOME, Formula::Haversine);

    let order: Vec<(&str, &str)> = agg
      .rows
      .iter()
      .map(|r| (r.input.as_str(), r.ip.as_str()))
      .collect();
    assert_eq!(
      order,
      [
        ("1.2.3.4", "1.1.1.1"),
        ("https://cisco.com", "2.2.2.2"),
        ("user@github.com", "2.2.2.2"),
        ("user@github.com", "1.1.1.1"),
      ]
    );
  }

  #[test]
  fn test_vincenty_coincident_point_is_not_available() {
    let infos = [info("1.1.1.1", "39.0481,-77.4728")];
    let idx = index(&[("1.1.1.1", "here")]);

    let vincenty = rows(&infos, &idx, HOME, Formula::Vincenty);
    let haversine = rows(&infos, &idx, HOME, Formula::Haversine);

    assert_eq!(vincenty.rows[0].distance, Distance::Unavailable);
    assert_eq!(vincenty.rows[0].city, "San Jose");
    assert_eq!(haversine.rows[0].distance, Distance::Miles(0.0));
  }

  #[test]
  fn test_distance_serializes_as_number_or_na() {
    let json = serde_json::to_string(&[
      Distance::Miles(12.5),
      Distance::Unavailable,
    ])
    .unwrap();
    assert_eq!(json, r#"[12.5,"N/A"]"#);
    assert_eq!(Distance::Miles(2393.2049).to_string(), "2393.20");
  }
}
