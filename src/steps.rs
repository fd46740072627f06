use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use serde::{Serialize, Serializer};
use tracing::{debug, info};

use crate::aggregate::{self, Row};
use crate::distance::Formula;
use crate::normalize;
use crate::pool::{Pool, DEFAULT_WORKERS};
use crate::providers::dns::{self, Resolve};
use crate::providers::geo::{self, Locate, DEFAULT_SERVICE_URL};

/// Run parameters, passed explicitly into the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
  /// Upper bound on concurrent lookups in each stage.
  pub workers: usize,
  pub service_url: String,
  pub formula: Formula,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      workers: DEFAULT_WORKERS,
      service_url: DEFAULT_SERVICE_URL.to_string(),
      formula: Formula::default(),
    }
  }
}

/// An address whose geolocation lookup failed.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GeoFailure {
  pub ip: String,
  /// Inputs that resolved to this address.
  pub inputs: Vec<String>,
  pub reason: String,
  pub rate_limited: bool,
}

/// Everything a run produced.
#[derive(Debug, Serialize)]
pub struct Report {
  /// Where the caller is.
  pub origin: geo::Info,
  pub rows: Vec<Row>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub dns_failures: Vec<dns::Failure>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub geo_failures: Vec<GeoFailure>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub warnings: Vec<String>,
  #[serde(rename = "elapsed_secs", serialize_with = "as_secs")]
  pub elapsed: Duration,
}

impl Report {
  #[must_use]
  pub fn rate_limited(&self) -> bool {
    self.geo_failures.iter().any(|f| f.rate_limited)
  }
}

fn as_secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
  s.serialize_f64(d.as_secs_f64())
}

/// Resolves and geolocates every input, measuring distances from the
/// caller's own location.
///
/// The caller's location is looked up while DNS resolution runs. DNS has to
/// finish before geolocation starts, since only then is the set of unique
/// addresses known. With no inputs, the caller's own address is looked up
/// first and becomes the only input.
///
/// # Errors
///
/// Fails only if the caller's own location cannot be determined or is not a
/// coordinate. Per-input failures end up in the report.
pub async fn run_pipeline<R: Resolve, L: Locate>(
  inputs: &[String],
  resolver: Arc<R>,
  locator: Arc<L>,
  settings: &Settings,
) -> Result<Report> {
  let started = Instant::now();
  let pool = Pool::new(settings.workers);

  let (origin, outcomes) = if inputs.is_empty() {
    // nothing given: the caller's own address is the only target
    let origin = geo::locate_self(locator.as_ref()).await?;
    debug!(ip = %origin.info.ip, "no targets, using own address");
    let own = [origin.info.ip.clone()];
    let outcomes =
      dns::resolve_all(&pool, resolver, normalize::targets(&own)).await;
    (origin, outcomes)
  } else {
    let (origin, outcomes) = tokio::join!(
      geo::locate_self(locator.as_ref()),
      dns::resolve_all(&pool, resolver, normalize::targets(inputs)),
    );
    (origin?, outcomes)
  };
  let reference = origin.reference()?;

  let resolution = dns::aggregate(outcomes);
  debug!(
    unique = resolution.ips.len(),
    failed = resolution.failures.len(),
    "DNS stage done"
  );

  let infos =
    geo::locate_all(&pool, locator, resolution.ips.clone()).await;
  let geo_failures = failures(&infos, &resolution.index);

  let aggregate::Aggregate { rows, warnings } = aggregate::rows(
    &infos,
    &resolution.index,
    reference,
    settings.formula,
  );

  let elapsed = started.elapsed();
  info!(rows = rows.len(), ?elapsed, "run complete");

  Ok(Report {
    origin: origin.info,
    rows,
    dns_failures: resolution.failures,
    geo_failures,
    warnings,
    elapsed,
  })
}

/// Only looks up the caller's own address. No coordinate is needed, so an
/// unusable `loc` is shown as it came.
///
/// # Errors
///
/// Fails if the caller's own address cannot be looked up.
pub async fn external_ip<L: Locate>(locator: &L) -> Result<Report> {
  let started = Instant::now();
  let origin = geo::locate_self(locator).await?;
  Ok(Report {
    origin: origin.info,
    rows: Vec::new(),
    dns_failures: Vec::new(),
    geo_failures: Vec::new(),
    warnings: Vec::new(),
    elapsed: started.elapsed(),
  })
}

fn failures(
  infos: &[geo::Info],
  index: &HashMap<IpAddr, Vec<String>>,
) -> Vec<GeoFailure> {
  let mut failures: Vec<GeoFailure> = infos
    .iter()
    .filter_map(|info| {
      let error = info.error.as_ref()?;
      let inputs = info
        .ip
        .parse::<IpAddr>()
        .ok()
        .and_then(|ip| index.get(&ip).cloned())
        .unwrap_or_default();
      Some(GeoFailure {
        ip: info.ip.clone(),
        inputs,
        reason: error.to_string(),
        rate_limited: matches!(error, geo::Error::RateLimited),
      })
    })
    .collect();
  failures.sort_by(|a, b| a.ip.cmp(&b.ip));
  failures
}
