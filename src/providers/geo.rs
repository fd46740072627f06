//! IP geolocation through ipinfo.io.
//!
//! The service reports rate limiting and invalid addresses through the
//! response body rather than structured error codes, so both are detected by
//! substring match. That contract is brittle: if the service rewords either
//! message, [`interpret`] silently falls through to the generic status/JSON
//! handling.

use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use memchr::memmem;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::distance::Coord;
use crate::pool::Pool;

pub const DEFAULT_SERVICE_URL: &str = "https://ipinfo.io";

/// Upper bound on a single geolocation request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub const NOT_AVAILABLE: &str = "N/A";
pub const INVALID_IP: &str = "Invalid IP";

const RATE_LIMIT_MARKER: &[u8] = b"Rate limit exceeded";
const INVALID_IP_MARKER: &[u8] = b"Please provide a valid IP address";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
  #[error("request failed: {0}")]
  Transport(String),
  #[error("service responded with HTTP {0}")]
  Status(u16),
  #[error("failed to read response body: {0}")]
  Body(String),
  #[error("rate limit exceeded, the geolocation service quota is exhausted")]
  RateLimited,
  #[error("failed to decode response: {0}")]
  Decode(String),
}

/// Geolocation data for one address.
///
/// Mirrors the ipinfo.io JSON object. Missing fields are left empty and
/// unknown ones ignored.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Info {
  pub ip: String,
  pub hostname: String,
  pub city: String,
  pub region: String,
  pub country: String,
  /// `"lat,lon"`
  pub loc: String,
  pub org: String,
  pub postal: String,

  /// Set when the lookup itself failed; the other fields are then empty.
  #[serde(skip)]
  pub error: Option<Error>,
}

impl Info {
  /// A lookup that failed outright.
  #[must_use]
  pub fn failed(ip: IpAddr, error: Error) -> Self {
    Self {
      ip: ip.to_string(),
      error: Some(error),
      ..Self::default()
    }
  }

  /// The service answered, but does not consider `ip` locatable.
  #[must_use]
  pub fn invalid(ip: Option<IpAddr>) -> Self {
    let na = || NOT_AVAILABLE.to_string();
    Self {
      ip: ip.map(|ip| ip.to_string()).unwrap_or_default(),
      hostname: INVALID_IP.to_string(),
      city: na(),
      region: na(),
      country: na(),
      loc: na(),
      org: na(),
      postal: na(),
      error: None,
    }
  }
}

/// Looks up where an address is.
pub trait Locate: Send + Sync + 'static {
  /// `None` asks about the caller's own public address.
  fn locate(
    &self,
    ip: Option<IpAddr>,
  ) -> impl Future<Output = Result<Info, Error>> + Send;
}

/// Client for the ipinfo.io JSON API.
#[derive(Debug, Clone)]
pub struct IpInfo {
  client: Client,
  base_url: String,
}

impl IpInfo {
  #[must_use]
  pub fn new(client: Client, base_url: &str) -> Self {
    Self {
      client,
      base_url: base_url.trim_end_matches('/').to_string(),
    }
  }

  #[must_use]
  pub fn endpoint(&self, ip: Option<IpAddr>) -> String {
    match ip {
      Some(ip) => format!("{}/{ip}/json", self.base_url),
      None => format!("{}/json", self.base_url),
    }
  }
}

impl Locate for IpInfo {
  async fn locate(&self, ip: Option<IpAddr>) -> Result<Info, Error> {
    let url = self.endpoint(ip);

    let response = self
      .client
      .get(&url)
      .timeout(REQUEST_TIMEOUT)
      .send()
      .await
      .map_err(|e| Error::Transport(e.to_string()))?;

    let status = response.status();
    let body = response
      .bytes()
      .await
      .map_err(|e| Error::Body(e.to_string()))?;

    interpret(status, &body, ip)
  }
}

/// Turns a raw service response into an [`Info`].
///
/// # Errors
///
/// - [`Error::RateLimited`] if the body carries the rate-limit message
/// - [`Error::Status`] for any other non-2xx status
/// - [`Error::Decode`] if a 2xx body is not the expected JSON object
pub fn interpret(
  status: StatusCode,
  body: &[u8],
  ip: Option<IpAddr>,
) -> Result<Info, Error> {
  if memmem::find(body, RATE_LIMIT_MARKER).is_some() {
    return Err(Error::RateLimited);
  }
  if memmem::find(body, INVALID_IP_MARKER).is_some() {
    return Ok(Info::invalid(ip));
  }
  if !status.is_success() {
    return Err(Error::Status(status.as_u16()));
  }

  let mut info: Info =
    serde_json::from_slice(body).map_err(|e| Error::Decode(e.to_string()))?;
  if let Some(ip) = ip {
    info.ip = ip.to_string();
  }
  Ok(info)
}

/// Geolocates every address on `pool`, one [`Info`] per address.
pub async fn locate_all<L: Locate>(
  pool: &Pool,
  locator: Arc<L>,
  ips: Vec<IpAddr>,
) -> Vec<Info> {
  pool
    .run(ips, move |ip: IpAddr| {
      let locator = Arc::clone(&locator);
      async move {
        match locator.locate(Some(ip)).await {
          Ok(info) => info,
          Err(e) => {
            debug!(%ip, "geolocation lookup failed: {e}");
            Info::failed(ip, e)
          }
        }
      }
    })
    .await
}

/// The caller's own location: the reference point for every distance.
#[derive(Debug, Clone)]
pub struct Origin {
  pub info: Info,
  /// `None` when `loc` is not a coordinate at all. The placeholder location
  /// is a real coordinate here.
  pub coord: Option<Coord>,
}

impl Origin {
  /// The reference point, for runs that compute distances.
  ///
  /// # Errors
  ///
  /// Fails if the service answered without a usable coordinate.
  pub fn reference(&self) -> anyhow::Result<Coord> {
    self.coord.ok_or_else(|| {
      anyhow!(
        "Failed to determine your own location: unusable coordinates {:?}",
        self.info.loc
      )
    })
  }
}

/// Asks the service where the caller is.
///
/// # Errors
///
/// Fails if the request fails.
pub async fn locate_self<L: Locate>(locator: &L) -> anyhow::Result<Origin> {
  let info = locator
    .locate(None)
    .await
    .context("Failed to determine your own location")?;
  let coord = Coord::parse(&info.loc);
  Ok(Origin { info, coord })
}
