use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use hickory_resolver::{Resolver, TokioResolver};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::normalize::Target;
use crate::pool::Pool;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
  #[error("lookup failed: {0}")]
  Lookup(String),
  #[error("no addresses found")]
  NoAddresses,
}

/// Hostname to address resolution.
pub trait Resolve: Send + Sync + 'static {
  /// Resolves `host` to its A and AAAA addresses. IP literals resolve to
  /// themselves.
  fn lookup_host(
    &self,
    host: &str,
  ) -> impl Future<Output = Result<Vec<IpAddr>, Error>> + Send;
}

/// Resolver configured from the host's system resolver settings.
#[derive(Clone)]
pub struct SystemResolver {
  inner: TokioResolver,
}

impl SystemResolver {
  /// # Errors
  ///
  /// Returns an error if the system resolver configuration cannot be read.
  pub fn new() -> Result<Self> {
    let inner = Resolver::builder_tokio()
      .context("Failed to read system DNS configuration")?
      .build();
    Ok(Self { inner })
  }
}

impl Resolve for SystemResolver {
  async fn lookup_host(&self, host: &str) -> Result<Vec<IpAddr>, Error> {
    let ips = self
      .inner
      .lookup_ip(host)
      .await
      .map_err(|e| Error::Lookup(e.to_string()))?;
    Ok(ips.iter().collect())
  }
}

/// Result of resolving one target.
#[derive(Debug, Clone)]
pub struct Outcome {
  pub target: Target,
  pub addresses: Vec<IpAddr>,
  pub error: Option<Error>,
}

impl Outcome {
  fn new(target: Target, result: Result<Vec<IpAddr>, Error>) -> Self {
    match result {
      Ok(addresses) if addresses.is_empty() => Self {
        target,
        addresses,
        error: Some(Error::NoAddresses),
      },
      Ok(addresses) => Self {
        target,
        addresses,
        error: None,
      },
      Err(e) => Self {
        target,
        addresses: Vec::new(),
        error: Some(e),
      },
    }
  }
}

/// A target that did not resolve.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Failure {
  pub input: String,
  pub host: String,
  pub reason: String,
}

/// Unique addresses plus the inputs that led to each of them.
#[derive(Debug, Default)]
pub struct Resolution {
  /// Every distinct address, in first-seen order.
  pub ips: Vec<IpAddr>,
  /// Address to the distinct inputs that resolved to it, in command-line
  /// order.
  pub index: HashMap<IpAddr, Vec<String>>,
  pub failures: Vec<Failure>,
}

/// Resolves every target on `pool`, one outcome per target.
pub async fn resolve_all<R: Resolve>(
  pool: &Pool,
  resolver: Arc<R>,
  targets: Vec<Target>,
) -> Vec<Outcome> {
  pool
    .run(targets, move |target: Target| {
      let resolver = Arc::clone(&resolver);
      async move {
        let result = resolver.lookup_host(&target.host).await;
        if let Err(e) = &result {
          debug!(host = %target.host, "DNS lookup failed: {e}");
        }
        Outcome::new(target, result)
      }
    })
    .await
}

/// Folds outcomes into the unique address list and the address → inputs
/// index.
///
/// Outcomes are processed in command-line order regardless of the order
/// they completed in.
#[must_use]
pub fn aggregate(mut outcomes: Vec<Outcome>) -> Resolution {
  outcomes.sort_by_key(|o| o.target.seq);

  let mut resolution = Resolution::default();
  let mut seen = HashSet::new();

  for outcome in outcomes {
    if let Some(e) = outcome.error {
      resolution.failures.push(Failure {
        input: outcome.target.input,
        host: outcome.target.host,
        reason: e.to_string(),
      });
      continue;
    }

    for ip in outcome.addresses {
      let inputs = resolution.index.entry(ip).or_default();
      if !inputs.contains(&outcome.target.input) {
        inputs.push(outcome.target.input.clone());
      }
      if seen.insert(ip) {
        resolution.ips.push(ip);
      }
    }
  }

  resolution
}
