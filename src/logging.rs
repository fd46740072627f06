use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;

static TRACING: OnceLock<()> = OnceLock::new();

/// Filter used when `RUST_LOG` is unset.
const fn default_directive(verbose: bool) -> &'static str {
  if verbose {
    "hostgeo=debug"
  } else {
    "warn"
  }
}

/// Installs the stderr subscriber. `RUST_LOG` wins over `verbose`; safe to
/// call more than once.
pub fn init(verbose: bool) {
  TRACING.get_or_init(|| {
    let filter = EnvFilter::try_from_default_env()
      .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    let _ = tracing_subscriber::fmt()
      .with_env_filter(filter)
      .with_writer(std::io::stderr)
      .with_target(false)
      .compact()
      .try_init();
    tracing::debug!("tracing initialized (verbose={verbose})");
  });
}
