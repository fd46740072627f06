#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::float_cmp)]

use anyhow::Result;

mod app;
mod cli;
mod logging;
mod results;
mod user_config;

pub mod aggregate;
pub mod distance;
pub mod normalize;
pub mod pool;
pub mod providers;
pub mod steps;

/// Runs the command-line application.
///
/// Parses arguments, resolves and geolocates every target (or only the
/// caller's own address), and prints the report.
///
/// # Errors
///
/// Returns an error if setup fails (HTTP client, DNS configuration), if the
/// caller's own location cannot be determined, or if printing JSON output
/// fails.
pub async fn run() -> Result<()> {
  let mut app = app::App::new()?;
  app.run().await
}
