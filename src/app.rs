use crate::cli::Cli;
use crate::distance::Formula;
use crate::logging;
use crate::providers::dns::SystemResolver;
use crate::providers::geo::IpInfo;
use crate::results::{self, Layout};
use crate::steps::{self, Report, Settings};
use crate::user_config::{self, UserConfig};
use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

pub struct App {
  cli: Cli,
  client: Client,
  user_config: UserConfig,
  settings: Settings,
}

impl App {
  pub fn new() -> Result<Self> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let client = Client::builder()
      .user_agent(format!("hostgeo/{}", env!("CARGO_PKG_VERSION")))
      .build()
      .context("Failed to build HTTP client")?;

    let user_config = user_config::load();
    let settings = settings(&cli, &user_config);

    Ok(Self {
      cli,
      client,
      user_config,
      settings,
    })
  }

  pub async fn run(&mut self) -> Result<()> {
    if self.cli.config_show {
      return self.show_config();
    }
    if self.cli.save_config {
      self.save_config()?;
      if self.cli.targets.is_empty() && !self.cli.external_ip {
        return Ok(());
      }
    }

    let report = self.lookup().await?;
    self.print_results(&report)
  }

  async fn lookup(&self) -> Result<Report> {
    let locator = Arc::new(IpInfo::new(
      self.client.clone(),
      &self.settings.service_url,
    ));

    if self.cli.external_ip {
      let spinner = self.spinner("Fetching your external address...");
      let report = steps::external_ip(locator.as_ref()).await;
      spinner.finish_and_clear();
      return report;
    }

    let resolver = Arc::new(SystemResolver::new()?);
    let spinner = if self.cli.targets.is_empty() {
      self.spinner("Locating your own address...")
    } else {
      self.spinner(format!(
        "Locating {} target(s) with up to {} workers...",
        self.cli.targets.len(),
        self.settings.workers
      ))
    };
    let report =
      steps::run_pipeline(&self.cli.targets, resolver, locator, &self.settings)
        .await;
    spinner.finish_and_clear();
    report
  }

  fn spinner(&self, message: impl Into<Cow<'static, str>>) -> ProgressBar {
    if self.cli.json {
      return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
      pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
  }

  fn show_config(&self) -> Result<()> {
    let path = user_config::path()?;
    println!("config file: {}", path.display());
    serde_json::to_string_pretty(&self.settings)
      .map(|s| println!("{s}"))
      .context("Failed to serialize configuration")
  }

  fn save_config(&self) -> Result<()> {
    let cfg = merged_user_config(&self.cli, &self.user_config);
    user_config::store(&cfg).context("Failed to save configuration")?;
    if !self.cli.json {
      println!("Configuration saved to {}", user_config::path()?.display());
    }
    Ok(())
  }

  fn print_results(&self, report: &Report) -> Result<()> {
    if self.cli.json {
      return results::print_json(report);
    }
    if self.cli.external_ip {
      results::print_origin(report);
    } else {
      results::print_human_readable(
        report,
        Layout {
          merge: self.cli.merge,
          one_row: self.cli.one_row,
          wrap: self.cli.wrap,
        },
      );
    }
    Ok(())
  }
}

/// Effective run settings: command line, then user config, then defaults.
fn settings(cli: &Cli, user: &UserConfig) -> Settings {
  let defaults = Settings::default();
  let vincenty = cli.vincenty || user.vincenty.unwrap_or(false);
  Settings {
    workers: cli.workers.or(user.workers).unwrap_or(defaults.workers).max(1),
    service_url: cli
      .service
      .clone()
      .or_else(|| user.service_url.clone())
      .unwrap_or(defaults.service_url),
    formula: if vincenty {
      Formula::Vincenty
    } else {
      Formula::Haversine
    },
  }
}

/// The stored config with every explicitly given flag written over it.
fn merged_user_config(cli: &Cli, user: &UserConfig) -> UserConfig {
  let mut cfg = user.clone();
  if cli.workers.is_some() {
    cfg.workers = cli.workers;
  }
  if cli.service.is_some() {
    cfg.service_url.clone_from(&cli.service);
  }
  if cli.vincenty {
    cfg.vincenty = Some(true);
  }
  cfg
}
