use clap::builder::RangedU64ValueParser;
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(
  name = "hostgeo",
  author = "Luis Cardoso <luis@luiscardoso.dev>",
  version
)]
#[command(
  about = "Geolocate hostnames, URLs, emails and IPs, and show how far away they are.",
  long_about = "Resolves every target through DNS, geolocates each unique address once through ipinfo.io, and prints a table with the location of every target and its distance from you. With no targets, your own public address is the only target."
)]
pub struct Cli {
  /// Hostnames, URLs, email addresses or IP addresses to look up.
  pub targets: Vec<String>,

  /// Number of simultaneous lookups [default: 30].
  #[arg(
    short,
    long,
    value_name = "N",
    value_parser = RangedU64ValueParser::<usize>::new().range(1..)
  )]
  pub workers: Option<usize>,

  /// Merge cells with identical values in consecutive rows.
  #[arg(short, long)]
  pub merge: bool,

  /// Draw a separator line between every row.
  #[arg(short = '1', long)]
  pub one_row: bool,

  /// Wrap long cells instead of printing them at full width.
  #[arg(short = 'W', long)]
  pub wrap: bool,

  /// Only show your own external IP address and location.
  #[arg(short = 'x', long = "external-ip")]
  pub external_ip: bool,

  /// Use the Vincenty (WGS-84 ellipsoid) formula for distances.
  #[arg(long)]
  pub vincenty: bool,

  /// Output results in JSON format instead of a table.
  #[arg(long)]
  pub json: bool,

  /// Base URL of the geolocation service [default: https://ipinfo.io].
  #[arg(long, value_name = "URL")]
  pub service: Option<String>,

  /// Log what the lookups are doing to stderr.
  #[arg(short, long)]
  pub verbose: bool,

  /// Persist --workers, --service and --vincenty into the user config file.
  #[arg(long)]
  pub save_config: bool,

  /// Print the current merged configuration and exit.
  #[arg(long)]
  pub config_show: bool,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn make_args(args: &[&str]) -> Vec<String> {
    std::iter::once("hostgeo".to_string())
      .chain(args.iter().map(std::string::ToString::to_string))
      .collect()
  }

  #[test]
  fn test_basic_targets() {
    let args = make_args(&["https://cisco.com", "user@github.com", "1.2.3.4"]);
    let cli = Cli::try_parse_from(args).expect("Should parse targets");
    assert_eq!(
      cli.targets,
      vec!["https://cisco.com", "user@github.com", "1.2.3.4"]
    );
    assert!(cli.workers.is_none());
    assert!(!cli.merge);
    assert!(!cli.one_row);
    assert!(!cli.wrap);
    assert!(!cli.external_ip);
    assert!(!cli.json);
  }

  #[test]
  fn test_no_targets_is_not_external_only() {
    let cli = Cli::try_parse_from(make_args(&[])).expect("Should parse");
    assert!(cli.targets.is_empty());
    assert!(!cli.external_ip);
  }

  #[test]
  fn test_external_ip_flag() {
    let cli = Cli::try_parse_from(make_args(&["-x", "example.com"]))
      .expect("Should parse -x");
    assert!(cli.external_ip);
  }

  #[test]
  fn test_workers() {
    let cli = Cli::try_parse_from(make_args(&["-w", "5", "example.com"]))
      .expect("Should parse -w");
    assert_eq!(cli.workers, Some(5));

    let cli = Cli::try_parse_from(make_args(&["--workers=100", "a.com"]))
      .expect("Should parse --workers");
    assert_eq!(cli.workers, Some(100));
  }

  #[test]
  fn test_zero_workers_rejected() {
    let result = Cli::try_parse_from(make_args(&["-w", "0", "example.com"]));
    assert!(result.is_err(), "Parsing should fail for zero workers");
    assert!(matches!(
      result.unwrap_err().kind(),
      clap::error::ErrorKind::ValueValidation
    ));
  }

  #[test]
  fn test_presentation_flags() {
    let cli = Cli::try_parse_from(make_args(&["-m", "-1", "-W", "a.com"]))
      .expect("Should parse presentation flags");
    assert!(cli.merge);
    assert!(cli.one_row);
    assert!(cli.wrap);
    assert_eq!(cli.targets, vec!["a.com"]);
  }

  #[test]
  fn test_combination_flags() {
    let args = make_args(&[
      "rust-lang.org",
      "--json",
      "--vincenty",
      "--service",
      "http://127.0.0.1:8080",
    ]);
    let cli =
      Cli::try_parse_from(args).expect("Should parse combination of flags");
    assert_eq!(cli.targets, vec!["rust-lang.org"]);
    assert!(cli.json);
    assert!(cli.vincenty);
    assert_eq!(cli.service.as_deref(), Some("http://127.0.0.1:8080"));
    assert!(!cli.save_config);
  }

  #[test]
  fn test_unknown_flag_fails() {
    let result = Cli::try_parse_from(make_args(&["--bogus", "a.com"]));
    assert!(matches!(
      result.unwrap_err().kind(),
      clap::error::ErrorKind::UnknownArgument
    ));
  }
}
