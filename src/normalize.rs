//! Turns user-supplied targets (URLs, emails, `host:port` pairs) into a bare
//! hostname or IP literal that can be handed to the resolver.

use std::sync::LazyLock;

use memchr::memchr;
use regex::Regex;
use serde::Serialize;

/// An IPv4 literal immediately followed by a port separator.
static RE_IPV4_WITH_PORT: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^[0-9]{1,3}(?:\.[0-9]{1,3}){3}:").unwrap()
});

/// One command-line target, paired with the host it normalizes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
  /// Position on the command line. Used to keep output stable.
  pub seq: usize,
  /// The string exactly as the user typed it.
  pub input: String,
  /// Hostname or IP literal to resolve.
  pub host: String,
}

/// Strips URL, email and port wrapping from `raw`.
///
/// A URL yields its whole authority, user-info and port included. Never fails: anything unrecognised is returned unchanged and left for the
/// resolver to reject.
#[must_use]
pub fn identifier(raw: &str) -> String {
  if raw.contains("://") {
    return raw.splitn(4, '/').nth(2).unwrap_or_default().to_string();
  }

  if let Some(idx) = memchr(b'@', raw.as_bytes()) {
    return raw[idx + 1..].to_string();
  }

  if RE_IPV4_WITH_PORT.is_match(raw) {
    if let Some(idx) = memchr(b':', raw.as_bytes()) {
      return raw[..idx].to_string();
    }
  }

  raw.to_string()
}

/// Normalizes every input, keeping its command-line position.
#[must_use]
pub fn targets(inputs: &[String]) -> Vec<Target> {
  inputs
    .iter()
    .enumerate()
    .map(|(seq, input)| Target {
      seq,
      input: input.clone(),
      host: identifier(input),
    })
    .collect()
}
