use crate::aggregate::Row;
use crate::steps::Report;
use anyhow::{Context, Result};
use console::{measure_text_width, pad_str, style, Alignment, Style};

const COLUMNS: [&str; 9] = [
  "Input", "IP", "Hostname", "Org", "City", "Region", "Country", "Loc",
  "Distance",
];

/// Cell width used when wrapping is on.
const WRAP_WIDTH: usize = 24;

/// How the table is drawn. None of this changes what is in it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Layout {
  /// Blank out a cell when it repeats the one above.
  pub merge: bool,
  /// Separator line between every row.
  pub one_row: bool,
  /// Wrap cells wider than [`WRAP_WIDTH`].
  pub wrap: bool,
}

/// Helper: coloured keys so the summary is easy to scan.
fn key(s: &str) -> console::StyledObject<&str> {
  style(s).bold().cyan()
}

/// Helper: a section header ("❌ DNS Failures").
fn heading(title: &str, emoji: &str) -> String {
  format!(
    "\n{} {}",
    style(emoji).bold(),
    Style::new().bold().underlined().apply_to(title)
  )
}

fn header(title: &str, emoji: &str) {
  println!("{}", heading(title, emoji));
}

fn cells(row: &Row) -> [String; 9] {
  [
    row.input.clone(),
    row.ip.clone(),
    row.hostname.clone(),
    row.org.clone(),
    row.city.clone(),
    row.region.clone(),
    row.country.clone(),
    row.loc.clone(),
    row.distance.to_string(),
  ]
}

/// Greedy word wrap; words longer than `width` are split.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
  let mut lines = Vec::new();
  let mut line = String::new();

  for word in text.split_whitespace() {
    let mut word = word.to_string();
    while measure_text_width(&word) > width {
      if !line.is_empty() {
        lines.push(std::mem::take(&mut line));
      }
      let split = word
        .char_indices()
        .nth(width)
        .map_or(word.len(), |(idx, _)| idx);
      let rest = word.split_off(split);
      lines.push(word);
      word = rest;
    }
    if word.is_empty() {
      continue;
    }

    let needed = if line.is_empty() {
      measure_text_width(&word)
    } else {
      measure_text_width(&line) + 1 + measure_text_width(&word)
    };
    if needed > width && !line.is_empty() {
      lines.push(std::mem::take(&mut line));
    }
    if !line.is_empty() {
      line.push(' ');
    }
    line.push_str(&word);
  }

  if !line.is_empty() || lines.is_empty() {
    lines.push(line);
  }
  lines
}

/// Renders rows as plain text lines; the first line is the header.
#[must_use]
pub fn table(rows: &[Row], layout: Layout) -> Vec<String> {
  let mut body: Vec<[String; 9]> = rows.iter().map(cells).collect();

  if layout.merge {
    // bottom-up so every comparison sees the original row above
    for i in (1..body.len()).rev() {
      for col in 0..COLUMNS.len() {
        if !body[i][col].is_empty() && body[i][col] == body[i - 1][col] {
          body[i][col].clear();
        }
      }
    }
  }

  let split = |cell: &String| -> Vec<String> {
    if layout.wrap {
      wrap_text(cell, WRAP_WIDTH)
    } else {
      vec![cell.clone()]
    }
  };
  let body: Vec<Vec<Vec<String>>> = body
    .iter()
    .map(|row| row.iter().map(&split).collect())
    .collect();

  let mut widths = COLUMNS.map(measure_text_width);
  for row in &body {
    for (col, lines) in row.iter().enumerate() {
      for line in lines {
        widths[col] = widths[col].max(measure_text_width(line));
      }
    }
  }

  let render = |cols: &[&str]| -> String {
    cols
      .iter()
      .zip(widths)
      .map(|(text, width)| pad_str(text, width, Alignment::Left, None))
      .collect::<Vec<_>>()
      .join(" | ")
      .trim_end()
      .to_string()
  };
  let separator = widths
    .iter()
    .map(|w| "-".repeat(*w))
    .collect::<Vec<_>>()
    .join("-+-");

  let mut out = vec![render(&COLUMNS), separator.clone()];
  for (i, row) in body.iter().enumerate() {
    if layout.one_row && i > 0 {
      out.push(separator.clone());
    }
    let height = row.iter().map(Vec::len).max().unwrap_or(1);
    for line in 0..height {
      let cols: Vec<&str> = row
        .iter()
        .map(|lines| lines.get(line).map_or("", String::as_str))
        .collect();
      out.push(render(&cols));
    }
  }
  out
}

/// Only the caller's own address, for `--external-ip`.
pub fn print_origin(report: &Report) {
  let o = &report.origin;
  let or_na = |s: &str| if s.is_empty() { "N/A".to_string() } else { s.to_string() };

  header("Your External Address", "🌐");
  println!("  {} {}", key("IP:"), or_na(&o.ip));
  println!("  {} {}", key("Hostname:"), or_na(&o.hostname));
  println!("  {} {}", key("Org:"), or_na(&o.org));
  println!("  {} {}", key("City:"), or_na(&o.city));
  println!("  {} {}", key("Region:"), or_na(&o.region));
  println!("  {} {}", key("Country:"), or_na(&o.country));
  println!("  {} {}", key("Postal:"), or_na(&o.postal));
  println!("  {} {}", key("Loc:"), or_na(&o.loc));
  println!("  {} {:.2?}", key("Elapsed time:"), report.elapsed);
}

/// Failure and warning sections, each holding its header and entries so
/// the pair always lands on the same stream.
fn notices(report: &Report) -> Vec<String> {
  let mut sections = Vec::new();

  if !report.dns_failures.is_empty() {
    let mut section = heading("DNS Failures", "🧭");
    for f in &report.dns_failures {
      let line = format!("{} ({}): {}", f.input, f.host, f.reason);
      section.push_str(&format!("\n  {}", style(line).red()));
    }
    sections.push(section);
  }

  if !report.geo_failures.is_empty() {
    let mut section = heading("Geolocation Failures", "❌");
    for f in &report.geo_failures {
      let line = format!("{} [{}]: {}", f.ip, f.inputs.join(", "), f.reason);
      let line = if f.rate_limited {
        style(line).red().bold()
      } else {
        style(line).red()
      };
      section.push_str(&format!("\n  {line}"));
    }
    sections.push(section);
  }

  if !report.warnings.is_empty() {
    let mut section = heading("Warnings", "⚠");
    for w in &report.warnings {
      section.push_str(&format!("\n  {}", style(w).yellow()));
    }
    sections.push(section);
  }

  sections
}

pub fn print_human_readable(report: &Report, layout: Layout) {
  if report.rows.is_empty() {
    println!("{}", style("No results").dim());
  } else {
    for (i, line) in table(&report.rows, layout).iter().enumerate() {
      if i == 0 {
        println!("{}", style(line).bold());
      } else {
        println!("{line}");
      }
    }
  }

  for section in notices(report) {
    eprintln!("{section}");
  }

  println!();
  println!("  {} {}", key("Your IP:"), report.origin.ip);
  println!("  {} {}", key("Your location:"), report.origin.loc);
  println!("  {} {:.2?}", key("Elapsed time:"), report.elapsed);
}

pub fn print_json(report: &Report) -> Result<()> {
  serde_json::to_string_pretty(report)
    .map(|s| println!("{s}"))
    .context("Failed to serialize results to JSON")
}
