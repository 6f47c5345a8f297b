//! Interval-file (.zwo) rendering
//!
//! Powers are fractions of reference power with three decimals, durations
//! are whole seconds. `parse_steps` reads the elements back so tests and
//! callers can check that the file sums to the workout's total duration.

use crate::models::{ParametricWorkout, SegmentType, WorkoutSegment};
use regex::Regex;
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::LazyLock;
use thiserror::Error;

pub const DEFAULT_AUTHOR: &str = "Interval Coach";

#[derive(Error, Debug)]
pub enum ZwoError {
  #[error("Malformed element: {0}")]
  Malformed(String),

  #[error("Missing attribute '{attribute}' on {element}")]
  MissingAttribute { element: String, attribute: String },
}

static ELEMENT_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
  Regex::new(r"<(Warmup|Ramp|SteadyState|Cooldown)\s+([^>]*?)/>").ok()
});

static ATTRIBUTE_RE: LazyLock<Option<Regex>> =
  LazyLock::new(|| Regex::new(r#"(\w+)="([^"]*)""#).ok());

pub fn escape_xml(text: &str) -> String {
  let mut escaped = String::with_capacity(text.len());
  for c in text.chars() {
    match c {
      '&' => escaped.push_str("&amp;"),
      '<' => escaped.push_str("&lt;"),
      '>' => escaped.push_str("&gt;"),
      '"' => escaped.push_str("&quot;"),
      '\'' => escaped.push_str("&apos;"),
      other => escaped.push(other),
    }
  }
  escaped
}

fn fraction(pct: f64) -> String {
  format!("{:.3}", pct / 100.0)
}

fn title_case(word: &str) -> String {
  let mut chars = word.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars).collect(),
    None => String::new(),
  }
}

fn element(segment: &WorkoutSegment) -> String {
  let duration = segment.duration_seconds;
  let start = fraction(segment.intensity_start);
  let end = fraction(segment.intensity_end);

  match segment.segment_type {
    SegmentType::Warmup => format!(
      r#"<Warmup Duration="{}" PowerLow="{}" PowerHigh="{}"/>"#,
      duration, start, end
    ),
    SegmentType::Ramp => format!(
      r#"<Ramp Duration="{}" PowerLow="{}" PowerHigh="{}"/>"#,
      duration, start, end
    ),
    SegmentType::Cooldown => format!(
      r#"<Cooldown Duration="{}" PowerHigh="{}" PowerLow="{}"/>"#,
      duration, start, end
    ),
    SegmentType::Work | SegmentType::Recovery => match segment.cadence {
      Some(cadence) => format!(
        r#"<SteadyState Duration="{}" Power="{}" Cadence="{}"/>"#,
        duration, start, cadence
      ),
      None => format!(r#"<SteadyState Duration="{}" Power="{}"/>"#, duration, start),
    },
  }
}

pub fn render(workout: &ParametricWorkout, reference_power: u32, author: &str) -> String {
  let systems: Vec<&str> = workout.target_systems.iter().map(|s| s.as_str()).collect();
  let description = format!(
    "{} | TSS: {} | Systems: {} | FTP: {} W",
    workout.description,
    workout.training_load,
    systems.join(", "),
    reference_power
  );

  let tags = [
    "Parametric".to_string(),
    workout.workout_type.clone(),
    title_case(workout.periodization_phase.as_str()),
    format!("TSS{}", workout.training_load as u32),
  ];

  let mut xml = String::new();
  // Writing into a String cannot fail
  let _ = writeln!(xml, "<workout_file>");
  let _ = writeln!(xml, "    <author>{}</author>", escape_xml(author));
  let _ = writeln!(xml, "    <name>{}</name>", escape_xml(&workout.name));
  let _ = writeln!(xml, "    <description>{}</description>", escape_xml(&description));
  let _ = writeln!(xml, "    <sportType>bike</sportType>");
  let _ = writeln!(xml, "    <tags>");
  for tag in &tags {
    let _ = writeln!(xml, r#"        <tag name="{}"/>"#, escape_xml(tag));
  }
  let _ = writeln!(xml, "    </tags>");
  let _ = writeln!(xml, "    <workout>");
  for segment in &workout.segments {
    let _ = writeln!(xml, "        {}", element(segment));
  }
  let _ = writeln!(xml, "    </workout>");
  let _ = writeln!(xml, "</workout_file>");
  xml
}

/// ---------------------------------------------------------------------------
/// Reading back
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZwoStep {
  pub element: String,
  pub duration_seconds: u32,
  /// Fractions of reference power; equal for steady-state elements
  pub power_start: f64,
  pub power_end: f64,
  pub cadence: Option<u32>,
}

fn attribute<'a>(
  attributes: &'a [(String, String)],
  element: &str,
  key: &str,
) -> Result<&'a str, ZwoError> {
  attributes
    .iter()
    .find(|(k, _)| k == key)
    .map(|(_, v)| v.as_str())
    .ok_or_else(|| ZwoError::MissingAttribute {
      element: element.to_string(),
      attribute: key.to_string(),
    })
}

fn power(attributes: &[(String, String)], element: &str, key: &str) -> Result<f64, ZwoError> {
  let raw = attribute(attributes, element, key)?;
  raw
    .parse::<f64>()
    .map_err(|_| ZwoError::Malformed(format!("{} {}=\"{}\"", element, key, raw)))
}

pub fn parse_steps(xml: &str) -> Result<Vec<ZwoStep>, ZwoError> {
  let (Some(element_re), Some(attribute_re)) = (ELEMENT_RE.as_ref(), ATTRIBUTE_RE.as_ref()) else {
    return Ok(Vec::new());
  };

  element_re
    .captures_iter(xml)
    .map(|caps| {
      let name = caps[1].to_string();
      let attributes: Vec<(String, String)> = attribute_re
        .captures_iter(&caps[2])
        .map(|a| (a[1].to_string(), a[2].to_string()))
        .collect();

      let get = |key: &str| attribute(&attributes, &name, key);
      let number = |key: &str| power(&attributes, &name, key);

      let duration_seconds = get("Duration")?
        .parse::<u32>()
        .map_err(|_| ZwoError::Malformed(format!("{} Duration", name)))?;

      let (power_start, power_end) = match name.as_str() {
        "SteadyState" => {
          let p = number("Power")?;
          (p, p)
        }
        "Cooldown" => (number("PowerHigh")?, number("PowerLow")?),
        _ => (number("PowerLow")?, number("PowerHigh")?),
      };

      let cadence = get("Cadence").ok().and_then(|c| c.parse::<u32>().ok());

      Ok(ZwoStep {
        element: name.clone(),
        duration_seconds,
        power_start,
        power_end,
        cadence,
      })
    })
    .collect()
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
