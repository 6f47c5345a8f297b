//! Precision-graded structural extraction
//!
//! An ordered table of rules runs over the normalized query. Each rule fills
//! one category of `ExtractedParameters` and can be exercised on its own.
//! Precision tags only ever tighten: a later, looser match never downgrades
//! a category that an earlier rule already recorded at a finer grain.

use crate::models::{
  DurationPrecision, DurationRole, ExtractedParameters, IntensityPrecision, PeriodizationPhase,
  SequenceStep, StructureType, TargetSystem, ZoneTag,
};
use regex::Regex;
use std::sync::LazyLock;

/// ---------------------------------------------------------------------------
/// Patterns
/// ---------------------------------------------------------------------------

/// Alternatives are tried left to right, most specific first
static DURATION_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
  Regex::new(concat!(
    r"(?P<ms_m>\d+)\s*(?:minutes?|min|mn)\s*(?P<ms_s>\d+)\s*(?:secondes?|sec|s)\b",
    r"|(?P<hm_h>\d+)\s*h\s*(?P<hm_m>\d+)(?:\s*(?:minutes?|min|mn))?\b",
    r"|(?P<h>\d+(?:[.,]\d+)?)\s*(?:heures?|h)\b",
    r"|(?P<m>\d+)\s*(?:minutes?|min|mn)\b",
    r"|(?P<s>\d+)\s*(?:secondes?|sec|s)\b",
  ))
  .ok()
});

static PERCENT_RE: LazyLock<Option<Regex>> =
  LazyLock::new(|| Regex::new(r"(\d+(?:[.,]\d+)?)\s*%").ok());

static PERCENT_AFTER_RE: LazyLock<Option<Regex>> =
  LazyLock::new(|| Regex::new(r"^\s*(?:à|a|@)?\s*(\d+(?:[.,]\d+)?)\s*%").ok());

static RANGE_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
  Regex::new(r"(\d+(?:[.,]\d+)?)\s*%?\s*(?:-|à|a|et)\s*(\d+(?:[.,]\d+)?)\s*%").ok()
});

static REPETITION_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
  Regex::new(r"(\d+)\s*(?:(?P<x>[x×])|(?P<word>fois|series|repetitions|blocs?)\b)").ok()
});

static CHAINED_REPETITION_RE: LazyLock<Option<Regex>> =
  LazyLock::new(|| Regex::new(r"(\d+)\s*[x×]\s*(\d+)\s*[x×]").ok());

static DASH_SEQUENCE_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
  Regex::new(r"(\d+(?:\s*-\s*\d+){2,})\s*(?P<unit>secondes?|sec|s\b|minutes?|min|mn)?").ok()
});

static STEP_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
  Regex::new(r"(\d+)\s*(?:minutes?|min|mn)\s*(?:@|à|a)\s*(\d+(?:[.,]\d+)?)\s*%").ok()
});

static ALTERNATION_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
  Regex::new(concat!(
    r"(?P<interval>\d+)\s*(?P<unit>secondes?|sec|s|minutes?|min|mn)\b",
    r".*?entre\s*(?P<a>\d+(?:[.,]\d+)?)\s*%",
    r".*?(?P<b>\d+(?:[.,]\d+)?)\s*%",
    r".*?pendant\s*(?P<window>\d+)\s*(?:minutes?|min|mn)\b",
  ))
  .ok()
});

static NUMBER_RE: LazyLock<Option<Regex>> =
  LazyLock::new(|| Regex::new(r"\d+(?:[.,]\d+)?").ok());

static WORD_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\w+").ok());

const RECOVERY_WORDS: &[&str] = &["recuperation", "repos", "recovery", "récup"];
const WARMUP_WORDS: &[&str] = &["echauffement"];
const COOLDOWN_WORDS: &[&str] = &["retour", "calme", "cooldown"];
const TOTAL_WORDS: &[&str] = &["pendant", "total", "durant"];
const CONNECTORS: &[&str] = &["puis", "avec", "et", "entre", "then", "suivi"];

/// ---------------------------------------------------------------------------
/// Shared scanning helpers
/// ---------------------------------------------------------------------------

/// A duration found in the text, with the role its surrounding words give it
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LabelledDuration {
  pub seconds: u32,
  pub precision: DurationPrecision,
  pub role: DurationRole,
  pub zone: Option<ZoneTag>,
  /// Percentage stated right after the duration (`5min à 95%`, `1min@80%`)
  pub percent: Option<f64>,
}

pub(crate) fn parse_number(raw: &str) -> Option<f64> {
  raw.replace(',', ".").parse::<f64>().ok()
}

fn words(text: &str) -> Vec<&str> {
  WORD_RE
    .as_ref()
    .map(|re| re.find_iter(text).map(|m| m.as_str()).collect())
    .unwrap_or_default()
}

/// True when `phrase` occurs in `text` with non-alphanumeric characters (or
/// the text edges) on both sides
pub(crate) fn contains_phrase(text: &str, phrase: &str) -> bool {
  text.match_indices(phrase).any(|(idx, _)| {
    let before_ok = text[..idx]
      .chars()
      .next_back()
      .map_or(true, |c| !c.is_alphanumeric());
    let after_ok = text[idx + phrase.len()..]
      .chars()
      .next()
      .map_or(true, |c| !c.is_alphanumeric());
    before_ok && after_ok
  })
}

/// Strongest zone named anywhere in `text`
pub(crate) fn zone_in(text: &str) -> Option<ZoneTag> {
  ZoneTag::ALL
    .iter()
    .rev()
    .copied()
    .find(|zone| zone.aliases().iter().any(|a| contains_phrase(text, a)))
}

fn role_from_words(words: &[&str]) -> Option<DurationRole> {
  for word in words {
    if RECOVERY_WORDS.contains(word) {
      return Some(DurationRole::Recovery);
    }
    if WARMUP_WORDS.contains(word) {
      return Some(DurationRole::Warmup);
    }
    if COOLDOWN_WORDS.contains(word) {
      return Some(DurationRole::Cooldown);
    }
    if *word == "total" {
      return Some(DurationRole::Total);
    }
  }
  None
}

/// Seconds for one duration match. Values that do not fit in a `u32`
/// are dropped rather than wrapped.
fn duration_seconds(caps: &regex::Captures) -> Option<(u32, DurationPrecision)> {
  let num = |name: &str| caps.name(name).and_then(|m| m.as_str().parse::<u32>().ok());

  if let (Some(m), Some(s)) = (num("ms_m"), num("ms_s")) {
    let seconds = m.checked_mul(60)?.checked_add(s)?;
    return Some((seconds, DurationPrecision::Second));
  }
  if let (Some(h), Some(m)) = (num("hm_h"), num("hm_m")) {
    let seconds = h.checked_mul(3600)?.checked_add(m.checked_mul(60)?)?;
    return Some((seconds, DurationPrecision::Minute));
  }
  if let Some(h) = caps.name("h").and_then(|m| parse_number(m.as_str())) {
    let seconds = (h * 3600.0).round();
    if !seconds.is_finite() || seconds < 0.0 || seconds > u32::MAX as f64 {
      return None;
    }
    return Some((seconds as u32, DurationPrecision::Minute));
  }
  if let Some(m) = num("m") {
    return Some((m.checked_mul(60)?, DurationPrecision::Minute));
  }
  num("s").map(|s| (s, DurationPrecision::Second))
}

/// Every duration in text order, each labelled by the words that follow it
/// (up to the next number, punctuation or connector) or, failing that, the
/// word right before it.
pub(crate) fn scan_durations(text: &str) -> Vec<LabelledDuration> {
  let Some(re) = DURATION_RE.as_ref() else {
    return Vec::new();
  };

  re.captures_iter(text)
    .filter_map(|caps| {
      let whole = caps.get(0)?;
      let (seconds, precision) = duration_seconds(&caps)?;

      let remainder = &text[whole.end()..];
      let window_end = remainder
        .find(|c: char| ",;:.()+".contains(c))
        .unwrap_or(remainder.len());
      let label: Vec<&str> = words(&remainder[..window_end])
        .into_iter()
        .take_while(|w| !w.starts_with(|c: char| c.is_ascii_digit()) && !CONNECTORS.contains(w))
        .collect();

      let previous = words(&text[..whole.start()]).last().copied();

      let role = if previous.is_some_and(|w| TOTAL_WORDS.contains(&w)) {
        DurationRole::Total
      } else if let Some(role) = role_from_words(&label) {
        role
      } else {
        previous
          .and_then(|w| role_from_words(&[w]))
          .unwrap_or(DurationRole::Work)
      };

      let percent = PERCENT_AFTER_RE
        .as_ref()
        .and_then(|re| re.captures(remainder))
        .and_then(|c| parse_number(&c[1]));

      Some(LabelledDuration {
        seconds,
        precision,
        role,
        zone: zone_in(&label.join(" ")),
        percent,
      })
    })
    .collect()
}

/// `Ns entre X% et Y% pendant Zmin`
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct AlternationPhrase {
  pub interval_seconds: u32,
  pub high: f64,
  pub low: f64,
  pub window_seconds: u32,
}

pub(crate) fn alternation_phrase(text: &str) -> Option<AlternationPhrase> {
  let caps = ALTERNATION_RE.as_ref()?.captures(text)?;

  let interval: u32 = caps["interval"].parse().ok()?;
  let interval_seconds = if caps["unit"].starts_with('s') {
    interval
  } else {
    interval.checked_mul(60)?
  };
  let a = parse_number(&caps["a"])?;
  let b = parse_number(&caps["b"])?;
  let window: u32 = caps["window"].parse().ok()?;

  Some(AlternationPhrase {
    interval_seconds,
    high: a.max(b),
    low: a.min(b),
    window_seconds: window.checked_mul(60)?,
  })
}

/// Numbers of a dash sequence such as `1-2-3-4-3-2-1`, converted to seconds
fn dash_sequence(text: &str) -> Option<Vec<u32>> {
  let caps = DASH_SEQUENCE_RE.as_ref()?.captures(text)?;
  let in_seconds = caps
    .name("unit")
    .is_some_and(|u| u.as_str().starts_with('s'));

  let values: Vec<u32> = caps[1]
    .split('-')
    .filter_map(|n| n.trim().parse::<u32>().ok())
    .filter_map(|n| if in_seconds { Some(n) } else { n.checked_mul(60) })
    .collect();

  (values.len() >= 3).then_some(values)
}

/// Palindrome that strictly climbs to a single peak
fn is_pyramid(values: &[u32]) -> bool {
  if values.len() < 3 || values.iter().ne(values.iter().rev()) {
    return false;
  }
  let peak = values.len() / 2;
  values[..=peak].windows(2).all(|w| w[0] < w[1])
}

/// ---------------------------------------------------------------------------
/// Rules
/// ---------------------------------------------------------------------------

struct Rule {
  name: &'static str,
  apply: fn(&str, &mut ExtractedParameters),
}

const RULES: &[Rule] = &[
  Rule { name: "durations", apply: extract_durations },
  Rule { name: "intensities", apply: extract_intensities },
  Rule { name: "ranges", apply: extract_ranges },
  Rule { name: "repetitions", apply: extract_repetitions },
  Rule { name: "zones", apply: extract_zones },
  Rule { name: "structure", apply: classify_structure },
  Rule { name: "sequence", apply: extract_sequence },
  Rule { name: "cues", apply: extract_cues },
];

/// Run every rule in order over already-normalized text
pub fn extract(text: &str) -> ExtractedParameters {
  let mut params = ExtractedParameters::default();

  for rule in RULES {
    (rule.apply)(text, &mut params);
    tracing::trace!(rule = rule.name, "extraction rule applied");
  }

  tracing::debug!(
    structure = %params.structure,
    work = params.durations.work.len(),
    duration_precision = ?params.durations.precision,
    intensity_precision = ?params.intensities.precision,
    "parameters extracted"
  );

  params
}

fn extract_durations(text: &str, params: &mut ExtractedParameters) {
  let durations = &mut params.durations;

  for found in scan_durations(text) {
    durations.precision = durations.precision.max(found.precision);
    match found.role {
      DurationRole::Work => durations.work.push(found.seconds),
      DurationRole::Recovery => durations.recovery.push(found.seconds),
      DurationRole::Warmup => {
        durations.warmup.get_or_insert(found.seconds);
      }
      DurationRole::Cooldown => {
        durations.cooldown.get_or_insert(found.seconds);
      }
      DurationRole::Total => {
        durations.total.get_or_insert(found.seconds);
      }
    }
  }
}

fn extract_intensities(text: &str, params: &mut ExtractedParameters) {
  let Some(re) = PERCENT_RE.as_ref() else {
    return;
  };
  let intensities = &mut params.intensities;

  for caps in re.captures_iter(text) {
    let raw = &caps[1];
    let Some(value) = parse_number(raw) else {
      continue;
    };

    let precision = if raw.contains(['.', ',']) {
      IntensityPrecision::Decimal
    } else {
      IntensityPrecision::Integer
    };
    intensities.precision = intensities.precision.max(precision);

    if intensities.primary.is_none() {
      intensities.primary = Some(value);
    } else if intensities.secondary.is_none() {
      intensities.secondary = Some(value);
    }
  }
}

fn extract_ranges(text: &str, params: &mut ExtractedParameters) {
  let found = RANGE_RE.as_ref().and_then(|re| re.captures(text)).and_then(|caps| {
    let a = parse_number(&caps[1])?;
    let b = parse_number(&caps[2])?;
    Some((a.min(b), a.max(b)))
  });

  if let Some(range) = found {
    params.intensities.range = Some(range);
  }
}

fn extract_repetitions(text: &str, params: &mut ExtractedParameters) {
  let reps = &mut params.repetitions;

  if let Some(caps) = CHAINED_REPETITION_RE.as_ref().and_then(|re| re.captures(text)) {
    reps.primary = caps[1].parse().ok();
    reps.secondary = caps[2].parse().ok();
    return;
  }

  let Some(re) = REPETITION_RE.as_ref() else {
    return;
  };
  let counts: Vec<(u32, bool)> = re
    .captures_iter(text)
    .filter_map(|caps| {
      let count = caps[1].parse::<u32>().ok()?;
      let is_block = caps
        .name("word")
        .is_some_and(|w| w.as_str().starts_with("bloc"));
      Some((count, is_block))
    })
    .collect();

  if let Some(&(first, is_block)) = counts.first() {
    reps.primary = Some(first);
    if is_block {
      reps.secondary = counts.get(1).map(|(n, _)| *n);
    }
  }
}

fn extract_zones(text: &str, params: &mut ExtractedParameters) {
  for zone in ZoneTag::ALL {
    if zone.aliases().iter().any(|alias| contains_phrase(text, alias)) {
      params.intensities.zones.insert(zone);
    }
  }
}

/// Named shapes first, then repetition inference, then the continuous default
fn classify_structure(text: &str, params: &mut ExtractedParameters) {
  let has = |word: &str| contains_phrase(text, word);
  let pyramid_sequence = dash_sequence(text).is_some_and(|v| is_pyramid(&v));

  params.structure = if has("fibonacci") || has("fibo") {
    StructureType::Fibonacci
  } else if has("alternance") || alternation_phrase(text).is_some() {
    StructureType::Alternation
  } else if has("spirale") || has("spiral") {
    StructureType::Spiral
  } else if has("pyramide") || pyramid_sequence {
    StructureType::Pyramid
  } else if has("over") && has("under") {
    StructureType::OverUnder
  } else if params.repetitions.secondary.is_some() {
    StructureType::Nested
  } else if params.repetitions.primary.is_some() {
    StructureType::SimpleIntervals
  } else {
    StructureType::Continuous
  };
}

fn extract_sequence(text: &str, params: &mut ExtractedParameters) {
  params.sequence = match params.structure {
    StructureType::Pyramid => dash_sequence(text)
      .unwrap_or_default()
      .into_iter()
      .map(|seconds| SequenceStep { seconds, intensity: None })
      .collect(),
    StructureType::Spiral => STEP_RE
      .as_ref()
      .map(|re| {
        re.captures_iter(text)
          .filter_map(|caps| {
            let minutes: u32 = caps[1].parse().ok()?;
            Some(SequenceStep {
              seconds: minutes.checked_mul(60)?,
              intensity: parse_number(&caps[2]),
            })
          })
          .collect()
      })
      .unwrap_or_default(),
    _ => Vec::new(),
  };
}

fn detect_phase(text: &str) -> PeriodizationPhase {
  let any = |terms: &[&str]| terms.iter().any(|t| text.contains(t));

  if any(&["base", "fondamental", "endurance"]) {
    PeriodizationPhase::Base
  } else if any(&["seuil", "tempo", "sweet", "build"]) {
    PeriodizationPhase::Build
  } else if any(&["vo2", "max", "peak", "pic"]) {
    PeriodizationPhase::Peak
  } else if any(&["recuperation", "recovery", "facile"]) {
    PeriodizationPhase::Recovery
  } else {
    PeriodizationPhase::Build
  }
}

fn extract_cues(text: &str, params: &mut ExtractedParameters) {
  let cues = &mut params.cues;

  cues.warmup = params.durations.warmup.is_some() || contains_phrase(text, "echauffement");
  cues.cooldown = params.durations.cooldown.is_some()
    || contains_phrase(text, "retour")
    || contains_phrase(text, "calme");
  cues.descend = text.contains("descend");
  cues.phase = detect_phase(text);

  let mut systems: std::collections::BTreeSet<TargetSystem> =
    params.intensities.zones.iter().map(ZoneTag::system).collect();
  if contains_phrase(text, "endurance") {
    systems.insert(TargetSystem::Aerobic);
  }
  if text.contains("sprint") || text.contains("neuro") {
    systems.insert(TargetSystem::Neuromuscular);
  }
  match params.intensities.primary {
    Some(p) if p > 120.0 => {
      systems.insert(TargetSystem::Anaerobic);
    }
    Some(p) if p > 105.0 => {
      systems.insert(TargetSystem::Vo2max);
    }
    _ => {}
  }
  if systems.is_empty() {
    systems.insert(TargetSystem::Aerobic);
  }
  cues.systems = systems;

  cues.numeric_tokens = NUMBER_RE
    .as_ref()
    .map_or(0, |re| re.find_iter(text).count());
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
