//! Highlight models and the legacy-shape normalizer.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A candidate clip: a `[start, end]` interval in seconds with an optional
/// summary and score.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Highlight {
    /// Start of the interval, seconds
    pub start: f64,

    /// End of the interval, seconds
    pub end: f64,

    /// Short description of the moment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Relative quality score (higher is better)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl Highlight {
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start,
            end,
            summary: None,
            score: None,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Interval length in seconds.
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    /// Overlap ratio against another highlight: `|A∩B| / min(|A|, |B|)`.
    ///
    /// A ratio above 0.7 means "same highlight" for dedup purposes. Returns
    /// 0.0 when either interval is degenerate.
    pub fn overlap_ratio(&self, other: &Highlight) -> f64 {
        let overlap = (self.end.min(other.end) - self.start.max(other.start)).max(0.0);
        let shorter = self.duration().min(other.duration());
        if shorter <= 0.0 {
            return 0.0;
        }
        overlap / shorter
    }
}

/// The canonical on-disk shape of `highlights.json`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HighlightsData {
    /// Highlights in emit order (chronological after the reduce phase)
    pub highlights: Vec<Highlight>,
}

impl HighlightsData {
    pub fn new(highlights: Vec<Highlight>) -> Self {
        Self { highlights }
    }
}

/// Error raised when a highlights document matches none of the known shapes.
#[derive(Debug, Error)]
pub enum HighlightFormatError {
    #[error("unrecognized highlights document shape")]
    UnknownShape,

    #[error("highlights document contains no highlights")]
    Empty,
}

/// Normalize a highlights document into a uniform list.
///
/// Three shapes are accepted:
/// - `{"highlights": [...]}` — canonical;
/// - `[...]` — bare list;
/// - a single-highlight object, either `{start, end, summary?, score?}` or the
///   legacy `{highlight_inicio_segundos, highlight_fim_segundos, resposta_bruta?}`.
pub fn normalize_highlights(value: &serde_json::Value) -> Result<Vec<Highlight>, HighlightFormatError> {
    let highlights = match value {
        serde_json::Value::Object(map) if map.contains_key("highlights") => {
            parse_list(&map["highlights"])?
        }
        serde_json::Value::Array(_) => parse_list(value)?,
        serde_json::Value::Object(map)
            if map.contains_key("highlight_inicio_segundos")
                && map.contains_key("highlight_fim_segundos") =>
        {
            let start = number_field(map, "highlight_inicio_segundos").unwrap_or(0.0);
            let end = number_field(map, "highlight_fim_segundos").unwrap_or(0.0);
            let mut h = Highlight::new(start, end);
            if let Some(summary) = map.get("resposta_bruta").and_then(|v| v.as_str()) {
                h.summary = Some(summary.to_string());
            }
            vec![h]
        }
        serde_json::Value::Object(map) if map.contains_key("start") && map.contains_key("end") => {
            vec![serde_json::from_value(value.clone())
                .map_err(|_| HighlightFormatError::UnknownShape)?]
        }
        _ => return Err(HighlightFormatError::UnknownShape),
    };

    if highlights.is_empty() {
        return Err(HighlightFormatError::Empty);
    }
    Ok(highlights)
}

fn parse_list(value: &serde_json::Value) -> Result<Vec<Highlight>, HighlightFormatError> {
    serde_json::from_value(value.clone()).map_err(|_| HighlightFormatError::UnknownShape)
}

fn number_field(map: &serde_json::Map<String, serde_json::Value>, key: &str) -> Option<f64> {
    map.get(key).and_then(|v| v.as_f64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_overlap_ratio() {
        let a = Highlight::new(0.0, 10.0);
        let b = Highlight::new(5.0, 15.0);
        // 5s overlap over the 10s shorter interval.
        assert!((a.overlap_ratio(&b) - 0.5).abs() < 1e-9);

        let c = Highlight::new(0.0, 4.0);
        let d = Highlight::new(1.0, 4.0);
        // Fully contained: ratio is 1.0 against the shorter side.
        assert!((c.overlap_ratio(&d) - 1.0).abs() < 1e-9);

        let disjoint = Highlight::new(20.0, 30.0);
        assert_eq!(a.overlap_ratio(&disjoint), 0.0);
    }

    #[test]
    fn test_overlap_ratio_degenerate() {
        let point = Highlight::new(5.0, 5.0);
        let span = Highlight::new(0.0, 10.0);
        assert_eq!(point.overlap_ratio(&span), 0.0);
    }

    #[test]
    fn test_normalize_canonical() {
        let doc = json!({"highlights": [{"start": 1.0, "end": 2.0, "score": 90.0}]});
        let list = normalize_highlights(&doc).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].score, Some(90.0));
    }

    #[test]
    fn test_normalize_bare_list() {
        let doc = json!([{"start": 1.0, "end": 2.0}, {"start": 3.0, "end": 4.0}]);
        let list = normalize_highlights(&doc).unwrap();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_normalize_legacy_single_dict() {
        let doc = json!({
            "highlight_inicio_segundos": 12.5,
            "highlight_fim_segundos": 40.0,
            "resposta_bruta": "o melhor momento"
        });
        let list = normalize_highlights(&doc).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].start, 12.5);
        assert_eq!(list[0].end, 40.0);
        assert_eq!(list[0].summary.as_deref(), Some("o melhor momento"));
    }

    #[test]
    fn test_normalize_plain_single_dict() {
        let doc = json!({"start": 3.0, "end": 9.0, "summary": "x"});
        let list = normalize_highlights(&doc).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].end, 9.0);
    }

    #[test]
    fn test_normalize_equivalent_inputs_agree() {
        // The three shapes describing the same interval normalize identically.
        let canonical = json!({"highlights": [{"start": 5.0, "end": 15.0}]});
        let bare = json!([{"start": 5.0, "end": 15.0}]);
        let single = json!({"start": 5.0, "end": 15.0});

        for doc in [canonical, bare, single] {
            let list = normalize_highlights(&doc).unwrap();
            assert_eq!(list.len(), 1);
            assert_eq!(list[0].start, 5.0);
            assert_eq!(list[0].end, 15.0);
        }
    }

    #[test]
    fn test_normalize_rejects_unknown_and_empty() {
        assert!(matches!(
            normalize_highlights(&json!("not a doc")),
            Err(HighlightFormatError::UnknownShape)
        ));
        assert!(matches!(
            normalize_highlights(&json!({"highlights": []})),
            Err(HighlightFormatError::Empty)
        ));
    }
}
