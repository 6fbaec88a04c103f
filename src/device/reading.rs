//! Device to host line decoding

use serde::Deserialize;

/// One decoded sensor sample. Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeviceReading {
    /// Raw ADC value
    pub emg: i64,
    /// Device-computed activity percentage
    pub muscle_activity: f64,
    /// Device-computed fatigue percentage, passed through untouched
    pub fatigue: f64,
    pub activated: bool,
}

impl DeviceReading {
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// What a received line turned out to be
#[derive(Debug, Clone, PartialEq)]
pub enum LineKind {
    Empty,
    /// JSON-shaped and decoded
    Reading(DeviceReading),
    /// JSON-shaped but not a valid reading
    Malformed(String),
    /// Free-form device text
    Text(String),
}

/// Strip a raw line and sort it into a [`LineKind`].
///
/// A line is JSON-shaped when it starts with `{` and ends with `}`.
pub fn classify_line(raw: &str) -> LineKind {
    let line = raw.trim();
    if line.is_empty() {
        return LineKind::Empty;
    }

    if line.starts_with('{') && line.ends_with('}') {
        match DeviceReading::parse(line) {
            Ok(reading) => LineKind::Reading(reading),
            Err(e) => {
                log::debug!("Undecodable payload ({}): {}", e, line);
                LineKind::Malformed(line.to_string())
            }
        }
    } else {
        LineKind::Text(line.to_string())
    }
}

/// Looser decoding used while measuring a contraction: anything that opens
/// with `{` is tried, failures are dropped.
pub fn parse_measurement(raw: &str) -> Option<DeviceReading> {
    let line = raw.trim();
    if !line.starts_with('{') {
        return None;
    }
    DeviceReading::parse(line).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_reading() {
        let kind = classify_line(
            r#"{"emg": 512, "muscleActivity": 40.0, "fatigue": 5.0, "activated": true}"#,
        );
        assert_eq!(
            kind,
            LineKind::Reading(DeviceReading {
                emg: 512,
                muscle_activity: 40.0,
                fatigue: 5.0,
                activated: true,
            })
        );
    }

    #[test]
    fn test_missing_fields_default() {
        let kind = classify_line(r#"{"emg": 7}"#);
        assert_eq!(
            kind,
            LineKind::Reading(DeviceReading {
                emg: 7,
                ..Default::default()
            })
        );
        assert_eq!(classify_line("{}"), LineKind::Reading(DeviceReading::default()));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let kind = classify_line(r#"{"emg": 3, "threshold": 200, "raw": [1, 2]}"#);
        assert!(matches!(kind, LineKind::Reading(r) if r.emg == 3));
    }

    #[test]
    fn test_integer_percentages_accepted() {
        let kind = classify_line(r#"{"muscleActivity": 12, "fatigue": 0}"#);
        assert!(matches!(kind, LineKind::Reading(r) if r.muscle_activity == 12.0));
    }

    #[test]
    fn test_json_shaped_garbage_is_malformed() {
        assert_eq!(
            classify_line("{emg: 12}"),
            LineKind::Malformed("{emg: 12}".to_string())
        );
        assert_eq!(
            classify_line(r#"{"emg": "high"}"#),
            LineKind::Malformed(r#"{"emg": "high"}"#.to_string())
        );
    }

    #[test]
    fn test_text_lines_are_stripped() {
        assert_eq!(
            classify_line("  EMG Sensor Ready\r\n"),
            LineKind::Text("EMG Sensor Ready".to_string())
        );
        assert_eq!(classify_line("not json"), LineKind::Text("not json".to_string()));
        // Opens like JSON but does not close like it
        assert_eq!(
            classify_line(r#"{"emg": 1"#),
            LineKind::Text(r#"{"emg": 1"#.to_string())
        );
        assert_eq!(classify_line("   \r"), LineKind::Empty);
    }

    #[test]
    fn test_measurement_parsing_is_lenient_about_shape_only() {
        assert_eq!(parse_measurement(r#"{"emg": 250}"#).map(|r| r.emg), Some(250));
        assert_eq!(parse_measurement(r#"{"emg": 250"#), None);
        assert_eq!(parse_measurement("Calibrating..."), None);
    }
}
