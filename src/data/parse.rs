use serde::{Deserialize, Deserializer};
use tracing::{debug, warn};

use super::error::DataError;
use super::models::{sort_frames, EventRow, PhaseOfPlay, TrackingFrame};

/// Convert a clock string ("SS", "MM:SS.s" or "HH:MM:SS.ss") to seconds.
///
/// Malformed input yields 0.0 rather than an error.
pub fn parse_clock(raw: &str) -> f64 {
    let raw = raw.trim();
    if raw.is_empty() {
        return 0.0;
    }
    let mut total = 0.0;
    let fields: Vec<&str> = raw.split(':').collect();
    let last = fields.len() - 1;
    for (i, field) in fields.iter().enumerate() {
        // Only the seconds field may carry a fraction.
        let value = if i == last {
            field.parse::<f64>().ok()
        } else {
            field.parse::<u32>().ok().map(f64::from)
        };
        match value {
            Some(v) if v.is_finite() => total = total * 60.0 + v,
            _ => return 0.0,
        }
    }
    total
}

fn non_blank(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("nan"))
}

pub fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(non_blank(Option::<String>::deserialize(d)?))
}

/// Integers exported by dataframe tools often look like "123.0".
pub fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    Ok(non_blank(Option::<String>::deserialize(d)?).and_then(|s| {
        s.parse::<i64>()
            .ok()
            .or_else(|| s.parse::<f64>().ok().filter(|v| v.fract() == 0.0).map(|v| v as i64))
    }))
}

pub fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(non_blank(Option::<String>::deserialize(d)?)
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite()))
}

pub fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(matches!(
        non_blank(Option::<String>::deserialize(d)?)
            .map(|s| s.to_lowercase())
            .as_deref(),
        Some("true") | Some("1") | Some("1.0") | Some("yes")
    ))
}

pub fn lenient_clock<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(non_blank(Option::<String>::deserialize(d)?)
        .map(|s| parse_clock(&s))
        .unwrap_or(0.0))
}

fn parse_csv<T: for<'de> Deserialize<'de>>(raw: &str, table: &str) -> Result<Vec<T>, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(raw.as_bytes());
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        let row: T = record.map_err(|source| DataError::Csv {
            table: table.to_string(),
            source,
        })?;
        rows.push(row);
    }
    debug!("Parsed {} rows from {}", rows.len(), table);
    Ok(rows)
}

/// Parse a `dynamic_events.csv` table.
pub fn parse_events_csv(raw: &str) -> Result<Vec<EventRow>, DataError> {
    parse_csv(raw, "dynamic_events")
}

/// Parse a `phases_of_play.csv` table.
pub fn parse_phases_csv(raw: &str) -> Result<Vec<PhaseOfPlay>, DataError> {
    parse_csv(raw, "phases_of_play")
}

/// Parse a JSON-lines tracking file, skipping lines that fail to decode.
///
/// Stops after `max_frames` decoded frames when a cap is given. The result is
/// in (period, timestamp) order.
pub fn parse_tracking_jsonl(raw: &str, max_frames: Option<usize>) -> Vec<TrackingFrame> {
    let mut frames = Vec::new();
    let mut skipped = 0usize;
    for line in raw.lines() {
        if max_frames.is_some_and(|cap| frames.len() >= cap) {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<TrackingFrame>(line) {
            Ok(frame) => frames.push(frame),
            Err(e) => {
                if skipped < 10 {
                    debug!("Skipping invalid tracking line: {}", e);
                }
                skipped += 1;
            }
        }
    }
    if skipped > 0 {
        warn!("Skipped {} undecodable tracking line(s)", skipped);
    }
    sort_frames(&mut frames);
    frames
}

/// Extract match ids from the `matches.json` index.
pub fn parse_match_index(raw: &str) -> Result<Vec<String>, DataError> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    let entries = match value.as_array() {
        Some(a) => a,
        None => return Ok(vec![]),
    };
    Ok(entries
        .iter()
        .filter_map(|m| match &m["id"] {
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::String(s) => Some(s.clone()),
            _ => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::models::PossessionGroup;
    use approx::assert_relative_eq;

    #[test]
    fn clock_formats() {
        assert_relative_eq!(parse_clock("12:34.5"), 754.5, epsilon = 1e-9);
        assert_relative_eq!(parse_clock("00:00.0"), 0.0);
        assert_relative_eq!(parse_clock("01:02:03.25"), 3723.25, epsilon = 1e-9);
        assert_relative_eq!(parse_clock("42.5"), 42.5, epsilon = 1e-9);
    }

    #[test]
    fn malformed_clock_is_zero() {
        assert_eq!(parse_clock(""), 0.0);
        assert_eq!(parse_clock("ab:cd"), 0.0);
        assert_eq!(parse_clock("12:"), 0.0);
        assert_eq!(parse_clock("1.5:30"), 0.0);
    }

    #[test]
    fn events_csv_with_pandas_style_values() {
        let raw = "\
event_id,match_id,team_id,player_id,player_name,time_start,frame_start,period,third_start,penalty_area_start,pass_outcome,dangerous,lead_to_shot,lead_to_goal,game_interruption_after,start_type,end_type,associated_player_possession_end_type,x_start,y_start,extra
1_5,99,100,2001.0,Jane Doe,01:30.5,905,1,defensive_third,False,unsuccessful,True,False,,,,possession_loss,,-20.5,3.0,x
1_6,99,100,,,bad,,2,,,,,,,goal_for,pass_interception,,,,,y
";
        let rows = parse_events_csv(raw).unwrap();
        assert_eq!(rows.len(), 2);
        let first = &rows[0];
        assert_eq!(first.event_id, "1_5");
        assert_eq!(first.team_id, Some(100));
        assert_eq!(first.player_id, Some(2001));
        assert_eq!(first.player_name.as_deref(), Some("Jane Doe"));
        assert_relative_eq!(first.timestamp, 90.5, epsilon = 1e-9);
        assert_eq!(first.frame_start, Some(905));
        assert!(first.dangerous);
        assert!(!first.lead_to_shot);
        assert!(!first.penalty_area_start);
        assert_eq!(first.end_type.as_deref(), Some("possession_loss"));
        assert_eq!(first.x_start, Some(-20.5));

        let second = &rows[1];
        assert_eq!(second.player_id, None);
        assert_eq!(second.timestamp, 0.0);
        assert_eq!(second.frame_start, None);
        assert_eq!(second.game_interruption_after.as_deref(), Some("goal_for"));
        assert_eq!(second.start_type.as_deref(), Some("pass_interception"));
    }

    #[test]
    fn phases_csv_defaults_missing_dimensions() {
        let raw = "\
team_in_possession_id,team_out_of_possession_id,time_start,time_end,team_in_possession_width_start,team_in_possession_length_start,team_out_of_possession_width_start,team_out_of_possession_length_start
100,200,10:00.0,10:20.0,35.5,40.0,,30.0
";
        let phases = parse_phases_csv(raw).unwrap();
        assert_eq!(phases.len(), 1);
        assert_eq!(phases[0].team_in_possession_id, Some(100));
        assert_relative_eq!(phases[0].time_start, 600.0);
        assert_relative_eq!(phases[0].time_end, 620.0);
        assert_eq!(phases[0].team_out_of_possession_width_start, 0.0);
        assert_eq!(phases[0].out_of_possession_area(), None);
    }

    #[test]
    fn tracking_jsonl_skips_bad_lines_and_honours_cap() {
        let raw = r#"{"frame": 1, "timestamp": 0.0, "period": 1, "player_data": [], "possession": {"group": "home team"}}
not json
{"frame": 2, "timestamp": 0.1, "period": 1, "player_data": [], "possession": {"group": null}}

{"frame": 3, "timestamp": 0.2, "period": 1, "player_data": []}
"#;
        let all = parse_tracking_jsonl(raw, None);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].possession.group, PossessionGroup::Home);
        assert_eq!(all[1].possession.group, PossessionGroup::None);

        let capped = parse_tracking_jsonl(raw, Some(2));
        assert_eq!(capped.len(), 2);
        assert_eq!(capped[1].frame_id, 2);
    }

    #[test]
    fn tracking_jsonl_comes_back_in_period_order() {
        let raw = r#"{"frame": 30, "timestamp": 1.0, "period": 2}
{"frame": 20, "timestamp": 5.0, "period": 1}
{"frame": 10, "timestamp": 2.0, "period": 1}
"#;
        let ids: Vec<i64> = parse_tracking_jsonl(raw, None).iter().map(|f| f.frame_id).collect();
        assert_eq!(ids, vec![10, 20, 30]);
    }

    #[test]
    fn match_index_accepts_numeric_and_string_ids() {
        let raw = r#"[{"id": 2017461}, {"id": "1886347"}, {"name": "no id"}]"#;
        assert_eq!(parse_match_index(raw).unwrap(), vec!["2017461", "1886347"]);
        assert!(parse_match_index("{}").unwrap().is_empty());
    }
}
