//! Classification of which stops a vehicle actually visited, derived from
//! its recorded GPS trajectory.
//!
//! Two radii do the work: the wide detection radius absorbs GPS jitter and
//! answers "did the vehicle get near this stop at all", while the tight
//! dwell radius plus a minimum span separates a genuine stop from a
//! drive-through. Fixes arrive roughly every 5 seconds, so a vehicle merely
//! clipping the dwell circle at speed leaves at most one sample inside it.

use std::collections::HashMap;

use chrono::DateTime;
use chrono_tz::Tz;
use serde::Serialize;

use crate::catalog::Stop;
use crate::geo::haversine_m;

pub const DETECTION_RADIUS_M: f64 = 100.0;
pub const DWELL_RADIUS_M: f64 = 35.0;
pub const MIN_DWELL_SECS: i64 = 10;

/// One recorded GPS fix. Timestamps are Unix seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryPoint {
    pub lat: f64,
    pub lng: f64,
    pub ts: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopPassage {
    /// Local wall-clock arrival time, "HH:MM".
    pub time: String,
    pub stopped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

/// Classify one trajectory against one route's stop sequence.
///
/// Stops the trajectory never came within the detection radius of are
/// absent from the result, which is distinct from "passed without
/// stopping". Pure and stateless: identical inputs always yield identical
/// output.
pub fn classify_passages(
    history: &[HistoryPoint],
    stops: &[Stop],
    tz: Tz,
) -> HashMap<String, StopPassage> {
    let mut passages = HashMap::new();
    if history.is_empty() {
        return passages;
    }

    for stop in stops {
        let mut nearby: Vec<&HistoryPoint> = history
            .iter()
            .filter(|p| haversine_m(p.lat, p.lng, stop.lat, stop.lng) < DETECTION_RADIUS_M)
            .collect();
        if nearby.is_empty() {
            continue;
        }
        nearby.sort_by_key(|p| p.ts);

        let Some(arrival) = DateTime::from_timestamp(nearby[0].ts, 0) else {
            continue;
        };
        let time = arrival.with_timezone(&tz).format("%H:%M").to_string();

        let dwell: Vec<&HistoryPoint> = nearby
            .iter()
            .copied()
            .filter(|p| haversine_m(p.lat, p.lng, stop.lat, stop.lng) < DWELL_RADIUS_M)
            .collect();

        let mut stopped = false;
        let mut duration = None;
        if dwell.len() >= 2 {
            let span = dwell[dwell.len() - 1].ts - dwell[0].ts;
            if span >= MIN_DWELL_SECS {
                stopped = true;
                duration = Some(format_dwell(span));
            }
        }

        passages.insert(stop.id.clone(), StopPassage {
            time,
            stopped,
            duration,
        });
    }
    passages
}

fn format_dwell(span_secs: i64) -> String {
    let minutes = span_secs / 60;
    let seconds = span_secs % 60;
    if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
