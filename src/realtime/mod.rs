//! Per-poll reconciliation of the two GTFS-RT feeds against the compacted
//! catalog.
//!
//! Each cycle fetches vehicle positions and trip updates concurrently,
//! joins them through the trip-to-route index, and emits an enriched,
//! agency-filtered vehicle list. Reconciliation itself is a pure function
//! of the two feed snapshots and the catalog; a failed fetch degrades the
//! cycle to an empty list and the next tick simply retries.

pub mod contractor;
pub mod destination;
pub mod poller;

pub use poller::{Poller, VehicleStore};

use std::collections::HashMap;
use std::time::Duration;

use gtfs_realtime::FeedMessage;
use prost::Message;
use serde::Serialize;
use tracing::{debug, warn};

use crate::catalog::{Agency, Catalog, ManifestEntry};
use crate::config::RealtimeConfig;
use crate::error::GtfsError;

use destination::ResolveContext;

/// Maximum allowed protobuf response size (50 MB)
const MAX_PROTOBUF_SIZE: usize = 50 * 1024 * 1024;

const MPS_TO_KMH: f64 = 3.6;

/// Deviations inside this window count as on time.
const ON_TIME_WINDOW_SECS: i32 = 45;

/// Destination placeholder when every resolver misses.
pub const UNKNOWN_DESTINATION: &str = "Okänd";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VehicleKind {
    #[serde(rename = "Buss")]
    Bus,
    #[serde(rename = "Färja")]
    Ferry,
}

/// One reconciled live vehicle. Wire names match the catalog documents the
/// presentation layer already consumes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: String,
    #[serde(rename = "line")]
    pub route_id: String,
    pub trip_id: String,
    pub operator: String,
    pub vehicle_number: String,
    pub lat: f64,
    pub lng: f64,
    pub bearing: f64,
    /// km/h
    pub speed: f64,
    pub destination: String,
    #[serde(rename = "type")]
    pub kind: VehicleKind,
    pub agency: Agency,
    /// Schedule deviation in seconds. `None` means unknown, not on time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contractor: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punctuality {
    Unknown,
    OnTime,
    LateMinutes(i32),
    EarlyMinutes(i32),
}

impl Vehicle {
    pub fn punctuality(&self) -> Punctuality {
        match self.delay {
            None => Punctuality::Unknown,
            Some(d) if d.abs() < ON_TIME_WINDOW_SECS => Punctuality::OnTime,
            Some(d) if d > 0 => Punctuality::LateMinutes((d as f64 / 60.0).round() as i32),
            Some(d) => Punctuality::EarlyMinutes((-d as f64 / 60.0).round() as i32),
        }
    }
}

/// Fetches and reconciles the two realtime feeds.
pub struct Reconciler {
    client: reqwest::Client,
    vehicle_positions_url: String,
    trip_updates_url: String,
    timeout: Duration,
}

impl Reconciler {
    pub fn new(config: &RealtimeConfig) -> Result<Self, GtfsError> {
        let client = reqwest::Client::builder()
            .user_agent("sl-tracker/0.2")
            .build()?;
        Ok(Self {
            client,
            vehicle_positions_url: config.vehicle_positions_url.clone(),
            trip_updates_url: config.trip_updates_url.clone(),
            timeout: Duration::from_secs(config.fetch_timeout_secs),
        })
    }

    /// Fetch and decode one GTFS-RT protobuf feed.
    async fn fetch_feed(&self, url: &str) -> Result<FeedMessage, GtfsError> {
        let response = self.client.get(url).timeout(self.timeout).send().await?;

        if !response.status().is_success() {
            return Err(GtfsError::NetworkMessage(format!(
                "GTFS-RT HTTP {}",
                response.status()
            )));
        }

        let bytes = response.bytes().await?;
        if bytes.len() > MAX_PROTOBUF_SIZE {
            return Err(GtfsError::NetworkMessage(format!(
                "GTFS-RT response too large: {} bytes (max {} bytes)",
                bytes.len(),
                MAX_PROTOBUF_SIZE
            )));
        }

        FeedMessage::decode(bytes.as_ref()).map_err(GtfsError::from)
    }

    /// Run one poll cycle: both feeds fetched concurrently, then joined.
    pub async fn poll(&self, catalog: &Catalog, agency: Option<Agency>) -> Vec<Vehicle> {
        let (positions, updates) = futures::join!(
            self.fetch_feed(&self.vehicle_positions_url),
            self.fetch_feed(&self.trip_updates_url),
        );
        reconcile_cycle(positions, updates, catalog, agency)
    }
}

/// Fold one cycle's fetch results into a vehicle list. Either fetch failing
/// degrades the cycle to an empty list rather than an error; the caller
/// retries on its next tick.
pub fn reconcile_cycle(
    positions: Result<FeedMessage, GtfsError>,
    updates: Result<FeedMessage, GtfsError>,
    catalog: &Catalog,
    agency: Option<Agency>,
) -> Vec<Vehicle> {
    match (positions, updates) {
        (Ok(positions), Ok(updates)) => reconcile(&positions, &updates, catalog, agency),
        (Err(e), _) | (_, Err(e)) => {
            warn!(error = %e, "Realtime fetch failed, yielding empty vehicle list for this cycle");
            Vec::new()
        }
    }
}

/// Per-trip auxiliary state pulled from the trip-updates feed.
#[derive(Debug)]
struct TripAux<'a> {
    delay: Option<i32>,
    direction_id: Option<u32>,
    route_id: Option<&'a str>,
    last_stop_id: Option<&'a str>,
}

fn build_trip_aux(updates: &FeedMessage) -> HashMap<&str, TripAux<'_>> {
    let mut aux = HashMap::new();
    for entity in &updates.entity {
        let Some(update) = &entity.trip_update else {
            continue;
        };
        let Some(trip_id) = update.trip.trip_id.as_deref() else {
            continue;
        };
        let Some(first) = update.stop_time_update.first() else {
            continue;
        };
        // Arrival delay of the first update, else its departure delay.
        let delay = first
            .arrival
            .as_ref()
            .and_then(|event| event.delay)
            .or_else(|| first.departure.as_ref().and_then(|event| event.delay));
        let last_stop_id = update
            .stop_time_update
            .last()
            .and_then(|stu| stu.stop_id.as_deref());

        aux.insert(
            trip_id,
            TripAux {
                delay,
                direction_id: update.trip.direction_id,
                route_id: update.trip.route_id.as_deref(),
                last_stop_id,
            },
        );
    }
    aux
}

/// Join the two feed snapshots against the catalog.
///
/// Pure: builds only transient per-cycle indexes and returns a fresh list,
/// so reconciling the same snapshots twice yields identical output and
/// overlapping cycles cannot corrupt shared state.
pub fn reconcile(
    positions: &FeedMessage,
    updates: &FeedMessage,
    catalog: &Catalog,
    agency: Option<Agency>,
) -> Vec<Vehicle> {
    let aux = build_trip_aux(updates);
    let stop_names: HashMap<&str, &str> = catalog
        .stops
        .iter()
        .map(|s| (s.id.as_str(), s.name.as_str()))
        .collect();
    let manifest_by_route: HashMap<&str, &ManifestEntry> = catalog
        .manifest
        .iter()
        .map(|m| (m.id.as_str(), m))
        .collect();

    let mut vehicles = Vec::new();
    let mut dropped = 0usize;
    for entity in &positions.entity {
        let Some(vp) = &entity.vehicle else { continue };
        let Some(trip) = &vp.trip else { continue };
        let Some(position) = &vp.position else {
            continue;
        };
        let Some(trip_id) = trip.trip_id.as_deref() else {
            continue;
        };

        // Stale or out-of-scope trips have no index entry and are dropped.
        let Some(index_entry) = catalog.trip_index.get(trip_id) else {
            dropped += 1;
            continue;
        };
        let info = aux.get(trip_id);

        let route_id = if !index_entry.route_id.is_empty() {
            index_entry.route_id.as_str()
        } else if let Some(route_id) = info.and_then(|i| i.route_id) {
            route_id
        } else {
            dropped += 1;
            continue;
        };
        let direction_id = trip
            .direction_id
            .or_else(|| info.and_then(|i| i.direction_id));

        let Some(&manifest) = manifest_by_route.get(route_id) else {
            dropped += 1;
            continue;
        };
        if let Some(wanted) = agency {
            if manifest.agency != wanted {
                continue;
            }
        }

        let last_stop_name = info
            .and_then(|i| i.last_stop_id)
            .and_then(|stop_id| stop_names.get(stop_id).copied());
        let destination = destination::resolve(&ResolveContext {
            static_headsign: index_entry.headsign.as_deref(),
            route_id,
            direction_id,
            directions: &catalog.directions,
            last_stop_name,
            manifest,
        })
        .unwrap_or_else(|| UNKNOWN_DESTINATION.to_string());

        let descriptor = vp.vehicle.as_ref();
        let id = descriptor
            .and_then(|d| d.id.clone())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| entity.id.clone());
        let vehicle_number = descriptor
            .and_then(|d| d.label.clone())
            .filter(|s| !s.is_empty())
            .or_else(|| tail(&id, 4))
            .unwrap_or_else(|| "N/A".to_string());

        vehicles.push(Vehicle {
            contractor: contractor::contractor_for_vehicle(&id),
            id,
            route_id: route_id.to_string(),
            trip_id: trip_id.to_string(),
            operator: manifest.agency.operator_label().to_string(),
            vehicle_number,
            lat: position.latitude as f64,
            lng: position.longitude as f64,
            bearing: position.bearing.unwrap_or(0.0) as f64,
            speed: position.speed.unwrap_or(0.0) as f64 * MPS_TO_KMH,
            destination,
            kind: match manifest.agency {
                Agency::Waab => VehicleKind::Ferry,
                Agency::Sl => VehicleKind::Bus,
            },
            agency: manifest.agency,
            delay: info.and_then(|i| i.delay),
        });
    }

    debug!(
        vehicles = vehicles.len(),
        dropped, "Reconciled vehicle feed"
    );
    vehicles
}

/// Find a vehicle by fleet number, or by id suffix as typed by a user.
pub fn find_vehicle<'a>(vehicles: &'a [Vehicle], number: &str) -> Option<&'a Vehicle> {
    vehicles
        .iter()
        .find(|v| v.vehicle_number == number || v.id.ends_with(number))
}

/// Last `n` characters of `s`; `None` for an empty string.
fn tail(s: &str, n: usize) -> Option<String> {
    if s.is_empty() {
        return None;
    }
    let start = s
        .char_indices()
        .rev()
        .nth(n - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    Some(s[start..].to_string())
}
