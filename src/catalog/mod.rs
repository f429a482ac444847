//! Compacted schedule catalog: per-route documents, the global stop list,
//! the route manifest, and the trip-to-route join index produced by the
//! [`compactor`] and consumed by the realtime reconciler.

pub mod compactor;

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::GtfsError;

/// Maximum number of search results returned by [`Catalog::search`].
const SEARCH_LIMIT: usize = 15;

/// Operator tag. A closed set: raw GTFS agency ids map onto these via the
/// configured allow-list, and everything else is excluded from the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Agency {
    Sl,
    Waab,
}

impl Agency {
    /// Rider-facing operator label.
    pub fn operator_label(self) -> &'static str {
        match self {
            Agency::Sl => "SL",
            Agency::Waab => "Blidösundsbolaget",
        }
    }
}

/// A stop as stored in the catalog. Coordinates are rounded to 5 decimals
/// (~1.1 m) at compaction time. The `agency` tag is present on the per-route
/// stop copies and absent on the global stop list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agency: Option<Agency>,
}

/// One per-route catalog document (`lines/{route_id}.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineRoute {
    pub id: String,
    /// Display name: route_short_name, falling back to route_long_name.
    pub line: String,
    pub agency: Agency,
    /// Ordered polyline, `[lat, lng]` pairs.
    pub path: Vec<[f64; 2]>,
    pub stops: Vec<Stop>,
}

/// Lightweight per-route index entry (`manifest.json`), enough for lookup
/// without loading the full route document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: String,
    pub line: String,
    pub from: String,
    pub to: String,
    pub agency: Agency,
}

/// One `trip-to-route.json` entry. The file carries an entry for every
/// valid trip (not only representatives) and is the realtime join index,
/// hence the shortened wire keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripIndexEntry {
    #[serde(rename = "r")]
    pub route_id: String,
    #[serde(rename = "h", default, skip_serializing_if = "Option::is_none")]
    pub headsign: Option<String>,
}

/// route_id -> direction_id -> headsign (`route-directions.json`).
pub type DirectionTable = HashMap<String, HashMap<String, String>>;

/// The global catalog artifacts the reconciler works against.
#[derive(Debug, Default)]
pub struct Catalog {
    pub stops: Vec<Stop>,
    pub manifest: Vec<ManifestEntry>,
    pub trip_index: HashMap<String, TripIndexEntry>,
    pub directions: DirectionTable,
}

impl Catalog {
    /// Load the global artifacts from a compaction output directory.
    ///
    /// `route-directions.json` is optional (older compactions did not emit
    /// it); the other three files are required.
    pub fn read_from(dir: &Path) -> Result<Self, GtfsError> {
        let stops: Vec<Stop> = serde_json::from_reader(fs::File::open(dir.join("stops.json"))?)?;
        let manifest: Vec<ManifestEntry> =
            serde_json::from_reader(fs::File::open(dir.join("manifest.json"))?)?;
        let trip_index: HashMap<String, TripIndexEntry> =
            serde_json::from_reader(fs::File::open(dir.join("trip-to-route.json"))?)?;
        let directions = match fs::File::open(dir.join("route-directions.json")) {
            Ok(file) => serde_json::from_reader(file)?,
            Err(e) => {
                warn!(error = %e, "No route-directions.json, direction headsign fallback disabled");
                DirectionTable::default()
            }
        };

        info!(
            stops = stops.len(),
            routes = manifest.len(),
            trips = trip_index.len(),
            "Loaded catalog artifacts"
        );

        Ok(Self {
            stops,
            manifest,
            trip_index,
            directions,
        })
    }

    /// Write the global artifacts (everything except the per-route docs).
    pub fn write_to(&self, dir: &Path) -> Result<(), GtfsError> {
        fs::create_dir_all(dir)?;
        serde_json::to_writer(fs::File::create(dir.join("stops.json"))?, &self.stops)?;
        serde_json::to_writer(fs::File::create(dir.join("manifest.json"))?, &self.manifest)?;
        serde_json::to_writer(
            fs::File::create(dir.join("trip-to-route.json"))?,
            &self.trip_index,
        )?;
        serde_json::to_writer(
            fs::File::create(dir.join("route-directions.json"))?,
            &self.directions,
        )?;
        Ok(())
    }

    /// Search lines (display-name prefix) and stops (name substring) for one
    /// agency, capped at 15 results. Stops without an agency tag count as SL.
    pub fn search(&self, query: &str, agency: Agency) -> Vec<SearchResult> {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return Vec::new();
        }

        let mut results = Vec::new();
        for entry in &self.manifest {
            if entry.agency == agency && entry.line.to_lowercase().starts_with(&q) {
                results.push(SearchResult {
                    kind: SearchResultKind::Line,
                    id: entry.id.clone(),
                    title: format!("Linje {}", entry.line),
                    subtitle: format!("{} - {}", entry.from, entry.to),
                    agency,
                });
            }
        }
        for stop in &self.stops {
            if results.len() >= SEARCH_LIMIT {
                break;
            }
            let stop_agency = stop.agency.unwrap_or(Agency::Sl);
            if stop_agency == agency && stop.name.to_lowercase().contains(&q) {
                results.push(SearchResult {
                    kind: SearchResultKind::Stop,
                    id: stop.id.clone(),
                    title: stop.name.clone(),
                    subtitle: match agency {
                        Agency::Waab => "Brygga".to_string(),
                        Agency::Sl => "Hållplats".to_string(),
                    },
                    agency: stop_agency,
                });
            }
        }
        results
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchResultKind {
    Line,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    #[serde(rename = "type")]
    pub kind: SearchResultKind,
    pub id: String,
    pub title: String,
    pub subtitle: String,
    pub agency: Agency,
}
