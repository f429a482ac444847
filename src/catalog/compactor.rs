//! Two-pass streaming compaction of the static GTFS archive.
//!
//! Pass 1 streams routes, trips and stop_times once to build small
//! membership indexes sized to the retained subset (allow-listed agencies,
//! one representative trip per route). Pass 2 streams stop_times, stops and
//! shapes again, filtering against those indexes. Peak memory stays
//! proportional to the selected subset, not the archive.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{Read, Seek};
use std::path::Path;

use tracing::{info, warn};
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::GtfsError;

use super::{Agency, Catalog, DirectionTable, LineRoute, ManifestEntry, Stop, TripIndexEntry};

/// Everything one compaction run produces: the per-route documents, the
/// global catalog artifacts, and diagnostics for what was dropped.
#[derive(Debug)]
pub struct Compaction {
    pub lines: Vec<LineRoute>,
    pub catalog: Catalog,
    /// Route ids excluded for having fewer than 2 resolved stops.
    pub excluded_routes: Vec<String>,
}

impl Compaction {
    /// Write all artifacts. The `lines/` directory is recreated from
    /// scratch so stale route documents from a previous schedule cannot
    /// linger.
    pub fn write_to(&self, out_dir: &Path) -> Result<(), GtfsError> {
        let lines_dir = out_dir.join("lines");
        if lines_dir.exists() {
            fs::remove_dir_all(&lines_dir)?;
        }
        fs::create_dir_all(&lines_dir)?;

        for line in &self.lines {
            let file = fs::File::create(lines_dir.join(format!("{}.json", line.id)))?;
            serde_json::to_writer(file, line)?;
        }
        self.catalog.write_to(out_dir)?;

        info!(
            lines = self.lines.len(),
            stops = self.catalog.stops.len(),
            out_dir = %out_dir.display(),
            "Wrote catalog artifacts"
        );
        Ok(())
    }
}

struct RouteRec {
    route_id: String,
    line: String,
    agency: Agency,
}

struct TripRec {
    trip_id: String,
    route_id: String,
    shape_id: Option<String>,
    headsign: Option<String>,
    direction_id: Option<u32>,
}

struct StopTimeRec {
    stop_id: String,
    sequence: i64,
}

struct ShapePoint {
    lat: f64,
    lng: f64,
    sequence: i64,
}

/// Compact the archive into catalog artifacts.
///
/// Any required table missing from the zip aborts with
/// [`GtfsError::MissingTable`]. Routes of unmapped agencies and routes with
/// fewer than 2 resolvable stops are dropped silently (the latter are
/// reported in [`Compaction::excluded_routes`]).
pub fn compact<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    agencies: &HashMap<String, Agency>,
) -> Result<Compaction, GtfsError> {
    // Pass 1: membership indexes.
    let routes = parse_routes(archive, agencies)?;
    let route_ids: HashSet<String> = routes.iter().map(|r| r.route_id.clone()).collect();
    let trips = parse_trips(archive, &route_ids)?;
    let trip_ids: HashSet<String> = trips.iter().map(|t| t.trip_id.clone()).collect();
    let stop_counts = count_stop_times(archive, &trip_ids)?;

    // Representative trip per route: highest stop-time count wins, ties go
    // to the trip seen first in the file. Values index into `trips`.
    let mut representative: HashMap<String, (usize, u32)> = HashMap::new();
    for (i, trip) in trips.iter().enumerate() {
        let count = stop_counts.get(&trip.trip_id).copied().unwrap_or(0);
        match representative.get(trip.route_id.as_str()) {
            Some(&(_, best)) if count <= best => {}
            _ => {
                representative.insert(trip.route_id.clone(), (i, count));
            }
        }
    }
    let rep_trip_ids: HashSet<String> = representative
        .values()
        .map(|&(i, _)| trips[i].trip_id.clone())
        .collect();
    let shape_ids: HashSet<String> = representative
        .values()
        .filter_map(|&(i, _)| trips[i].shape_id.clone())
        .collect();

    info!(
        routes = routes.len(),
        trips = trips.len(),
        representatives = rep_trip_ids.len(),
        shapes = shape_ids.len(),
        "Selected representative trips"
    );

    // Pass 2: stream the archive again, filtering against the indexes.
    let stop_times = collect_stop_times(archive, &rep_trip_ids)?;
    let needed_stop_ids: HashSet<String> = stop_times
        .values()
        .flatten()
        .map(|st| st.stop_id.clone())
        .collect();
    let (stops, stop_idx) = parse_stops(archive, &needed_stop_ids)?;
    let shapes = parse_shapes(archive, &shape_ids)?;

    // Assemble per-route documents in routes.txt order.
    let mut lines = Vec::new();
    let mut manifest = Vec::new();
    let mut excluded_routes = Vec::new();
    for route in &routes {
        let Some(&(rep_idx, _)) = representative.get(route.route_id.as_str()) else {
            continue;
        };
        let rep = &trips[rep_idx];

        let route_stops: Vec<Stop> = stop_times
            .get(&rep.trip_id)
            .map(|sts| {
                sts.iter()
                    .filter_map(|st| {
                        stop_idx.get(&st.stop_id).map(|&i| Stop {
                            agency: Some(route.agency),
                            ..stops[i].clone()
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        if route_stops.len() < 2 {
            excluded_routes.push(route.route_id.clone());
            continue;
        }

        let path: Vec<[f64; 2]> = rep
            .shape_id
            .as_ref()
            .and_then(|sid| shapes.get(sid))
            .filter(|points| !points.is_empty())
            .map(|points| points.iter().map(|p| [p.lat, p.lng]).collect())
            .unwrap_or_else(|| route_stops.iter().map(|s| [s.lat, s.lng]).collect());

        manifest.push(ManifestEntry {
            id: route.route_id.clone(),
            line: route.line.clone(),
            from: route_stops[0].name.clone(),
            to: route_stops[route_stops.len() - 1].name.clone(),
            agency: route.agency,
        });
        lines.push(LineRoute {
            id: route.route_id.clone(),
            line: route.line.clone(),
            agency: route.agency,
            path,
            stops: route_stops,
        });
    }

    if !excluded_routes.is_empty() {
        warn!(
            excluded = excluded_routes.len(),
            "Excluded routes with fewer than 2 resolved stops"
        );
    }

    // The realtime join index covers every valid trip, not only the
    // representatives. The direction table comes from the same rows.
    let mut trip_index = HashMap::with_capacity(trips.len());
    let mut directions = DirectionTable::new();
    for TripRec {
        trip_id,
        route_id,
        headsign,
        direction_id,
        ..
    } in trips
    {
        if let (Some(direction), Some(h)) = (direction_id, headsign.as_deref()) {
            directions
                .entry(route_id.clone())
                .or_default()
                .entry(direction.to_string())
                .or_insert_with(|| h.to_string());
        }
        trip_index.insert(trip_id, TripIndexEntry { route_id, headsign });
    }

    info!(
        lines = lines.len(),
        trips_indexed = trip_index.len(),
        "Compacted schedule archive"
    );

    Ok(Compaction {
        lines,
        catalog: Catalog {
            stops,
            manifest,
            trip_index,
            directions,
        },
        excluded_routes,
    })
}

/// Round a coordinate to 5 decimals (~1.1 m), the catalog storage precision.
fn round_coord(value: f64) -> f64 {
    (value * 1e5).round() / 1e5
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

fn open_table<'a, R: Read + Seek>(
    archive: &'a mut ZipArchive<R>,
    name: &'static str,
) -> Result<csv::Reader<Box<dyn Read + 'a>>, GtfsError> {
    match archive.by_name(name) {
        Ok(file) => {
            let reader: Box<dyn Read + 'a> = Box::new(file);
            Ok(csv::Reader::from_reader(reader))
        }
        Err(ZipError::FileNotFound) => Err(GtfsError::MissingTable(name)),
        Err(e) => Err(e.into()),
    }
}

fn required_column(
    headers: &csv::StringRecord,
    table: &str,
    column: &str,
) -> Result<usize, GtfsError> {
    headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| GtfsError::ParseError(format!("{table} missing {column}")))
}

fn parse_routes<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    agencies: &HashMap<String, Agency>,
) -> Result<Vec<RouteRec>, GtfsError> {
    let mut rdr = open_table(archive, "routes.txt")?;
    let headers = rdr.headers()?.clone();

    let idx_id = required_column(&headers, "routes.txt", "route_id")?;
    let idx_agency = required_column(&headers, "routes.txt", "agency_id")?;
    let idx_short = headers.iter().position(|h| h == "route_short_name");
    let idx_long = headers.iter().position(|h| h == "route_long_name");

    let mut routes = Vec::new();
    let mut unknown_agency = 0usize;
    let mut skipped = 0usize;
    for result in rdr.records() {
        let record = result?;
        let route_id = record.get(idx_id).unwrap_or("").to_string();
        if route_id.is_empty() {
            skipped += 1;
            continue;
        }
        let Some(&agency) = record.get(idx_agency).and_then(|raw| agencies.get(raw)) else {
            unknown_agency += 1;
            continue;
        };
        let line = idx_short
            .and_then(|i| record.get(i))
            .and_then(non_empty)
            .or_else(|| idx_long.and_then(|i| record.get(i)).and_then(non_empty))
            .unwrap_or_default();
        routes.push(RouteRec {
            route_id,
            line,
            agency,
        });
    }
    if skipped > 0 {
        warn!(skipped, "Skipped routes.txt records with empty route_id");
    }
    info!(
        retained = routes.len(),
        dropped_unknown_agency = unknown_agency,
        "Filtered routes.txt against agency allow-list"
    );
    Ok(routes)
}

fn parse_trips<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    route_ids: &HashSet<String>,
) -> Result<Vec<TripRec>, GtfsError> {
    let mut rdr = open_table(archive, "trips.txt")?;
    let headers = rdr.headers()?.clone();

    let idx_trip = required_column(&headers, "trips.txt", "trip_id")?;
    let idx_route = required_column(&headers, "trips.txt", "route_id")?;
    let idx_shape = headers.iter().position(|h| h == "shape_id");
    let idx_headsign = headers.iter().position(|h| h == "trip_headsign");
    let idx_direction = headers.iter().position(|h| h == "direction_id");

    let mut trips = Vec::new();
    let mut skipped = 0usize;
    for result in rdr.records() {
        let record = result?;
        let trip_id = record.get(idx_trip).unwrap_or("").to_string();
        if trip_id.is_empty() {
            skipped += 1;
            continue;
        }
        let route_id = record.get(idx_route).unwrap_or("");
        if !route_ids.contains(route_id) {
            continue;
        }
        trips.push(TripRec {
            trip_id,
            route_id: route_id.to_string(),
            shape_id: idx_shape.and_then(|i| record.get(i)).and_then(non_empty),
            headsign: idx_headsign.and_then(|i| record.get(i)).and_then(non_empty),
            direction_id: idx_direction
                .and_then(|i| record.get(i))
                .and_then(|s| s.parse().ok()),
        });
    }
    if skipped > 0 {
        warn!(skipped, "Skipped trips.txt records with empty trip_id");
    }
    info!(retained = trips.len(), "Indexed trips.txt");
    Ok(trips)
}

fn count_stop_times<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    trip_ids: &HashSet<String>,
) -> Result<HashMap<String, u32>, GtfsError> {
    let mut rdr = open_table(archive, "stop_times.txt")?;
    let headers = rdr.headers()?.clone();
    let idx_trip = required_column(&headers, "stop_times.txt", "trip_id")?;

    let mut counts: HashMap<String, u32> = HashMap::new();
    for result in rdr.records() {
        let record = result?;
        let trip_id = record.get(idx_trip).unwrap_or("");
        if let Some(count) = counts.get_mut(trip_id) {
            *count += 1;
        } else if trip_ids.contains(trip_id) {
            counts.insert(trip_id.to_string(), 1);
        }
    }
    info!(trips_counted = counts.len(), "Counted stop_times per trip");
    Ok(counts)
}

fn collect_stop_times<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    rep_trip_ids: &HashSet<String>,
) -> Result<HashMap<String, Vec<StopTimeRec>>, GtfsError> {
    let mut rdr = open_table(archive, "stop_times.txt")?;
    let headers = rdr.headers()?.clone();

    let idx_trip = required_column(&headers, "stop_times.txt", "trip_id")?;
    let idx_seq = required_column(&headers, "stop_times.txt", "stop_sequence")?;
    let idx_stop = required_column(&headers, "stop_times.txt", "stop_id")?;

    let mut stop_times: HashMap<String, Vec<StopTimeRec>> = HashMap::new();
    for result in rdr.records() {
        let record = result?;
        let trip_id = record.get(idx_trip).unwrap_or("");
        if !rep_trip_ids.contains(trip_id) {
            continue;
        }
        stop_times
            .entry(trip_id.to_string())
            .or_default()
            .push(StopTimeRec {
                stop_id: record.get(idx_stop).unwrap_or("").to_string(),
                sequence: record
                    .get(idx_seq)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0),
            });
    }

    for sts in stop_times.values_mut() {
        sts.sort_by_key(|st| st.sequence);
    }
    Ok(stop_times)
}

fn parse_stops<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    needed: &HashSet<String>,
) -> Result<(Vec<Stop>, HashMap<String, usize>), GtfsError> {
    let mut rdr = open_table(archive, "stops.txt")?;
    let headers = rdr.headers()?.clone();

    let idx_id = required_column(&headers, "stops.txt", "stop_id")?;
    let idx_name = headers.iter().position(|h| h == "stop_name");
    let idx_lat = headers.iter().position(|h| h == "stop_lat");
    let idx_lon = headers.iter().position(|h| h == "stop_lon");

    let mut stops = Vec::new();
    let mut index = HashMap::new();
    let mut unplaced = 0usize;
    for result in rdr.records() {
        let record = result?;
        let stop_id = record.get(idx_id).unwrap_or("");
        if !needed.contains(stop_id) {
            continue;
        }
        let lat = idx_lat
            .and_then(|i| record.get(i))
            .and_then(|s| s.parse::<f64>().ok());
        let lon = idx_lon
            .and_then(|i| record.get(i))
            .and_then(|s| s.parse::<f64>().ok());
        let (Some(lat), Some(lon)) = (lat, lon) else {
            unplaced += 1;
            continue;
        };
        index.insert(stop_id.to_string(), stops.len());
        stops.push(Stop {
            id: stop_id.to_string(),
            name: idx_name
                .and_then(|i| record.get(i))
                .unwrap_or("")
                .to_string(),
            lat: round_coord(lat),
            lng: round_coord(lon),
            agency: None,
        });
    }
    if unplaced > 0 {
        warn!(unplaced, "Skipped stops.txt records without coordinates");
    }
    info!(retained = stops.len(), "Collected referenced stops");
    Ok((stops, index))
}

fn parse_shapes<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    shape_ids: &HashSet<String>,
) -> Result<HashMap<String, Vec<ShapePoint>>, GtfsError> {
    let mut rdr = open_table(archive, "shapes.txt")?;
    let headers = rdr.headers()?.clone();

    let idx_id = required_column(&headers, "shapes.txt", "shape_id")?;
    let idx_lat = headers.iter().position(|h| h == "shape_pt_lat");
    let idx_lon = headers.iter().position(|h| h == "shape_pt_lon");
    let idx_seq = headers.iter().position(|h| h == "shape_pt_sequence");

    let mut shapes: HashMap<String, Vec<ShapePoint>> = HashMap::new();
    for result in rdr.records() {
        let record = result?;
        let shape_id = record.get(idx_id).unwrap_or("");
        if !shape_ids.contains(shape_id) {
            continue;
        }
        let lat = idx_lat
            .and_then(|i| record.get(i))
            .and_then(|s| s.parse::<f64>().ok());
        let lon = idx_lon
            .and_then(|i| record.get(i))
            .and_then(|s| s.parse::<f64>().ok());
        let (Some(lat), Some(lon)) = (lat, lon) else {
            continue;
        };
        shapes
            .entry(shape_id.to_string())
            .or_default()
            .push(ShapePoint {
                lat: round_coord(lat),
                lng: round_coord(lon),
                sequence: idx_seq
                    .and_then(|i| record.get(i))
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0),
            });
    }

    for points in shapes.values_mut() {
        points.sort_by_key(|p| p.sequence);
    }
    let total: usize = shapes.values().map(|v| v.len()).sum();
    info!(shapes = shapes.len(), points = total, "Collected shape points");
    Ok(shapes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    const ROUTES_TXT: &str = "\
route_id,agency_id,route_short_name,route_long_name
R1,A-SL,176,Mörby centrum - Stenhamra
R2,A-WAAB,83,Vaxholmslinjen
R4,A-SL,199,Kort linje
RX,A-UNKNOWN,99,Elsewhere
";

    const TRIPS_TXT: &str = "\
trip_id,route_id,shape_id,trip_headsign,direction_id
T1,R1,S1,Stenhamra,0
T2,R1,S1,Mörby centrum,1
T3,R2,,Vaxholm,0
T4,R4,,,
TX,RX,S9,Elsewhere,0
";

    const STOP_TIMES_TXT: &str = "\
trip_id,stop_sequence,stop_id
T1,1,ST-A
T1,2,ST-B
T1,3,ST-C
T2,1,ST-C
T2,2,ST-A
T3,1,ST-D
T3,2,ST-E
T4,1,ST-A
TX,1,ST-A
TX,2,ST-B
";

    const STOPS_TXT: &str = "\
stop_id,stop_name,stop_lat,stop_lon
ST-A,Mörby centrum,59.329312345,18.036299999
ST-B,Danderyds sjukhus,59.33000,18.04000
ST-C,Stenhamra,59.33500,17.98000
ST-D,Strömkajen,59.32500,18.07500
ST-E,Vaxholm,59.40300,18.35100
ST-F,Oanvänd,59.00000,18.00000
";

    const SHAPES_TXT: &str = "\
shape_id,shape_pt_lat,shape_pt_lon,shape_pt_sequence
S1,59.33000,18.04000,2
S1,59.329312345,18.03630,1
S1,59.33500,17.98000,3
";

    fn agencies() -> HashMap<String, Agency> {
        HashMap::from([
            ("A-SL".to_string(), Agency::Sl),
            ("A-WAAB".to_string(), Agency::Waab),
        ])
    }

    fn archive_with(tables: &[(&str, &str)]) -> ZipArchive<Cursor<Vec<u8>>> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            let options = zip::write::SimpleFileOptions::default();
            for (name, contents) in tables {
                writer.start_file(*name, options).unwrap();
                writer.write_all(contents.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }
        cursor.set_position(0);
        ZipArchive::new(cursor).unwrap()
    }

    fn default_tables() -> Vec<(&'static str, &'static str)> {
        vec![
            ("routes.txt", ROUTES_TXT),
            ("trips.txt", TRIPS_TXT),
            ("stop_times.txt", STOP_TIMES_TXT),
            ("stops.txt", STOPS_TXT),
            ("shapes.txt", SHAPES_TXT),
        ]
    }

    fn compact_fixture() -> Compaction {
        let mut archive = archive_with(&default_tables());
        compact(&mut archive, &agencies()).unwrap()
    }

    fn line<'a>(compaction: &'a Compaction, id: &str) -> &'a LineRoute {
        compaction
            .lines
            .iter()
            .find(|l| l.id == id)
            .unwrap_or_else(|| panic!("no line {id}"))
    }

    #[test]
    fn missing_table_is_fatal() {
        let tables: Vec<_> = default_tables()
            .into_iter()
            .filter(|(name, _)| *name != "shapes.txt")
            .collect();
        let mut archive = archive_with(&tables);
        let err = compact(&mut archive, &agencies()).unwrap_err();
        assert!(matches!(err, GtfsError::MissingTable("shapes.txt")));
    }

    #[test]
    fn representative_trip_is_the_most_complete_one() {
        let compaction = compact_fixture();
        // R1 has T1 (3 stop times) and T2 (2): T1 wins.
        let r1 = line(&compaction, "R1");
        let ids: Vec<_> = r1.stops.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["ST-A", "ST-B", "ST-C"]);
    }

    #[test]
    fn representative_selection_prefers_highest_stop_count() {
        let routes = "route_id,agency_id,route_short_name,route_long_name\nR1,A-SL,1,Ett\n";
        let trips =
            "trip_id,route_id,shape_id,trip_headsign,direction_id\nTa,R1,,,\nTb,R1,,,\nTc,R1,,,\n";
        let mut stop_times = String::from("trip_id,stop_sequence,stop_id\n");
        let mut stops = String::from("stop_id,stop_name,stop_lat,stop_lon\n");
        for i in 1..=7 {
            stops.push_str(&format!("P{i},Stopp {i},59.{i},18.0\n"));
        }
        for (trip, count) in [("Ta", 3), ("Tb", 7), ("Tc", 5)] {
            for seq in 1..=count {
                stop_times.push_str(&format!("{trip},{seq},P{seq}\n"));
            }
        }
        let shapes = "shape_id,shape_pt_lat,shape_pt_lon,shape_pt_sequence\n";

        let mut archive = archive_with(&[
            ("routes.txt", routes),
            ("trips.txt", trips),
            ("stop_times.txt", &stop_times),
            ("stops.txt", &stops),
            ("shapes.txt", shapes),
        ]);
        let compaction = compact(&mut archive, &agencies()).unwrap();
        assert_eq!(compaction.lines.len(), 1);
        assert_eq!(compaction.lines[0].stops.len(), 7);
    }

    #[test]
    fn representative_tie_goes_to_first_seen_trip() {
        let routes = "route_id,agency_id,route_short_name,route_long_name\nR1,A-SL,1,Ett\n";
        let trips = "trip_id,route_id,shape_id,trip_headsign,direction_id\nTa,R1,,,\nTb,R1,,,\n";
        let stop_times = "\
trip_id,stop_sequence,stop_id
Ta,1,P1
Ta,2,P2
Tb,1,P3
Tb,2,P4
";
        let stops = "\
stop_id,stop_name,stop_lat,stop_lon
P1,Ett,59.1,18.0
P2,Två,59.2,18.0
P3,Tre,59.3,18.0
P4,Fyra,59.4,18.0
";
        let shapes = "shape_id,shape_pt_lat,shape_pt_lon,shape_pt_sequence\n";

        let mut archive = archive_with(&[
            ("routes.txt", routes),
            ("trips.txt", trips),
            ("stop_times.txt", stop_times),
            ("stops.txt", stops),
            ("shapes.txt", shapes),
        ]);
        let compaction = compact(&mut archive, &agencies()).unwrap();
        let ids: Vec<_> = compaction.lines[0]
            .stops
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(ids, ["P1", "P2"]);
    }

    #[test]
    fn coordinates_are_rounded_to_five_decimals() {
        let compaction = compact_fixture();
        let r1 = line(&compaction, "R1");
        let morby = r1.stops.iter().find(|s| s.id == "ST-A").unwrap();
        assert_eq!(morby.lat, 59.32931);
        assert_eq!(morby.lng, 18.0363);
    }

    #[test]
    fn unknown_agency_routes_are_dropped_silently() {
        let compaction = compact_fixture();
        assert!(compaction.lines.iter().all(|l| l.id != "RX"));
        assert!(compaction.catalog.manifest.iter().all(|m| m.id != "RX"));
        assert!(!compaction.catalog.trip_index.contains_key("TX"));
        // Dropping is not an exclusion diagnostic.
        assert!(!compaction.excluded_routes.contains(&"RX".to_string()));
    }

    #[test]
    fn short_routes_are_excluded_but_diagnosed() {
        let compaction = compact_fixture();
        assert!(compaction.lines.iter().all(|l| l.id != "R4"));
        assert!(compaction.catalog.manifest.iter().all(|m| m.id != "R4"));
        assert_eq!(compaction.excluded_routes, ["R4"]);
        // Their trips still join realtime data.
        assert!(compaction.catalog.trip_index.contains_key("T4"));
    }

    #[test]
    fn path_comes_from_shape_points_in_sequence_order() {
        let compaction = compact_fixture();
        let r1 = line(&compaction, "R1");
        assert_eq!(
            r1.path,
            [
                [59.32931, 18.0363],
                [59.33, 18.04],
                [59.335, 17.98],
            ]
        );
    }

    #[test]
    fn path_falls_back_to_stop_coordinates() {
        let compaction = compact_fixture();
        let r2 = line(&compaction, "R2");
        assert_eq!(r2.path, [[59.325, 18.075], [59.403, 18.351]]);
    }

    #[test]
    fn trip_index_covers_all_valid_trips() {
        let compaction = compact_fixture();
        let index = &compaction.catalog.trip_index;
        assert_eq!(index.len(), 4);
        // The non-representative trip T2 is indexed with its headsign.
        let t2 = &index["T2"];
        assert_eq!(t2.route_id, "R1");
        assert_eq!(t2.headsign.as_deref(), Some("Mörby centrum"));
        assert_eq!(index["T4"].headsign, None);
    }

    #[test]
    fn direction_table_is_derived_from_trips() {
        let compaction = compact_fixture();
        let r1 = &compaction.catalog.directions["R1"];
        assert_eq!(r1["0"], "Stenhamra");
        assert_eq!(r1["1"], "Mörby centrum");
        assert!(!compaction.catalog.directions.contains_key("R4"));
    }

    #[test]
    fn manifest_carries_terminal_stop_names() {
        let compaction = compact_fixture();
        let r1 = compaction
            .catalog
            .manifest
            .iter()
            .find(|m| m.id == "R1")
            .unwrap();
        assert_eq!(r1.from, "Mörby centrum");
        assert_eq!(r1.to, "Stenhamra");
        assert_eq!(r1.line, "176");
        assert_eq!(r1.agency, Agency::Sl);
    }

    #[test]
    fn global_stop_list_is_limited_to_referenced_stops() {
        let compaction = compact_fixture();
        let ids: HashSet<_> = compaction
            .catalog
            .stops
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(ids, HashSet::from(["ST-A", "ST-B", "ST-C", "ST-D", "ST-E"]));
        assert!(compaction.catalog.stops.iter().all(|s| s.agency.is_none()));
    }

    #[test]
    fn per_route_stops_carry_the_agency_tag() {
        let compaction = compact_fixture();
        let r2 = line(&compaction, "R2");
        assert!(r2.stops.iter().all(|s| s.agency == Some(Agency::Waab)));
    }

    #[test]
    fn every_line_has_at_least_two_stops_and_a_path() {
        let compaction = compact_fixture();
        for l in &compaction.lines {
            assert!(l.stops.len() >= 2, "{} has too few stops", l.id);
            assert!(!l.path.is_empty(), "{} has an empty path", l.id);
        }
    }
}
