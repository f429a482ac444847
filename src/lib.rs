//! Live vehicle tracking core for the SL (Storstockholms Lokaltrafik) and
//! Waxholmsbolaget networks.
//!
//! Three pieces, leaves first: a batch compactor that streams the bulk GTFS
//! archive into a small queryable catalog, a per-poll reconciler that joins
//! the two GTFS-RT feeds against that catalog into an enriched vehicle list,
//! and a pure passage detector that classifies which stops a vehicle
//! actually visited from its recorded trajectory.

pub mod catalog;
pub mod config;
pub mod error;
pub mod geo;
pub mod passage;
pub mod realtime;
