//! Destination resolution for live vehicles.
//!
//! An ordered list of resolvers, evaluated top-down with short-circuit on
//! the first non-empty answer. The order follows data quality: per-trip
//! static headsign, then the per-direction table, then the last stop seen in
//! the trip-update feed, then the route's terminal from the manifest.

use crate::catalog::{DirectionTable, ManifestEntry};

pub struct ResolveContext<'a> {
    /// Headsign recorded in the trip-to-route index for this trip.
    pub static_headsign: Option<&'a str>,
    pub route_id: &'a str,
    pub direction_id: Option<u32>,
    pub directions: &'a DirectionTable,
    /// Name of the last stop id reported by the trip-update feed.
    pub last_stop_name: Option<&'a str>,
    pub manifest: &'a ManifestEntry,
}

type Resolver = fn(&ResolveContext) -> Option<String>;

const RESOLVERS: &[Resolver] = &[
    static_headsign,
    direction_headsign,
    last_stop_name,
    terminal_stop,
];

/// First resolver to produce a non-empty label wins; `None` when all miss.
pub fn resolve(cx: &ResolveContext) -> Option<String> {
    RESOLVERS.iter().find_map(|resolver| resolver(cx))
}

fn static_headsign(cx: &ResolveContext) -> Option<String> {
    cx.static_headsign
        .filter(|h| !h.is_empty())
        .map(str::to_string)
}

fn direction_headsign(cx: &ResolveContext) -> Option<String> {
    let direction = cx.direction_id?;
    cx.directions
        .get(cx.route_id)?
        .get(&direction.to_string())
        .filter(|h| !h.is_empty())
        .cloned()
}

fn last_stop_name(cx: &ResolveContext) -> Option<String> {
    cx.last_stop_name
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

// A one-stop loop would label the vehicle with its own origin, so the
// terminal only counts when it differs from the first stop.
fn terminal_stop(cx: &ResolveContext) -> Option<String> {
    if !cx.manifest.to.is_empty() && cx.manifest.to != cx.manifest.from {
        Some(cx.manifest.to.clone())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Agency;
    use std::collections::HashMap;

    fn manifest() -> ManifestEntry {
        ManifestEntry {
            id: "R1".into(),
            line: "176".into(),
            from: "Mörby centrum".into(),
            to: "Stenhamra".into(),
            agency: Agency::Sl,
        }
    }

    fn directions() -> DirectionTable {
        HashMap::from([(
            "R1".to_string(),
            HashMap::from([("1".to_string(), "Mörby centrum".to_string())]),
        )])
    }

    fn context<'a>(
        static_headsign: Option<&'a str>,
        direction_id: Option<u32>,
        directions: &'a DirectionTable,
        last_stop_name: Option<&'a str>,
        manifest: &'a ManifestEntry,
    ) -> ResolveContext<'a> {
        ResolveContext {
            static_headsign,
            route_id: "R1",
            direction_id,
            directions,
            last_stop_name,
            manifest,
        }
    }

    #[test]
    fn static_headsign_wins_over_everything() {
        let manifest = manifest();
        let directions = directions();
        let cx = context(
            Some("Stenhamra"),
            Some(1),
            &directions,
            Some("Slussen"),
            &manifest,
        );
        assert_eq!(resolve(&cx).as_deref(), Some("Stenhamra"));
    }

    #[test]
    fn direction_table_is_second() {
        let manifest = manifest();
        let directions = directions();
        let cx = context(None, Some(1), &directions, Some("Slussen"), &manifest);
        assert_eq!(resolve(&cx).as_deref(), Some("Mörby centrum"));
    }

    #[test]
    fn last_stop_is_third() {
        let manifest = manifest();
        let directions = directions();
        // Direction 0 has no table entry, so the last reported stop wins.
        let cx = context(None, Some(0), &directions, Some("Slussen"), &manifest);
        assert_eq!(resolve(&cx).as_deref(), Some("Slussen"));
    }

    #[test]
    fn terminal_stop_is_the_last_resort() {
        let manifest = manifest();
        let directions = DirectionTable::new();
        let cx = context(None, None, &directions, None, &manifest);
        assert_eq!(resolve(&cx).as_deref(), Some("Stenhamra"));
    }

    #[test]
    fn terminal_equal_to_origin_does_not_resolve() {
        let mut manifest = manifest();
        manifest.to = manifest.from.clone();
        let directions = DirectionTable::new();
        let cx = context(None, None, &directions, None, &manifest);
        assert_eq!(resolve(&cx), None);
    }

    #[test]
    fn empty_static_headsign_falls_through() {
        let manifest = manifest();
        let directions = directions();
        let cx = context(Some(""), Some(1), &directions, None, &manifest);
        assert_eq!(resolve(&cx).as_deref(), Some("Mörby centrum"));
    }
}
