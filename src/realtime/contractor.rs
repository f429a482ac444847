//! Contractor lookup from the fleet numbering convention: vehicle ids end
//! in a 3-digit operator code followed by a 4-digit fleet number.

/// Resolve the contracted operator from a vehicle id. Returns `None` when
/// the id does not end in the 7-digit fleet pattern; unknown codes get a
/// generic "Entreprenör {code}" label.
pub fn contractor_for_vehicle(vehicle_id: &str) -> Option<String> {
    let bytes = vehicle_id.as_bytes();
    if bytes.len() < 7 {
        return None;
    }
    let tail = &bytes[bytes.len() - 7..];
    if !tail.iter().all(u8::is_ascii_digit) {
        return None;
    }
    // Digits only, so the slice is valid UTF-8.
    let code = std::str::from_utf8(&tail[..3]).ok()?;

    let name = match code {
        "050" => "Blidösundsbolaget",
        "070" | "705" | "706" | "707" | "709" => "AB Stockholms Spårvägar",
        "100" => "Keolis",
        "150" => "VR Sverige",
        "251" => "Connecting Stockholm",
        "300" => "Nobina",
        "450" | "456" | "459" => "Transdev",
        "650" => "SJ Stockholmståg",
        "750" => "Djurgårdens färjetrafik",
        "800" => "Ballerina",
        _ => return Some(format!("Entreprenör {code}")),
    };
    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_resolve() {
        assert_eq!(
            contractor_for_vehicle("9031001003001234").as_deref(),
            Some("Nobina")
        );
        assert_eq!(
            contractor_for_vehicle("90310010507012").as_deref(),
            Some("Blidösundsbolaget")
        );
    }

    #[test]
    fn multi_code_operators_resolve_from_any_code() {
        for code in ["450", "456", "459"] {
            let id = format!("903100{code}4711");
            assert_eq!(contractor_for_vehicle(&id).as_deref(), Some("Transdev"));
        }
    }

    #[test]
    fn unknown_code_gets_generic_label() {
        assert_eq!(
            contractor_for_vehicle("90310019994711").as_deref(),
            Some("Entreprenör 999")
        );
    }

    #[test]
    fn ids_without_fleet_suffix_yield_none() {
        assert_eq!(contractor_for_vehicle("bus-42"), None);
        assert_eq!(contractor_for_vehicle("12345ab"), None);
        assert_eq!(contractor_for_vehicle(""), None);
    }
}
