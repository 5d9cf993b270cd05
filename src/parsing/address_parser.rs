// src/parsing/address_parser.rs - Free-text address -> structured components
//
// Rules run in a fixed order, each on the output of the previous one:
// unit extraction, city-prefix stripping, range/list normalization,
// house-number split, street-suffix abbreviation, city/suburb split,
// postal normalization. Nothing in here fails; bad input degrades to
// absent fields.
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::address::{ParsedAddress, PostalHint, RawAddressRecord};

static KEYWORD_UNIT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)[\s,]*#?\s*\b(unit|suite|ste|apt|apartment)\b\.?\s*#?\s*([a-z]?\d+[a-z]?(?:-\d+[a-z]?)?|[a-z])\b[\s,]*",
    )
    .expect("valid unit regex")
});

static HASH_UNIT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[\s,]*#\s*([a-z0-9]+(?:-[a-z0-9]+)?)\s*,?\s*$").expect("valid hash unit regex")
});

static COMMA_LIST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+[A-Za-z]?(?:\s*,\s*\d+[A-Za-z]?)+)(?:\s*&\s*(\d+[A-Za-z]?))?(\s|$)")
        .expect("valid comma list regex")
});

static AMPERSAND_PAIR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\s*&\s*(\d+)").expect("valid ampersand regex"));

static HYPHEN_RANGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+[A-Za-z]?\s*-\s*\d+[A-Za-z]?)(?:\s+(.*))?$").expect("valid range regex")
});

static STREET_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\s(STREET|AVENUE|ROAD|BOULEVARD|DRIVE|LANE|COURT|CRESCENT|PLACE|CIRCLE|PARKWAY|HIGHWAY|TRAIL)(\s+(?:N|S|E|W|NE|NW|SE|SW|NORTH|SOUTH|EAST|WEST))?$",
    )
    .expect("valid suffix regex")
});

static CITY_SUBURB_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)\s*\(\s*([^)]*?)\s*\)\s*$").expect("valid city regex"));

/// Words that name the road itself when they sit right before a number
/// ("HWY 7", "CONCESSION 3"). A number after one of these is not a house number.
const ROAD_DESIGNATORS: &[&str] = &[
    "HWY", "HIGHWAY", "RD", "ROAD", "RTE", "ROUTE", "CONCESSION", "CONC", "LINE", "SIDEROAD",
    "COUNTY", "REGIONAL", "RR", "LOT",
];

fn street_suffix_abbreviation(word: &str) -> &'static str {
    match word {
        "STREET" => "ST",
        "AVENUE" => "AVE",
        "ROAD" => "RD",
        "BOULEVARD" => "BLVD",
        "DRIVE" => "DR",
        "LANE" => "LN",
        "COURT" => "CT",
        "CRESCENT" => "CRES",
        "PLACE" => "PL",
        "CIRCLE" => "CIR",
        "PARKWAY" => "PKWY",
        "HIGHWAY" => "HWY",
        "TRAIL" => "TRL",
        _ => "",
    }
}

/// Parses one raw record.
pub fn parse_record(raw: &RawAddressRecord) -> ParsedAddress {
    parse(
        &raw.address_text,
        raw.city_hint.as_deref(),
        raw.postal_hint.as_deref(),
    )
}

pub fn parse(address_text: &str, city_hint: Option<&str>, postal_hint: Option<&str>) -> ParsedAddress {
    if address_text.trim().is_empty() {
        return ParsedAddress::default();
    }

    let (working, unit) = extract_unit(address_text);
    let working = strip_city_prefix(&working);
    let working = normalize_number_list(&working);
    let (house_number_token, street_rest) = split_house_number(&working);
    let street_name = abbreviate_street_suffix(&clean_street(&street_rest));
    let (city, suburb) = split_city_suburb(city_hint);
    let postal = postal_hint.and_then(normalize_postal);

    let parsed = ParsedAddress {
        house_number_token,
        street_name,
        unit,
        city,
        suburb,
        postal,
    };
    debug!("Parsed '{}' -> {:?}", address_text, parsed);
    parsed
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Rule 1: pull a unit/suite designator out of the address.
pub fn extract_unit(address: &str) -> (String, Option<String>) {
    if let Some(caps) = KEYWORD_UNIT_RE.captures(address) {
        if let (Some(whole), Some(keyword), Some(token)) = (caps.get(0), caps.get(1), caps.get(2)) {
            let unit = format!("{} {}", keyword.as_str(), token.as_str());
            let remainder = format!("{} {}", &address[..whole.start()], &address[whole.end()..]);
            return (tidy_remainder(&remainder), Some(unit));
        }
    }
    if let Some(caps) = HASH_UNIT_RE.captures(address) {
        if let (Some(whole), Some(token)) = (caps.get(0), caps.get(1)) {
            let remainder = &address[..whole.start()];
            return (tidy_remainder(remainder), Some(token.as_str().to_string()));
        }
    }
    (collapse_whitespace(address), None)
}

fn tidy_remainder(s: &str) -> String {
    collapse_whitespace(s)
        .trim_matches(|c: char| c == ',' || c.is_whitespace())
        .to_string()
}

/// Rule 2: "Quinte West 178 Front St" -> "178 Front St".
pub fn strip_city_prefix(address: &str) -> String {
    let tokens: Vec<&str> = address.split_whitespace().collect();
    let first_numeric = tokens
        .iter()
        .position(|t| t.chars().next().map_or(false, |c| c.is_ascii_digit()));

    match first_numeric {
        Some(idx) if idx > 0 => {
            let preceding = tokens[idx - 1]
                .trim_matches(|c: char| c == '.' || c == ',')
                .to_ascii_uppercase();
            if ROAD_DESIGNATORS.contains(&preceding.as_str()) {
                return tokens.join(" ");
            }
            debug!("Dropping city prefix '{}'", tokens[..idx].join(" "));
            tokens[idx..].join(" ")
        }
        _ => tokens.join(" "),
    }
}

/// Rule 3: "10, 20 & 30 X" -> "10,20,30 X"; "8 & 14 X" -> "8 - 14 X".
pub fn normalize_number_list(address: &str) -> String {
    if let Some(caps) = COMMA_LIST_RE.captures(address) {
        if let Some(whole) = caps.get(0) {
            let mut numbers: Vec<String> = caps[1]
                .split(',')
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect();
            if let Some(last) = caps.get(2) {
                numbers.push(last.as_str().to_string());
            }
            let rest = address[whole.end()..].trim();
            return format!("{} {}", numbers.join(","), rest).trim().to_string();
        }
    }
    AMPERSAND_PAIR_RE.replace(address, "$1 - $2").into_owned()
}

/// Rule 4: leading house-number token and the remaining street text.
pub fn split_house_number(address: &str) -> (Option<String>, String) {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return (None, String::new());
    }
    if let Some(caps) = HYPHEN_RANGE_RE.captures(trimmed) {
        let token = collapse_whitespace(&caps[1]);
        let rest = caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default();
        return (Some(token), rest);
    }
    match trimmed.split_once(char::is_whitespace) {
        Some((token, rest)) => (Some(token.trim_end_matches(',').to_string()), rest.to_string()),
        None => (Some(trimmed.trim_end_matches(',').to_string()), String::new()),
    }
}

fn clean_street(street: &str) -> String {
    collapse_whitespace(street)
        .trim_matches(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .to_uppercase()
}

/// Rule 5: full street-type word at the end of the name -> abbreviation.
pub fn abbreviate_street_suffix(street: &str) -> String {
    let upper = street.to_uppercase();
    let Some(caps) = STREET_SUFFIX_RE.captures(&upper) else {
        return upper;
    };
    let (Some(whole), Some(word)) = (caps.get(0), caps.get(1)) else {
        return upper;
    };
    let abbreviation = street_suffix_abbreviation(word.as_str());
    let direction = caps.get(2).map(|d| d.as_str()).unwrap_or("");
    format!("{} {}{}", &upper[..whole.start()], abbreviation, direction)
}

/// Rule 6: "Toronto (Scarborough)" -> city "Toronto", suburb "Scarborough".
pub fn split_city_suburb(city_hint: Option<&str>) -> (Option<String>, Option<String>) {
    let Some(hint) = city_hint.map(str::trim).filter(|h| !h.is_empty()) else {
        return (None, None);
    };
    if let Some(caps) = CITY_SUBURB_RE.captures(hint) {
        let city = caps[1].trim().trim_end_matches(',').to_string();
        let suburb = caps[2].trim().to_string();
        return (
            Some(city).filter(|c| !c.is_empty()),
            Some(suburb).filter(|s| !s.is_empty()),
        );
    }
    (Some(hint.to_string()), None)
}

/// Rule 7: six alphanumerics -> `AAA BAA`; anything else stays as given and
/// is flagged non-canonical.
pub fn normalize_postal(hint: &str) -> Option<PostalHint> {
    if hint.trim().is_empty() {
        return None;
    }
    let compact: String = hint
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();
    if compact.chars().count() == 6 && compact.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(PostalHint::Canonical(format!("{} {}", &compact[..3], &compact[3..])))
    } else {
        Some(PostalHint::NonCanonical(hint.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_city_prefix_and_hash_unit() {
        let p = parse(
            "St. Catharines 212 Welland Avenue #Unit 5",
            Some("St. Catharines"),
            None,
        );
        assert_eq!(p.house_number_token.as_deref(), Some("212"));
        assert_eq!(p.street_name, "WELLAND AVE");
        assert_eq!(p.unit.as_deref(), Some("Unit 5"));
        assert_eq!(p.city.as_deref(), Some("St. Catharines"));
        assert!(p.suburb.is_none());
    }

    #[test]
    fn test_spaced_hyphen_range_kept_whole() {
        let p = parse("251 - 255 DAVENPORT RD", Some("Toronto"), None);
        assert_eq!(p.house_number_token.as_deref(), Some("251 - 255"));
        assert_eq!(p.street_name, "DAVENPORT RD");
        assert_eq!(p.city.as_deref(), Some("Toronto"));
    }

    #[test]
    fn test_ampersand_pair_becomes_range() {
        let p = parse("8 & 14 Queen Street", None, None);
        assert_eq!(p.house_number_token.as_deref(), Some("8 - 14"));
        assert_eq!(p.street_name, "QUEEN ST");
    }

    #[test]
    fn test_comma_list_becomes_list_token() {
        let p = parse("10, 20 & 30 Broadleaf Avenue", None, None);
        assert_eq!(p.house_number_token.as_deref(), Some("10,20,30"));
        assert_eq!(p.street_name, "BROADLEAF AVE");
    }

    #[test]
    fn test_city_suburb_split() {
        let p = parse("100 Borough Dr", Some("Toronto (Scarborough)"), None);
        assert_eq!(p.city.as_deref(), Some("Toronto"));
        assert_eq!(p.suburb.as_deref(), Some("Scarborough"));
    }

    #[test]
    fn test_postal_normalization() {
        assert_eq!(
            normalize_postal("L1N9L4"),
            Some(PostalHint::Canonical("L1N 9L4".to_string()))
        );
        assert_eq!(
            normalize_postal("L1N 9L4"),
            Some(PostalHint::Canonical("L1N 9L4".to_string()))
        );
        assert_eq!(
            normalize_postal("l1n9l4"),
            Some(PostalHint::Canonical("L1N 9L4".to_string()))
        );
        assert_eq!(
            normalize_postal("L1N9L"),
            Some(PostalHint::NonCanonical("L1N9L".to_string()))
        );

        let p = parse("1 Main St", None, Some("L1N9L"));
        assert_eq!(p.postal_code(), None);
    }

    #[test]
    fn test_empty_address_is_unparseable() {
        let p = parse("   ", Some("Toronto"), Some("M4T1Z2"));
        assert_eq!(p, ParsedAddress::default());
        assert!(p.is_unparseable());
        assert_eq!(p.street_name, "");
    }

    #[test]
    fn test_unit_keyword_variants() {
        assert_eq!(
            extract_unit("123 Main St Suite 105"),
            ("123 Main St".to_string(), Some("Suite 105".to_string()))
        );
        assert_eq!(
            extract_unit("123 Main St Apt. 24"),
            ("123 Main St".to_string(), Some("Apt 24".to_string()))
        );
        assert_eq!(
            extract_unit("Unit 7, 55 King St W"),
            ("55 King St W".to_string(), Some("Unit 7".to_string()))
        );
        assert_eq!(
            extract_unit("123 Main St #42"),
            ("123 Main St".to_string(), Some("42".to_string()))
        );
        assert_eq!(extract_unit("45 Ste Marie Rd").1, None);
    }

    #[test]
    fn test_highway_number_is_not_a_city_prefix() {
        assert_eq!(strip_city_prefix("HWY 7"), "HWY 7");
        assert_eq!(strip_city_prefix("Quinte West 178 Front St"), "178 Front St");
    }

    #[test]
    fn test_alphabetic_house_token_preserved() {
        let p = parse("Rear Lot Main Street", None, None);
        assert_eq!(p.house_number_token.as_deref(), Some("Rear"));
        assert_eq!(p.street_name, "LOT MAIN ST");
    }

    #[test]
    fn test_suffix_only_rewritten_at_end() {
        assert_eq!(abbreviate_street_suffix("KING STREET WEST"), "KING ST WEST");
        assert_eq!(abbreviate_street_suffix("STREETSVILLE ROAD"), "STREETSVILLE RD");
        assert_eq!(abbreviate_street_suffix("AVENUE ROAD"), "AVENUE RD");
        assert_eq!(abbreviate_street_suffix("PARK LANE CIRCLE"), "PARK LANE CIR");
    }

    #[test]
    fn test_parse_record_uses_raw_hints() {
        let raw = RawAddressRecord::new(
            "p1",
            crate::models::address::SourceKind::Transaction,
            "1521 Yonge Street",
            Some("Toronto".to_string()),
            Some("M4T1Z2".to_string()),
            None,
        );
        let p = parse_record(&raw);
        assert_eq!(p.house_number_token.as_deref(), Some("1521"));
        assert_eq!(p.street_name, "YONGE ST");
        assert_eq!(p.postal_code(), Some("M4T 1Z2"));
    }
}
