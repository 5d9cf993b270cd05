// src/matching/amalgamations.rs - Former municipality -> current municipality
use std::collections::HashMap;

use crate::matching::city_index::normalize_city_key;

/// Ontario municipalities merged into a larger one. Current name first,
/// followed by the former names (and their common abbreviations) it absorbed.
const ONTARIO_AMALGAMATIONS: &[(&str, &[&str])] = &[
    (
        "TORONTO",
        &["ETOBICOKE", "NORTH YORK", "SCARBOROUGH", "YORK", "EAST YORK", "N YORK", "E YORK"],
    ),
    (
        "OTTAWA",
        &[
            "NEPEAN", "GLOUCESTER", "KANATA", "ORLEANS", "VANIER", "CUMBERLAND", "OSGOODE",
            "RIDEAU", "WEST CARLETON", "GOULBOURN", "ROCKCLIFFE PARK",
        ],
    ),
    ("HAMILTON", &["DUNDAS", "FLAMBOROUGH", "GLANBROOK", "STONEY CREEK", "ANCASTER"]),
    (
        "GREATER SUDBURY",
        &[
            "SUDBURY", "VALLEY EAST", "RAYSIDE-BALFOUR", "ONAPING FALLS", "WALDEN",
            "NICKEL CENTRE", "CAPREOL",
        ],
    ),
    (
        "CHATHAM-KENT",
        &["CHATHAM", "WALLACEBURG", "TILBURY", "BLENHEIM", "DRESDEN", "MERLIN"],
    ),
    ("KAWARTHA LAKES", &["LINDSAY", "FENELON FALLS", "BOBCAYGEON", "OMEMEE"]),
    ("MISSISSIPPI MILLS", &["ALMONTE", "PAKENHAM", "CLAYTON"]),
    ("QUINTE WEST", &["TRENTON", "FRANKFORD", "BATAWA", "QUINTE W"]),
    ("CENTRE WELLINGTON", &["ELORA", "FERGUS", "SALEM"]),
    ("HALTON HILLS", &["GEORGETOWN", "ACTON"]),
    ("BRADFORD WEST GWILLIMBURY", &["BRADFORD"]),
    ("EAST GWILLIMBURY", &["E GWILLIMBURY"]),
    ("GREATER NAPANEE", &["NAPANEE"]),
    ("NORTH GRENVILLE", &["KEMPTVILLE"]),
    ("SAUGEEN SHORES", &["PORT ELGIN", "SOUTHAMPTON"]),
    ("SAINT MARYS", &["ST MARYS"]),
];

/// Immutable former -> current mapping, keyed by normalized former name.
#[derive(Debug, Clone, Default)]
pub struct AmalgamationTable {
    former_to_current: HashMap<String, String>,
}

impl AmalgamationTable {
    pub fn ontario() -> Self {
        Self::from_pairs(
            ONTARIO_AMALGAMATIONS
                .iter()
                .flat_map(|(current, formers)| formers.iter().map(move |f| (*f, *current))),
        )
    }

    /// `(former, current)` pairs. When a former name appears twice the first
    /// declaration wins; self-mappings are ignored.
    pub fn from_pairs<I, A, B>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: AsRef<str>,
        B: AsRef<str>,
    {
        let mut former_to_current = HashMap::new();
        for (former, current) in pairs {
            let key = normalize_city_key(former.as_ref());
            let current = current.as_ref().trim().to_uppercase();
            if key.is_empty() || key == normalize_city_key(&current) {
                continue;
            }
            former_to_current.entry(key).or_insert(current);
        }
        Self { former_to_current }
    }

    pub fn current_for(&self, former: &str) -> Option<&str> {
        self.former_to_current
            .get(&normalize_city_key(former))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.former_to_current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.former_to_current.is_empty()
    }
}
