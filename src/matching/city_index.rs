// src/matching/city_index.rs - Immutable distinct-city set of the reference
use std::collections::HashMap;
use strsim::normalized_levenshtein;

/// Upper-cases, drops periods and collapses whitespace so "St. Catharines"
/// and "ST CATHARINES" compare equal.
pub fn normalize_city_key(city: &str) -> String {
    city.to_uppercase()
        .replace('.', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Similarity on the 0..=100 scale used by the confidence table.
pub fn similarity_score(a: &str, b: &str) -> u8 {
    let ratio = normalized_levenshtein(&normalize_city_key(a), &normalize_city_key(b));
    (ratio * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Distinct reference cities keyed by their normalized form. Built once per
/// run and shared read-only by every worker.
#[derive(Debug, Clone, Default)]
pub struct CityIndex {
    by_key: HashMap<String, String>,
    // Sorted by key; fuzzy ties resolve to the earliest entry.
    ordered: Vec<(String, String)>,
}

impl CityIndex {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut by_key = HashMap::new();
        for name in names {
            let canonical = name.as_ref().trim();
            if canonical.is_empty() {
                continue;
            }
            by_key
                .entry(normalize_city_key(canonical))
                .or_insert_with(|| canonical.to_string());
        }
        let mut ordered: Vec<(String, String)> = by_key
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        ordered.sort();
        Self { by_key, ordered }
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Reference spelling of `city`, case/period-insensitive.
    pub fn lookup(&self, city: &str) -> Option<&str> {
        self.by_key.get(&normalize_city_key(city)).map(String::as_str)
    }

    pub fn contains(&self, city: &str) -> bool {
        self.lookup(city).is_some()
    }

    /// Closest city whose score is at least `threshold`.
    pub fn best_fuzzy(&self, city: &str, threshold: u8) -> Option<(&str, u8)> {
        let key = normalize_city_key(city);
        if key.is_empty() {
            return None;
        }
        let mut best: Option<(&str, u8)> = None;
        for (candidate_key, canonical) in &self.ordered {
            let ratio = normalized_levenshtein(&key, candidate_key);
            let score = (ratio * 100.0).round().clamp(0.0, 100.0) as u8;
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((canonical.as_str(), score));
            }
        }
        best.filter(|(_, score)| *score >= threshold)
    }
}
