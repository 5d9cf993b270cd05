// src/parsing/range_expander.rs - House-number ranges and lists -> discrete candidates
use log::warn;

use crate::models::address::CandidateNumbers;

/// Widest range expanded before truncating.
pub const DEFAULT_MAX_RANGE_SPAN: usize = 50;

pub fn expand(token: &str) -> CandidateNumbers {
    expand_with_cap(token, DEFAULT_MAX_RANGE_SPAN)
}

/// "251-255" / "251 - 255" -> 251..=255, "10,20,30" -> [10, 20, 30],
/// anything else -> [token]. Ranges wider than `max_span` keep their first
/// `max_span` numbers and are flagged as truncated.
pub fn expand_with_cap(token: &str, max_span: usize) -> CandidateNumbers {
    let trimmed = token.trim();
    if let Some(list) = expand_list(trimmed, token) {
        return list;
    }
    if let Some(range) = expand_range(trimmed, max_span.max(1), token) {
        return range;
    }
    CandidateNumbers::singleton(token)
}

fn expand_list(trimmed: &str, original: &str) -> Option<CandidateNumbers> {
    if !trimmed.contains(',') {
        return None;
    }
    let parts: Vec<&str> = trimmed.split(',').map(str::trim).collect();
    if parts.len() < 2 || parts.iter().any(|p| p.is_empty() || p.parse::<u32>().is_err()) {
        return None;
    }
    let numbers = parts.into_iter().map(str::to_string).collect();
    Some(CandidateNumbers::from_ordered(numbers, false, original))
}

fn expand_range(trimmed: &str, max_span: usize, original: &str) -> Option<CandidateNumbers> {
    let mut parts = trimmed.split('-');
    let (start, end) = match (parts.next(), parts.next(), parts.next()) {
        (Some(start), Some(end), None) => (start.trim().parse::<u32>().ok()?, end.trim().parse::<u32>().ok()?),
        _ => return None,
    };
    let (low, high) = if start <= end { (start, end) } else { (end, start) };
    let span = (high - low) as usize + 1;

    let truncated = span > max_span;
    if truncated {
        warn!(
            "⚠️ House-number range '{}' spans {} numbers; trying only the first {}",
            original, span, max_span
        );
    }
    let numbers = (low..=high)
        .take(max_span)
        .map(|n| n.to_string())
        .collect();
    Some(CandidateNumbers::from_ordered(numbers, truncated, original))
}
