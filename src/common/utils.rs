use rand::{rng, Rng};

pub fn jittered_delay(base: u64) -> u64 {
    let mut rng = rng();
    let jitter: f64 = rng.random_range(0.5..=1.5); // ±50% jitter
    (base as f64 * jitter) as u64
}

/// Glob match supporting only `*`, as used by key listing.
pub fn glob_match(pattern: &str, candidate: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == candidate;
    }
    let first = parts[0];
    let last = parts[parts.len() - 1];
    if !candidate.starts_with(first) || candidate.len() < first.len() + last.len() {
        return false;
    }
    let mut rest = &candidate[first.len()..];
    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}
