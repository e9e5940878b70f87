use anyhow::{Result, bail};

pub const DEFAULT_SEED: u64 = 1337;

fn parse_seed(token: &str) -> Option<u64> {
    if let Some(hex) = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
    {
        return u64::from_str_radix(&hex.replace('_', ""), 16).ok();
    }
    if let Ok(value) = token.parse::<u64>() {
        return Some(value);
    }
    token.parse::<i64>().ok().map(i64::unsigned_abs)
}

/// Resolve CLI seed tokens into a deduplicated seed list.
///
/// Accepts decimal integers (negative values use their magnitude) and
/// `0x`-prefixed hex. An empty list falls back to the default seed.
///
/// # Errors
///
/// Returns an error naming the first token that is not a seed.
pub fn resolve_seed_inputs(tokens: &[String]) -> Result<Vec<u64>> {
    let mut seeds = Vec::new();
    for token in tokens {
        if token.is_empty() {
            continue;
        }
        let Some(seed) = parse_seed(token) else {
            bail!("Unrecognized seed token: {token}");
        };
        if !seeds.contains(&seed) {
            seeds.push(seed);
        }
    }
    if seeds.is_empty() {
        seeds.push(DEFAULT_SEED);
    }
    Ok(seeds)
}

pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}
