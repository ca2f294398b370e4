use anyhow::{Context, Result, bail};
use std::collections::HashSet;

const DEFAULT_SEED: u64 = 1337;

/// Resolve CLI seed tokens into a de-duplicated, ordered seed list.
///
/// Accepts decimal integers (negative values fold to their magnitude) and
/// `0x`-prefixed hex. An empty list falls back to the default seed.
pub fn resolve_seed_inputs(tokens: &[String]) -> Result<Vec<u64>> {
    let mut seeds = Vec::new();
    let mut seen = HashSet::new();

    for token in tokens {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let seed = parse_seed(token)?;
        if seen.insert(seed) {
            seeds.push(seed);
        }
    }

    if seeds.is_empty() {
        seeds.push(DEFAULT_SEED);
    }
    Ok(seeds)
}

fn parse_seed(token: &str) -> Result<u64> {
    if let Some(hex) = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
    {
        return u64::from_str_radix(&hex.replace('_', ""), 16)
            .with_context(|| format!("invalid hex seed: {token}"));
    }
    if let Ok(value) = token.parse::<u64>() {
        return Ok(value);
    }
    if let Ok(value) = token.parse::<i64>() {
        return Ok(value.unsigned_abs());
    }
    bail!("Unrecognized seed token: {token}");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn parses_decimal_hex_and_negative() {
        let seeds = resolve_seed_inputs(&tokens(&["42", "0xDEAD_BEEF", "-7"])).unwrap();
        assert_eq!(seeds, vec![42, 0xDEAD_BEEF, 7]);
    }

    #[test]
    fn duplicates_keep_first_position() {
        let seeds = resolve_seed_inputs(&tokens(&["3", "1", "3", "0x1"])).unwrap();
        assert_eq!(seeds, vec![3, 1]);
    }

    #[test]
    fn empty_input_uses_default() {
        assert_eq!(resolve_seed_inputs(&[]).unwrap(), vec![1337]);
    }

    #[test]
    fn garbage_is_rejected() {
        let err = resolve_seed_inputs(&tokens(&["taipei"])).unwrap_err();
        assert!(err.to_string().contains("taipei"));
    }
}
