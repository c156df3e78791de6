//! Lenient field decoders.
//!
//! Counters arrive as numbers from some endpoints and as decimal strings from
//! others, ids flip between strings and integers. Anything unexpected decodes
//! as absent instead of failing the whole payload.

use serde::{Deserialize, Deserializer, de::IgnoredAny};

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Text(String),
    Other(IgnoredAny),
}

/// `42`, `"42"` and `42.0` all become `Some(42)`; everything else `None`.
pub fn count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Loose>::deserialize(deserializer)?;
    Ok(match value {
        Some(Loose::Unsigned(n)) => Some(n),
        Some(Loose::Signed(n)) => u64::try_from(n).ok(),
        Some(Loose::Float(n)) if n.is_finite() && n >= 0.0 => Some(n as u64),
        Some(Loose::Text(text)) => text.trim().parse().ok(),
        _ => None,
    })
}

/// Accepts a string or an integer id, rendering it as a string.
pub fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Loose>::deserialize(deserializer)?;
    Ok(match value {
        Some(Loose::Unsigned(n)) => n.to_string(),
        Some(Loose::Signed(n)) => n.to_string(),
        Some(Loose::Text(text)) => text,
        _ => String::new(),
    })
}

/// Like [`count`] for signed status codes.
pub fn status_code<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Loose>::deserialize(deserializer)?;
    Ok(match value {
        Some(Loose::Unsigned(n)) => i64::try_from(n).ok(),
        Some(Loose::Signed(n)) => Some(n),
        Some(Loose::Text(text)) => text.trim().parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "count")]
        n: Option<u64>,
        #[serde(default, deserialize_with = "id_string")]
        id: String,
    }

    fn probe(json: &str) -> Probe {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn counts_accept_numbers_and_strings() {
        assert_eq!(probe(r#"{"n": 12}"#).n, Some(12));
        assert_eq!(probe(r#"{"n": "12"}"#).n, Some(12));
        assert_eq!(probe(r#"{"n": 12.0}"#).n, Some(12));
    }

    #[test]
    fn garbage_counts_become_none() {
        assert_eq!(probe(r#"{"n": "lots"}"#).n, None);
        assert_eq!(probe(r#"{"n": null}"#).n, None);
        assert_eq!(probe(r#"{"n": {"x": 1}}"#).n, None);
        assert_eq!(probe(r#"{}"#).n, None);
    }

    #[test]
    fn ids_accept_integers() {
        assert_eq!(probe(r#"{"id": 7106658991907802374}"#).id, "7106658991907802374");
        assert_eq!(probe(r#"{"id": "71"}"#).id, "71");
    }
}
