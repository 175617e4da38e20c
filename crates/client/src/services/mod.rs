//! Remote collaborators: catalog lookup, cart service, order service.
//!
//! Each collaborator is consumed through a narrow trait so the
//! synchronization core can be exercised against scripted doubles. The
//! concrete clients share one `reqwest::Client` and speak the backend's
//! JSON contracts exactly (including its habit of sending numeric ids).

pub mod cart;
pub mod catalog;
pub mod orders;

pub use cart::{CartApi, RemoteCartClient, RemoteCartLine};
pub use catalog::{CatalogApi, CatalogClient, CatalogProduct, Rating};
pub use orders::{OrderApi, OrderClient, OrderDraft};

use serde::{Deserialize, Deserializer};

/// Decode an id field that may arrive as a JSON string or number.
pub(crate) fn de_id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

/// Decode a flag field that may arrive as a JSON bool or 0/1 integer.
pub(crate) fn de_int_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Flag(bool),
        Number(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Flag(b) => b,
        Raw::Number(n) => n != 0,
    })
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(deserialize_with = "super::de_id_string")]
        id: String,
        #[serde(deserialize_with = "super::de_int_bool")]
        flag: bool,
    }

    #[test]
    fn tolerates_numeric_ids_and_flags() {
        let probe: Probe = serde_json::from_str(r#"{"id": 7, "flag": 1}"#).unwrap();
        assert_eq!(probe.id, "7");
        assert!(probe.flag);

        let probe: Probe = serde_json::from_str(r#"{"id": "7", "flag": false}"#).unwrap();
        assert_eq!(probe.id, "7");
        assert!(!probe.flag);
    }
}
