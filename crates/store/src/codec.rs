//! The on-disk form of a universe: one pretty-printed JSON document with
//! collections in a fixed key order and a trailing newline.

use storyverse_core::error::StoreError;
use storyverse_core::universe::Universe;

/// Serialize a universe. Equal universes always produce equal bytes.
pub fn encode_universe(universe: &Universe, location: &str) -> Result<Vec<u8>, StoreError> {
    let mut bytes =
        serde_json::to_vec_pretty(universe).map_err(|e| StoreError::Persistence {
            location: location.to_string(),
            reason: format!("Failed to serialize universe: {e}"),
        })?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Parse and validate a universe document.
///
/// Malformed JSON and referential-invariant violations both surface as
/// [`StoreError::Corrupt`]; nothing is repaired.
pub fn decode_universe(bytes: &[u8], location: &str) -> Result<Universe, StoreError> {
    let universe: Universe = serde_json::from_slice(bytes).map_err(|e| StoreError::Corrupt {
        location: location.to_string(),
        reason: e.to_string(),
    })?;

    universe.validate().map_err(|e| StoreError::Corrupt {
        location: location.to_string(),
        reason: e.to_string(),
    })?;

    Ok(universe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyverse_core::{Character, EntityId};

    #[test]
    fn encoding_is_deterministic() {
        let mut universe = Universe::new();
        for (id, name) in [("CHAR2025010100002", "Kuttan"), ("CHAR2025010100001", "Ammu")] {
            let c = Character::new(EntityId::from(id), name, vec![], "").unwrap();
            universe.characters.insert(c.id.clone(), c);
        }

        let first = encode_universe(&universe, "mem").unwrap();
        let decoded = decode_universe(&first, "mem").unwrap();
        let second = encode_universe(&decoded, "mem").unwrap();
        assert_eq!(first, second);

        let text = String::from_utf8(first).unwrap();
        assert!(text.find("CHAR2025010100001").unwrap() < text.find("CHAR2025010100002").unwrap());
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn malformed_json_is_corrupt() {
        let err = decode_universe(b"{\"characters\": [", "universe.json").unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { ref location, .. } if location == "universe.json"));
    }

    #[test]
    fn invariant_violation_is_corrupt() {
        let doc = br#"{
            "relationships": {
                "REL2025010100001": {
                    "id": "REL2025010100001",
                    "participants": ["CHAR2025010100001", "CHAR2025010100002"],
                    "kind": "friend"
                }
            }
        }"#;
        let err = decode_universe(doc, "universe.json").unwrap_err();
        assert!(err.to_string().contains("CHAR2025010100001"));
    }
}
