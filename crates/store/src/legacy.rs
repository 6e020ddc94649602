//! Import of universe documents written by the earlier Python tooling.
//!
//! That layout keys characters and locations by display name (the id lives
//! inside each record), keeps stories in a list with a `metadata` block and
//! stores naive ISO timestamps. References that do not resolve are dropped
//! and reported in [`LegacyImport::skipped`] rather than carried over.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use storyverse_core::error::StoreError;
use storyverse_core::story::StoryDraft;
use storyverse_core::{Character, EntityId, EntityKind, Location, Story, Universe};
use tracing::{info, warn};

const LOCATION: &str = "legacy document";

#[derive(Debug, Deserialize)]
struct LegacyDocument {
    #[serde(default)]
    characters: BTreeMap<String, LegacyCharacter>,
    #[serde(default)]
    locations: BTreeMap<String, LegacyLocation>,
    #[serde(default)]
    stories: Vec<LegacyStory>,
    #[serde(default)]
    relationships: serde_json::Value,
    #[serde(default)]
    events: serde_json::Value,
    #[serde(default)]
    last_updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LegacyCharacter {
    id: String,
    #[serde(default)]
    powers: Vec<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    created_date: Option<String>,
    #[serde(default)]
    last_updated: Option<String>,
    #[serde(default)]
    story_appearances: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LegacyLocation {
    id: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    created_date: Option<String>,
    #[serde(default)]
    last_updated: Option<String>,
    #[serde(default)]
    story_appearances: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LegacyStory {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    moral_lesson: String,
    #[serde(default)]
    metadata: LegacyMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct LegacyMetadata {
    #[serde(default)]
    generated_date: Option<String>,
    #[serde(default)]
    theme: String,
    #[serde(default)]
    target_age: String,
    #[serde(default)]
    characters_used: Vec<String>,
    #[serde(default)]
    locations_used: Vec<String>,
}

/// Result of a legacy import.
#[derive(Debug)]
pub struct LegacyImport {
    pub universe: Universe,
    /// Human-readable notes on records and references that were dropped
    pub skipped: Vec<String>,
}

/// Convert a legacy document into a validated universe.
///
/// Timestamps that cannot be parsed fall back to `imported_at`.
pub fn import_legacy(json: &str, imported_at: DateTime<Utc>) -> Result<LegacyImport, StoreError> {
    let doc: LegacyDocument = serde_json::from_str(json).map_err(|e| StoreError::Corrupt {
        location: LOCATION.into(),
        reason: e.to_string(),
    })?;

    let mut universe = Universe::new();
    let mut skipped = Vec::new();
    let time = |raw: &Option<String>| raw.as_deref().and_then(parse_timestamp).unwrap_or(imported_at);

    let mut appearances: Vec<(EntityId, Vec<String>)> = Vec::new();

    for (name, legacy) in &doc.characters {
        match Character::new(
            EntityId::new(legacy.id.trim()),
            name,
            legacy.powers.iter().cloned(),
            &legacy.description,
        ) {
            Ok(c) if universe.characters.contains_key(&c.id) => {
                skipped.push(format!("character {name}: duplicate id {}", c.id));
            }
            Ok(mut c) if !c.id.is_provisional() => {
                c.created_at = time(&legacy.created_date);
                c.updated_at = time(&legacy.last_updated);
                appearances.push((c.id.clone(), legacy.story_appearances.clone()));
                universe.characters.insert(c.id.clone(), c);
            }
            Ok(_) => skipped.push(format!("character {name}: provisional id")),
            Err(e) => skipped.push(format!("character {name}: {e}")),
        }
    }

    for (name, legacy) in &doc.locations {
        match Location::new(EntityId::new(legacy.id.trim()), name, &legacy.description) {
            Ok(l) if universe.locations.contains_key(&l.id) => {
                skipped.push(format!("location {name}: duplicate id {}", l.id));
            }
            Ok(mut l) if !l.id.is_provisional() => {
                l.created_at = time(&legacy.created_date);
                l.updated_at = time(&legacy.last_updated);
                appearances.push((l.id.clone(), legacy.story_appearances.clone()));
                universe.locations.insert(l.id.clone(), l);
            }
            Ok(_) => skipped.push(format!("location {name}: provisional id")),
            Err(e) => skipped.push(format!("location {name}: {e}")),
        }
    }

    for legacy in &doc.stories {
        let id = EntityId::new(legacy.id.trim());
        if !id.is_kind(EntityKind::Story) || universe.stories.contains_key(&id) {
            skipped.push(format!("story {}: invalid or duplicate id", legacy.id));
            continue;
        }

        let mut referenced = BTreeSet::new();
        for raw in legacy
            .metadata
            .characters_used
            .iter()
            .chain(&legacy.metadata.locations_used)
        {
            let target = EntityId::new(raw.trim());
            if universe.has_entity(&target) {
                referenced.insert(target);
            } else {
                skipped.push(format!("story {id}: unknown entity {raw}"));
            }
        }

        let draft = StoryDraft {
            title: legacy.title.clone(),
            body: legacy.content.clone(),
            theme: legacy.metadata.theme.clone(),
            age_group: legacy.metadata.target_age.clone(),
            moral: legacy.moral_lesson.clone(),
            ..Default::default()
        };
        match Story::new(id.clone(), &draft, referenced, time(&legacy.metadata.generated_date)) {
            Ok(story) => {
                universe.stories.insert(id, story);
            }
            Err(e) => skipped.push(format!("story {id}: {e}")),
        }
    }

    for (entity, stories) in appearances {
        for raw in stories {
            let story = EntityId::new(raw.trim());
            if !universe.stories.contains_key(&story) {
                skipped.push(format!("{entity}: appearance in unknown story {raw}"));
                continue;
            }
            record_appearance(&mut universe, &entity, &story);
        }
    }

    // Every referenced entity lists the story among its appearances.
    let references: Vec<(EntityId, EntityId)> = universe
        .stories
        .values()
        .flat_map(|s| s.referenced_entities.iter().map(|e| (e.clone(), s.id.clone())))
        .collect();
    for (entity, story) in references {
        record_appearance(&mut universe, &entity, &story);
    }

    if !is_empty_collection(&doc.relationships) {
        skipped.push("relationships: legacy relationship records are not imported".into());
    }
    if !is_empty_collection(&doc.events) {
        skipped.push("events: legacy event records are not imported".into());
    }

    universe.last_updated = doc.last_updated.as_deref().and_then(parse_timestamp);

    universe.validate().map_err(|e| StoreError::Corrupt {
        location: LOCATION.into(),
        reason: e.to_string(),
    })?;

    for note in &skipped {
        warn!(note = %note, "Legacy import skipped data");
    }
    info!(
        characters = universe.characters.len(),
        locations = universe.locations.len(),
        stories = universe.stories.len(),
        skipped = skipped.len(),
        "Legacy universe imported"
    );

    Ok(LegacyImport { universe, skipped })
}

fn record_appearance(universe: &mut Universe, entity: &EntityId, story: &EntityId) {
    if let Some(c) = universe.characters.get_mut(entity) {
        c.record_appearance(story);
    } else if let Some(l) = universe.locations.get_mut(entity) {
        l.record_appearance(story);
    }
}

fn is_empty_collection(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::Array(a) => a.is_empty(),
        serde_json::Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// RFC 3339, or the naive `isoformat()` layouts the old tooling wrote (UTC assumed).
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const LEGACY: &str = r#"{
        "characters": {
            "Minnal Ammu": {
                "id": "CHAR2025010100001",
                "powers": ["Lightning speed", "Can fly"],
                "description": "An Indian girl with brown skin",
                "created_date": "2025-01-01T10:15:30.123456",
                "last_updated": "2025-01-02T08:00:00",
                "story_appearances": ["STORY2025010300001", "STORY2099010100001"]
            }
        },
        "locations": {
            "Chennai": {
                "id": "LOC2025010100001",
                "description": "Coastal city",
                "created_date": "2025-01-01T10:20:00"
            }
        },
        "relationships": {},
        "events": [],
        "stories": [
            {
                "id": "STORY2025010300001",
                "title": "Storm over Marina",
                "content": "Ammu raced the storm along the beach.",
                "moral_lesson": "Courage helps others.",
                "metadata": {
                    "generated_date": "2025-01-03T18:00:00.5",
                    "theme": "Courage",
                    "target_age": "6-8",
                    "word_count": 7,
                    "characters_used": ["CHAR2025010100001"],
                    "locations_used": ["LOC2025010100001", "LOC2025010100099"]
                }
            }
        ],
        "last_updated": "2025-01-03T18:00:01"
    }"#;

    fn imported_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn imports_records_and_links() {
        let import = import_legacy(LEGACY, imported_at()).unwrap();
        let u = &import.universe;

        let ammu = &u.characters[&EntityId::from("CHAR2025010100001")];
        assert_eq!(ammu.name, "Minnal Ammu");
        assert_eq!(ammu.powers.len(), 2);
        assert_eq!(
            ammu.created_at,
            Utc.with_ymd_and_hms(2025, 1, 1, 10, 15, 30).unwrap()
                + chrono::Duration::microseconds(123456)
        );
        assert_eq!(ammu.story_appearances, vec![EntityId::from("STORY2025010300001")]);

        let story = &u.stories[&EntityId::from("STORY2025010300001")];
        assert_eq!(story.theme, "Courage");
        assert_eq!(story.moral, "Courage helps others.");
        assert_eq!(story.word_count(), 7);
        assert_eq!(story.referenced_entities.len(), 2);

        // Chennai gains the appearance through the story's references.
        let chennai = &u.locations[&EntityId::from("LOC2025010100001")];
        assert_eq!(chennai.story_appearances.len(), 1);
        assert_eq!(chennai.updated_at, imported_at());

        assert!(u.validate().is_ok());
    }

    #[test]
    fn dangling_references_are_reported() {
        let import = import_legacy(LEGACY, imported_at()).unwrap();
        assert_eq!(import.skipped.len(), 2);
        assert!(import.skipped.iter().any(|s| s.contains("LOC2025010100099")));
        assert!(import.skipped.iter().any(|s| s.contains("STORY2099010100001")));
    }

    #[test]
    fn invalid_json_is_corrupt() {
        assert!(matches!(
            import_legacy("[1, 2", imported_at()),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn character_with_bad_id_is_skipped() {
        let doc = r#"{"characters": {"Ghost": {"id": "LOC2025010100001"}}}"#;
        let import = import_legacy(doc, imported_at()).unwrap();
        assert!(import.universe.characters.is_empty());
        assert_eq!(import.skipped.len(), 1);
    }

    #[test]
    fn duplicate_character_id_keeps_first_record() {
        let doc = r#"{"characters": {
            "Ammu": {"id": "CHAR2025010100001", "powers": ["Lightning speed"]},
            "Kuttan": {"id": "CHAR2025010100001", "powers": ["Invisibility"]}
        }}"#;
        let import = import_legacy(doc, imported_at()).unwrap();
        assert_eq!(import.universe.characters.len(), 1);
        let kept = &import.universe.characters[&EntityId::from("CHAR2025010100001")];
        // Records are read in name order.
        assert_eq!(kept.name, "Ammu");
        assert_eq!(kept.powers, vec!["Lightning speed".to_string()]);
        assert_eq!(import.skipped.len(), 1);
        assert!(import.skipped[0].contains("Kuttan"));
        assert!(import.skipped[0].contains("duplicate id"));
    }

    #[test]
    fn duplicate_location_id_keeps_first_record() {
        let doc = r#"{"locations": {
            "Chennai": {"id": "LOC2025010100001", "description": "Coastal city"},
            "Kochi": {"id": "LOC2025010100001", "description": "Port city"}
        }}"#;
        let import = import_legacy(doc, imported_at()).unwrap();
        assert_eq!(import.universe.locations.len(), 1);
        let kept = &import.universe.locations[&EntityId::from("LOC2025010100001")];
        assert_eq!(kept.name, "Chennai");
        assert_eq!(import.skipped.len(), 1);
        assert!(import.skipped[0].contains("duplicate id"));
        assert!(import.universe.validate().is_ok());
    }
}
