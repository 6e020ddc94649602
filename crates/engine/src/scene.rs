//! Diffusion prompts for story illustrations.

use storyverse_config::StyleConfig;
use storyverse_core::{Character, Location, Story, Universe};

/// A prompt built from a story and the universe it lives in.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenePrompt {
    /// "children's illustration, {character}, {features}, at {location}"
    pub subject: String,
    /// Time of day and weather read from the story body
    pub scene_details: String,
    /// All parts joined with their weights
    pub weighted: String,
}

impl ScenePrompt {
    /// Build the prompt for `story`. The main character is the first
    /// referenced character in id order; likewise for the location.
    pub fn for_story(story: &Story, universe: &Universe, style: &StyleConfig) -> Self {
        let character = story
            .referenced_entities
            .iter()
            .find_map(|id| universe.characters.get(id));
        let location = story
            .referenced_entities
            .iter()
            .find_map(|id| universe.locations.get(id));

        let subject = subject(character, location);
        let scene_details = scene_details(&story.body);

        let parts = [
            (subject.clone(), style.main_weight),
            (format!("Style: {}", style.base_style), style.style_weight),
            (format!("Scene details: {scene_details}"), style.scene_weight),
            (format!("Quality: {}", style.quality_boost), style.quality_weight),
        ];
        let weighted = parts
            .iter()
            .map(|(prompt, weight)| format!("({prompt}:{})", format_weight(*weight)))
            .collect::<Vec<_>>()
            .join(" AND ");

        Self {
            subject,
            scene_details,
            weighted,
        }
    }
}

/// Clamp into `[min, max]`; in-range sizes are floored to a multiple of `step`.
pub fn clamp_image_size(size: u32, min: u32, max: u32, step: u32) -> u32 {
    if size < min {
        return min;
    }
    if size > max {
        return max;
    }
    if step == 0 {
        return size;
    }
    (size / step) * step
}

fn subject(character: Option<&Character>, location: Option<&Location>) -> String {
    let mut elements = Vec::new();
    if let Some(c) = character {
        let features = character_features(c);
        if features.is_empty() {
            elements.push(c.name.clone());
        } else {
            elements.push(format!("{}, {features}", c.name));
        }
    }
    if let Some(l) = location {
        elements.push(format!("at {}", l.name));
    }
    format!("children's illustration, {}", elements.join(", "))
}

/// Only the features an illustrator needs.
fn character_features(character: &Character) -> String {
    let description = character.description.to_lowercase();
    let mut features = Vec::new();
    if description.contains("indian") {
        features.push("Indian");
    }
    if description.contains("brown skin") {
        features.push("brown skin");
    }
    if let Some(power) = character.powers.first() {
        let power = power.to_lowercase();
        if power.contains("fly") {
            features.push("can fly");
        } else if power.contains("run") {
            features.push("super fast");
        }
    }
    features.join(", ")
}

fn scene_details(body: &str) -> String {
    let body = body.to_lowercase();

    let time_of_day = if body.contains("night") || body.contains("evening") {
        "nighttime"
    } else if body.contains("sunset") {
        "sunset"
    } else if body.contains("morning") {
        "morning"
    } else {
        "daytime"
    };

    let weather = if body.contains("rain") {
        "rainy"
    } else if body.contains("storm") {
        "stormy"
    } else if body.contains("cloud") {
        "cloudy"
    } else {
        "clear sky"
    };

    format!("{time_of_day}, {weather}, detailed background")
}

/// Weights always carry a decimal point ("1.0", "0.8").
fn format_weight(weight: f32) -> String {
    if weight.fract() == 0.0 {
        format!("{weight:.1}")
    } else {
        format!("{weight}")
    }
}
