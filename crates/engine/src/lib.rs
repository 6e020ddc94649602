//! # Storyverse Engine
//!
//! The universe-consistency core: entity resolution, context assembly,
//! transactional story integration, and the pipeline that wires them to the
//! external collaborators.

pub mod builder;
pub mod context;
pub mod integrate;
pub mod pipeline;
pub mod resolver;
pub mod scene;
pub mod similarity;
pub mod staging;

pub use builder::{add_event, add_relationship, upsert_character, upsert_location, Upserted};
pub use context::{ContextAssembler, ContextLimits};
pub use integrate::{IntegrationResult, IntegrationValidator};
pub use pipeline::{GeneratedStory, PipelineSettings, StoryPipeline};
pub use resolver::{EntityResolver, MatchOutcome, MatchPolicy, Resolution};
pub use scene::{clamp_image_size, ScenePrompt};
pub use staging::StagedEntities;
