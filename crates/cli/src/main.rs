//! Storyverse CLI: the main entry point.
//!
//! Commands:
//! - `onboard`  : Initialize config and an empty universe
//! - `character` / `location`: Add and list entities
//! - `relate` / `event add`: Connect entities
//! - `story`    : Generate, list and show stories
//! - `image`    : Illustrate a story
//! - `compose`  : Build a story document from its latest image
//! - `history`  : Show a story's ledger entries
//! - `status` / `doctor`: Inspect the installation

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "storyverse",
    about = "Storyverse — a consistent storytelling universe",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration and the universe document
    Onboard,

    /// Show universe and output status
    Status,

    /// Diagnose configuration, storage and collaborator health
    Doctor,

    /// Manage characters
    Character {
        #[command(subcommand)]
        action: CharacterAction,
    },

    /// Manage locations
    Location {
        #[command(subcommand)]
        action: LocationAction,
    },

    /// Add a relationship between two or more entities
    Relate {
        /// Relationship kind, e.g. "friend" or "mentor"
        kind: String,

        /// Participant names or ids
        #[arg(required = true, num_args = 2..)]
        participants: Vec<String>,

        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Record events involving existing entities
    Event {
        #[command(subcommand)]
        action: EventAction,
    },

    /// Generate and browse stories
    Story {
        #[command(subcommand)]
        action: StoryAction,
    },

    /// Illustrate stories
    Image {
        #[command(subcommand)]
        action: ImageAction,
    },

    /// Compose a story document from the story and its latest image
    Compose {
        /// Story id
        story_id: String,
    },

    /// Show the ledger history of a story
    History {
        /// Story id
        story_id: String,
    },

    /// Import a universe document written by the legacy tool
    ImportLegacy {
        /// Path to the legacy JSON document
        path: std::path::PathBuf,

        /// Replace a non-empty universe
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum CharacterAction {
    /// Add a character, or merge into an existing one with the same name
    Add {
        name: String,

        /// Super power (repeatable)
        #[arg(short, long = "power")]
        powers: Vec<String>,

        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// List characters
    List,
}

#[derive(Subcommand)]
enum LocationAction {
    /// Add a location, or update the one with the same name
    Add {
        name: String,

        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// List locations
    List,
}

#[derive(Subcommand)]
enum EventAction {
    /// Add an event
    Add {
        /// What happened
        description: String,

        /// Participant names or ids
        #[arg(required = true)]
        participants: Vec<String>,

        /// Free-form ordering hint ("after the monsoon")
        #[arg(long)]
        when: Option<String>,
    },
}

#[derive(Subcommand)]
enum StoryAction {
    /// Generate a story and merge it into the universe
    Generate {
        /// Character name or id (repeatable)
        #[arg(short, long = "character", required = true)]
        characters: Vec<String>,

        /// Location name or id
        #[arg(short, long)]
        location: String,

        #[arg(short, long)]
        theme: String,

        /// Target age group, e.g. "6-8"
        #[arg(short, long)]
        age: String,

        /// Requested length in words
        #[arg(short, long)]
        words: Option<u32>,

        /// Extra direction for the writer
        #[arg(long, default_value = "")]
        direction: String,
    },
    /// List stories
    List,
    /// Show one story
    Show { story_id: String },
}

#[derive(Subcommand)]
enum ImageAction {
    /// Render a new illustration for a story
    Render {
        story_id: String,

        /// Square image size in pixels
        #[arg(short, long)]
        size: Option<u32>,
    },
    /// Show the latest illustration of a story
    Latest { story_id: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    if let Err(e) = run(cli.command).await {
        match e.downcast_ref::<storyverse_core::Error>() {
            Some(err) => eprintln!("❌ {} — {err}", err.category().label()),
            None => eprintln!("❌ {e}"),
        }
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Status => commands::status::run().await?,
        Commands::Doctor => commands::doctor::run().await?,
        Commands::Character { action } => match action {
            CharacterAction::Add {
                name,
                powers,
                description,
            } => commands::character::add(&name, powers, &description).await?,
            CharacterAction::List => commands::character::list().await?,
        },
        Commands::Location { action } => match action {
            LocationAction::Add { name, description } => {
                commands::location::add(&name, &description).await?
            }
            LocationAction::List => commands::location::list().await?,
        },
        Commands::Relate {
            kind,
            participants,
            description,
        } => commands::relation::relate(&kind, &participants, &description).await?,
        Commands::Event {
            action:
                EventAction::Add {
                    description,
                    participants,
                    when,
                },
        } => commands::relation::event(&description, &participants, when).await?,
        Commands::Story { action } => match action {
            StoryAction::Generate {
                characters,
                location,
                theme,
                age,
                words,
                direction,
            } => {
                commands::story::generate(&characters, &location, &theme, &age, words, &direction)
                    .await?
            }
            StoryAction::List => commands::story::list().await?,
            StoryAction::Show { story_id } => commands::story::show(&story_id).await?,
        },
        Commands::Image { action } => match action {
            ImageAction::Render { story_id, size } => {
                commands::image::render(&story_id, size).await?
            }
            ImageAction::Latest { story_id } => commands::image::latest(&story_id).await?,
        },
        Commands::Compose { story_id } => commands::compose::compose(&story_id).await?,
        Commands::History { story_id } => commands::compose::history(&story_id).await?,
        Commands::ImportLegacy { path, force } => commands::import::run(&path, force).await?,
    }

    Ok(())
}
