//! The story prompt template and the parser for the model's reply.
//!
//! Replies are expected in the layout the prompt asks for:
//!
//! ```text
//! Title: ...
//!
//! Story:
//! ...
//!
//! Moral Lesson:
//! ...
//!
//! Word Count: ...
//! ```

use std::collections::BTreeSet;
use std::fmt::Write as _;
use storyverse_core::error::GenerationError;
use storyverse_core::Context;

/// Title, body and moral pulled out of a model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedStory {
    pub title: String,
    pub body: String,
    pub moral: String,
}

/// Render the full generation prompt for `context`.
pub fn render_prompt(context: &Context, word_count: u32, direction: &str) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "Create a superhero story with exactly {word_count} words using these elements:\n"
    );
    prompt.push_str(&context.render());
    let _ = writeln!(prompt, "\nTheme: {}", context.request.theme);
    let _ = writeln!(prompt, "Target Age: {}\n", context.request.age_group);

    prompt.push_str("Requirements:\n");
    let _ = writeln!(prompt, "1. Story should be EXACTLY {word_count} words long");
    prompt.push_str("2. Story should be engaging and appropriate for the target age\n");
    prompt.push_str("3. Include descriptions of super power usage\n");
    prompt.push_str("4. Have a clear moral lesson\n");
    prompt.push_str("5. Include character interactions\n");
    prompt.push_str("6. Create an exciting conflict and resolution\n");
    let direction = direction.trim();
    if !direction.is_empty() {
        let _ = writeln!(prompt, "7. {direction}");
    }

    prompt.push_str(
        "\nFormat the story as:\n\
         Title: [Story Title]\n\n\
         Story:\n\
         [Main story content]\n\n\
         Moral Lesson:\n\
         [The moral lesson of the story]\n\n\
         Word Count: [Include actual word count at the end]\n",
    );
    prompt
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    Preamble,
    Story,
    Moral,
    Trailer,
}

/// Parse a reply into title, body and moral.
///
/// Markdown emphasis around the section markers is tolerated. A reply
/// without a title or a story body is malformed.
pub fn parse_story(reply: &str) -> Result<ParsedStory, GenerationError> {
    let mut title = String::new();
    let mut body: Vec<&str> = Vec::new();
    let mut moral: Vec<&str> = Vec::new();
    let mut section = Section::Preamble;

    for raw in reply.lines() {
        let line = raw.trim();
        let marker = line.trim_start_matches(['*', '#', ' ']);

        if let Some(rest) = marker.strip_prefix("Title:") {
            title = clean_title(rest);
            continue;
        }
        if let Some(rest) = marker.strip_prefix("Story:") {
            section = Section::Story;
            push_inline(&mut body, rest);
            continue;
        }
        if let Some(rest) = marker.strip_prefix("Moral Lesson:") {
            section = Section::Moral;
            push_inline(&mut moral, rest);
            continue;
        }
        if marker.starts_with("Word Count:") {
            section = Section::Trailer;
            continue;
        }

        match section {
            Section::Story => body.push(line),
            Section::Moral if !line.is_empty() => moral.push(line),
            _ => {}
        }
    }

    let body = collapse_paragraphs(&body);
    if title.is_empty() {
        return Err(GenerationError::Malformed("reply has no title".into()));
    }
    if body.is_empty() {
        return Err(GenerationError::Malformed("reply has no story body".into()));
    }

    Ok(ParsedStory {
        title,
        body,
        moral: moral.join(" "),
    })
}

/// Context entity names that appear in `body`.
///
/// A multi-word name also counts when one of its longer words appears on
/// its own ("Ammu" for "Minnal Ammu").
pub fn mentioned_names(body: &str, context: &Context) -> Vec<String> {
    let lower = body.to_lowercase();
    let words: BTreeSet<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let mut found = Vec::new();
    for (_, name) in context.entity_names() {
        let name_lower = name.to_lowercase();
        let parts: Vec<&str> = name_lower.split_whitespace().collect();
        let mentioned = lower.contains(&name_lower)
            || (parts.len() > 1
                && parts
                    .iter()
                    .any(|p| p.chars().count() >= 4 && words.contains(p)));
        if mentioned && !found.iter().any(|f: &String| f == name) {
            found.push(name.to_string());
        }
    }
    found
}

fn clean_title(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '*' || c == '"' || c == '\'')
        .trim()
        .to_string()
}

fn push_inline<'a>(lines: &mut Vec<&'a str>, rest: &'a str) {
    let rest = rest.trim().trim_start_matches('*').trim();
    if !rest.is_empty() {
        lines.push(rest);
    }
}

/// Join lines, keeping single blank lines between paragraphs.
fn collapse_paragraphs(lines: &[&str]) -> String {
    let mut out = String::new();
    let mut blank = false;
    for line in lines {
        if line.is_empty() {
            blank = true;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank { "\n\n" } else { "\n" });
        }
        out.push_str(line);
        blank = false;
    }
    out
}
