//! Image placeholder expansion for question and explanation bodies.
//!
//! Question text refers to its images as `[image1]`, `[image2]`, ... and
//! explanation text uses `[explanation_image1]`, ... Both are 1-based
//! indexes into the matching image list.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::Question;

static QUESTION_IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[image(\d+)\]").expect("valid placeholder pattern"));
static EXPLANATION_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[explanation_image(\d+)\]").expect("valid placeholder pattern")
});

/// One rendered segment of a question or explanation body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum TextPart {
    Text(String),
    Image(String),
}

/// Which placeholder family (and image pool) to expand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderKind {
    /// `[image<N>]` against the question's own images.
    Question,
    /// `[explanation_image<N>]` against the explanation images.
    Explanation,
}

impl PlaceholderKind {
    fn pattern(self) -> &'static Regex {
        match self {
            PlaceholderKind::Question => LazyLock::force(&QUESTION_IMAGE),
            PlaceholderKind::Explanation => LazyLock::force(&EXPLANATION_IMAGE),
        }
    }
}

/// Split `text` into literal and image parts.
///
/// Placeholders whose index does not resolve to an image are dropped (and
/// logged); the surrounding text is still emitted in order.
pub fn expand(text: &str, images: &[String], kind: PlaceholderKind) -> Vec<TextPart> {
    let mut parts = Vec::new();
    let mut last_end = 0;

    for caps in kind.pattern().captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };

        if whole.start() > last_end {
            parts.push(TextPart::Text(text[last_end..whole.start()].to_string()));
        }
        last_end = whole.end();

        let image = caps[1]
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|idx| images.get(idx));
        match image {
            Some(image) => parts.push(TextPart::Image(image.clone())),
            None => {
                tracing::warn!(
                    placeholder = whole.as_str(),
                    available = images.len(),
                    "placeholder references a missing image, skipping"
                );
            }
        }
    }

    if last_end < text.len() {
        parts.push(TextPart::Text(text[last_end..].to_string()));
    }

    parts
}

/// Placeholders in `text` that do not resolve to an image.
pub fn unresolved(text: &str, images: &[String], kind: PlaceholderKind) -> Vec<String> {
    kind.pattern()
        .captures_iter(text)
        .filter(|caps| {
            caps[1]
                .parse::<usize>()
                .map_or(true, |n| n == 0 || n > images.len())
        })
        .map(|caps| caps[0].to_string())
        .collect()
}

/// Flatten parts for text-only front ends; images become `[image: ref]`.
pub fn render_plain(parts: &[TextPart]) -> String {
    parts
        .iter()
        .map(|part| match part {
            TextPart::Text(text) => text.clone(),
            TextPart::Image(image) => format!("[image: {image}]"),
        })
        .collect()
}

impl Question {
    /// The question body with `[image<N>]` placeholders expanded.
    pub fn question_parts(&self) -> Vec<TextPart> {
        expand(&self.question, &self.question_images, PlaceholderKind::Question)
    }

    /// The explanation body with `[explanation_image<N>]` placeholders expanded.
    pub fn explanation_parts(&self) -> Vec<TextPart> {
        self.explanation
            .as_deref()
            .map(|text| expand(text, &self.explanation_images, PlaceholderKind::Explanation))
            .unwrap_or_default()
    }
}
