use crate::consts;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

/// Provider approved message template, stored per account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Template {
    pub id: i64,
    pub account_id: i64,
    pub name: String,
    pub language: String,
    pub category: String,
    /// Provider review status, e.g. APPROVED, PENDING, REJECTED, PAUSED
    pub status: String,
    pub header_text: Option<String>,
    pub body_text: String,
    pub footer_text: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Template as fetched from the provider, before it is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTemplate {
    pub name: String,
    pub language: String,
    pub category: String,
    pub status: String,
    pub header_text: Option<String>,
    pub body_text: String,
    pub footer_text: Option<String>,
}

impl Template {
    pub fn is_approved(&self) -> bool {
        self.status
            .eq_ignore_ascii_case(consts::TEMPLATE_APPROVED_STATUS)
    }

    /// Every placeholder name used by the header and the body.
    pub fn placeholders(&self) -> BTreeSet<String> {
        self.header_text
            .iter()
            .chain(std::iter::once(&self.body_text))
            .flat_map(|text| placeholder_names(text))
            .collect()
    }

    /// Renders header, body and footer with the variables substituted.
    pub fn render(&self, variables: &BTreeMap<String, String>) -> String {
        [
            self.header_text.as_deref(),
            Some(self.body_text.as_str()),
            self.footer_text.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|text| !text.trim().is_empty())
        .map(|text| render_text(text, variables))
        .collect::<Vec<_>>()
        .join("\n")
    }
}

/// `{{1}}` style placeholders are positional, `{{first_name}}` are named.
pub fn is_positional(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_digit())
}

fn placeholder_spans(text: &str) -> Vec<(Range<usize>, &str)> {
    let mut spans = Vec::new();
    let mut cursor = 0;

    while let Some(open) = text[cursor..].find("{{") {
        let start = cursor + open;
        let Some(close) = text[start + 2..].find("}}") else {
            break;
        };
        let inner_end = start + 2 + close;
        let name = text[start + 2..inner_end].trim();

        if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            spans.push((start..inner_end + 2, name));
            cursor = inner_end + 2;
        } else {
            cursor = start + 2;
        }
    }

    spans
}

/// Placeholder names in order of first appearance.
pub fn placeholder_names(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for (_, name) in placeholder_spans(text) {
        if !names.iter().any(|known| known == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Substitutes known placeholders, leaving unknown ones untouched.
pub fn render_text(text: &str, variables: &BTreeMap<String, String>) -> String {
    let mut rendered = String::with_capacity(text.len());
    let mut last = 0;

    for (span, name) in placeholder_spans(text) {
        if let Some(value) = variables.get(name) {
            rendered.push_str(&text[last..span.start]);
            rendered.push_str(value);
            last = span.end;
        }
    }
    rendered.push_str(&text[last..]);

    rendered
}
