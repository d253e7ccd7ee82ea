//! Tolerant parsing of the `index:label;index:label` reply format.
//!
//! Every item of the batch gets exactly one verdict. Entries that cannot be
//! tied to an item or carry an unknown label leave that item at the fail-open
//! default (`relevant = true`).

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::{Item, Verdict};

pub const RELEVANT_TOKEN: &str = "relevant";
pub const IRRELEVANT_TOKEN: &str = "irrelevant";

const NEGATIVE_TOKENS: &[&str] = &[IRRELEVANT_TOKEN, "notrelevant", "unrelated"];
const ENTRY_SEPARATORS: &[char] = &[';', '；', ',', '\n'];
const LABEL_SEPARATORS: &[char] = &[':', '：', '='];

static INDEX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("index regex is valid"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReply {
    /// One verdict per batch item, in batch order.
    pub verdicts: Vec<Verdict>,
    /// Ids of items that fell back to the default.
    pub defaulted: Vec<String>,
}

impl ParsedReply {
    pub fn is_complete(&self) -> bool {
        self.defaulted.is_empty()
    }
}

pub fn parse_verdicts(raw: &str, batch: &[Item]) -> ParsedReply {
    let mut labels: HashMap<usize, bool> = HashMap::new();

    for entry in raw.split(ENTRY_SEPARATORS) {
        let Some((index_part, label_part)) = entry.split_once(LABEL_SEPARATORS) else {
            continue;
        };
        let Some(position) = parse_index(index_part, batch.len()) else {
            continue;
        };
        if let Some(relevant) = parse_label(label_part) {
            // later entries for the same index win
            labels.insert(position, relevant);
        }
    }

    let mut defaulted = Vec::new();
    let verdicts = batch
        .iter()
        .enumerate()
        .map(|(position, item)| match labels.get(&position) {
            Some(relevant) => Verdict::new(item.id.clone(), *relevant),
            None => {
                defaulted.push(item.id.clone());
                Verdict::relevant(item)
            }
        })
        .collect();

    ParsedReply {
        verdicts,
        defaulted,
    }
}

/// 1-based index in the reply to a 0-based batch position.
fn parse_index(raw: &str, batch_len: usize) -> Option<usize> {
    let digits = INDEX_RE.find(raw)?;
    let index = digits.as_str().parse::<usize>().ok()?;
    (1..=batch_len).contains(&index).then(|| index - 1)
}

// Unknown labels yield None so the item stays at the fail-open default.
fn parse_label(raw: &str) -> Option<bool> {
    let normalized = normalize_label(raw);
    if normalized == RELEVANT_TOKEN {
        Some(true)
    } else if NEGATIVE_TOKENS.contains(&normalized.as_str()) {
        Some(false)
    } else {
        None
    }
}

fn normalize_label(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '“' | '”' | '.' | '。' | '`' | '*'))
        .to_lowercase()
}
