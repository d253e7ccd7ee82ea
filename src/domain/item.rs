use serde::{Deserialize, Serialize};

/// A discovered candidate. Identity is `id`; `text` is what gets classified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub text: String,
}

impl Item {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub item_id: String,
    pub relevant: bool,
}

impl Verdict {
    pub fn new(item_id: impl Into<String>, relevant: bool) -> Self {
        Self {
            item_id: item_id.into(),
            relevant,
        }
    }

    /// Fail-open default used whenever the classifier gives no usable answer.
    pub fn relevant(item: &Item) -> Self {
        Self::new(item.id.clone(), true)
    }
}
