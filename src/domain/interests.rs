use parking_lot::RwLock;

/// Topics the user cares about. Entries are trimmed, non-empty and unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterestSet {
    topics: Vec<String>,
}

impl InterestSet {
    pub fn new<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        for topic in topics {
            let topic = topic.as_ref().trim();
            if topic.is_empty() || set.topics.iter().any(|t| t == topic) {
                continue;
            }
            set.topics.push(topic.to_string());
        }
        set
    }

    /// Parses a newline or comma separated list, e.g. the `INTERESTS` variable.
    pub fn parse(raw: &str) -> Self {
        Self::new(raw.split(['\n', ',']))
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.topics.iter().map(String::as_str)
    }

    pub fn joined(&self, separator: &str) -> String {
        self.topics.join(separator)
    }
}

impl<S: AsRef<str>> FromIterator<S> for InterestSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self::new(iter)
    }
}

/// Shared holder for the current interest set; readers get a snapshot.
#[derive(Debug, Default)]
pub struct InterestStore {
    inner: RwLock<InterestSet>,
}

impl InterestStore {
    pub fn new(initial: InterestSet) -> Self {
        Self {
            inner: RwLock::new(initial),
        }
    }

    pub fn snapshot(&self) -> InterestSet {
        self.inner.read().clone()
    }

    pub fn replace(&self, interests: InterestSet) {
        *self.inner.write() = interests;
    }
}
