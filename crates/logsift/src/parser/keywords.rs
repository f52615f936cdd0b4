use std::sync::Arc;

/// Ordered list of lower-cased keywords used to flag noteworthy log lines.
///
/// Built from a comma-separated configuration string. Order matters: when a
/// message contains several keywords, the first one in the list wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordList {
    keywords: Arc<Vec<String>>,
}

impl KeywordList {
    /// Parses a comma-separated list. Entries are trimmed and lower-cased;
    /// blank entries are dropped.
    pub fn parse(config: &str) -> Self {
        let keywords: Vec<String> = config
            .split(',')
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self {
            keywords: Arc::new(keywords),
        }
    }

    pub fn as_slice(&self) -> &[String] {
        &self.keywords
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    /// Returns the first configured keyword contained in `message`,
    /// compared case-insensitively.
    pub fn detect(&self, message: &str) -> Option<&str> {
        if self.keywords.is_empty() {
            return None;
        }
        let lowered = message.to_lowercase();
        self.keywords
            .iter()
            .find(|k| lowered.contains(k.as_str()))
            .map(String::as_str)
    }
}
