use std::collections::HashMap;

/// Keyword occurrence counts across a user's favorited items
///
/// Built per request and dropped once the top terms are taken.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct KeywordProfile {
    counts: HashMap<String, usize>,
}

impl KeywordProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts each keyword once per item that carries it
    pub fn add_item_keywords<I, S>(&mut self, keywords: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for keyword in keywords {
            *self.counts.entry(keyword.as_ref().to_string()).or_insert(0) += 1;
        }
    }

    pub fn count(&self, keyword: &str) -> usize {
        self.counts.get(keyword).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Keywords ordered by descending count, ties by ascending text
    pub fn ranked(&self) -> Vec<(&str, usize)> {
        let mut ranked: Vec<(&str, usize)> = self
            .counts
            .iter()
            .map(|(keyword, count)| (keyword.as_str(), *count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
    }

    /// The first `n` keywords of `ranked`
    pub fn top_terms(&self, n: usize) -> Vec<String> {
        self.ranked()
            .into_iter()
            .take(n)
            .map(|(keyword, _)| keyword.to_string())
            .collect()
    }
}

impl<S: AsRef<str>> FromIterator<S> for KeywordProfile {
    /// Treats every yielded keyword as one occurrence
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut profile = Self::new();
        profile.add_item_keywords(iter);
        profile
    }
}
