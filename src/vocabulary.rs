use std::collections::HashSet;

use crate::error::{PipelineError, Result};

/// The fixed, ordered set of legal tag values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    tags: Vec<String>,
}

impl Vocabulary {
    /// Build from configured values. Blank entries are dropped, surrounding
    /// whitespace trimmed, and repeats removed keeping the first occurrence.
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let tags = tags
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .filter(|t| seen.insert(t.clone()))
            .collect();
        Vocabulary { tags }
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Validate classifier output and return it deduplicated in vocabulary
    /// order. Any non-member is rejected rather than filtered out.
    pub fn canonicalize(&self, returned: &[String]) -> Result<Vec<String>> {
        if let Some(bad) = returned.iter().find(|t| !self.contains(t)) {
            return Err(PipelineError::UnknownTag { tag: bad.clone() });
        }
        Ok(self
            .tags
            .iter()
            .filter(|t| returned.contains(t))
            .cloned()
            .collect())
    }

    /// Vocabulary entries not present in `existing`, in vocabulary order.
    pub fn missing_from(&self, existing: &[String]) -> Vec<String> {
        self.tags
            .iter()
            .filter(|t| !existing.contains(t))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab() -> Vocabulary {
        Vocabulary::new(["Personal", "Work", "Research", "Family"])
    }

    #[test]
    fn new_trims_and_dedups() {
        let v = Vocabulary::new([" Work", "Work", "", "Family "]);
        assert_eq!(v.tags(), ["Work", "Family"]);
    }

    #[test]
    fn canonicalize_orders_by_vocabulary() {
        let out = vocab()
            .canonicalize(&["Family".into(), "Personal".into(), "Family".into()])
            .unwrap();
        assert_eq!(out, ["Personal", "Family"]);
    }

    #[test]
    fn canonicalize_keeps_empty_verdict() {
        assert!(vocab().canonicalize(&[]).unwrap().is_empty());
    }

    #[test]
    fn canonicalize_rejects_unknown_tag() {
        let err = vocab()
            .canonicalize(&["Work".into(), "Cooking".into()])
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnknownTag { ref tag } if tag == "Cooking"));
    }

    #[test]
    fn missing_from_is_a_set_difference() {
        let existing = vec!["Work".to_string(), "Travel".to_string()];
        assert_eq!(vocab().missing_from(&existing), ["Personal", "Research", "Family"]);
    }
}
