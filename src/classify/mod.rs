mod openai;

pub use openai::OpenAiClassifier;

use crate::error::Result;
use crate::vocabulary::Vocabulary;

/// Everything the classifier sees for one page.
pub struct ClassifyRequest<'a> {
    pub title: &'a str,
    pub content: &'a str,
    pub vocabulary: &'a Vocabulary,
    pub guidance: Option<&'a str>,
}

/// Assigns a subset of the vocabulary to a page.
///
/// Implementations should constrain their output to `request.vocabulary`;
/// callers still validate the result with [`Vocabulary::canonicalize`].
pub trait TagClassifier {
    fn classify(&self, request: &ClassifyRequest<'_>) -> Result<Vec<String>>;
}

/// Classify and validate in one step: the returned tags are members of the
/// vocabulary, deduplicated and in vocabulary order.
pub fn classify_page(
    classifier: &dyn TagClassifier,
    request: &ClassifyRequest<'_>,
) -> Result<Vec<String>> {
    let raw = classifier.classify(request)?;
    request.vocabulary.canonicalize(&raw)
}

pub(crate) const SYSTEM_PROMPT: &str = "You label personal notes with tags. \
Read the note and choose every tag from the provided list that applies. \
Several tags may apply; choose none if nothing fits. Only use tags from the list.";

pub(crate) fn user_prompt(request: &ClassifyRequest<'_>) -> String {
    let mut prompt = String::new();
    if !request.title.is_empty() {
        prompt.push_str(&format!("Title: {}\n\n", request.title));
    }
    prompt.push_str(&format!("Content to label:\n\n{}\n\n", request.content));
    prompt.push_str(&format!(
        "Available tags: {}\n\n",
        request.vocabulary.tags().join(", ")
    ));
    if let Some(guidance) = request.guidance {
        prompt.push_str(&format!("Additional context:\n{}\n\n", guidance));
    }
    prompt.push_str("Label this content with the appropriate tags.");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    struct Fixed(Vec<&'static str>);

    impl TagClassifier for Fixed {
        fn classify(&self, _request: &ClassifyRequest<'_>) -> Result<Vec<String>> {
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }
    }

    fn request<'a>(vocabulary: &'a Vocabulary, guidance: Option<&'a str>) -> ClassifyRequest<'a> {
        ClassifyRequest {
            title: "Sunday",
            content: "Church, then lunch with mum.",
            vocabulary,
            guidance,
        }
    }

    #[test]
    fn prompt_lists_vocabulary_and_guidance() {
        let vocab = Vocabulary::new(["Family", "Christianity"]);
        let prompt = user_prompt(&request(&vocab, Some("Mum is family.")));
        assert!(prompt.starts_with("Title: Sunday\n\n"));
        assert!(prompt.contains("Church, then lunch with mum."));
        assert!(prompt.contains("Available tags: Family, Christianity"));
        assert!(prompt.contains("Additional context:\nMum is family."));
    }

    #[test]
    fn prompt_without_guidance() {
        let vocab = Vocabulary::new(["Family"]);
        assert!(!user_prompt(&request(&vocab, None)).contains("Additional context"));
    }

    #[test]
    fn classify_page_canonicalizes() {
        let vocab = Vocabulary::new(["Family", "Christianity", "Work"]);
        let tags = classify_page(&Fixed(vec!["Christianity", "Family", "Family"]), &request(&vocab, None)).unwrap();
        assert_eq!(tags, ["Family", "Christianity"]);
    }

    #[test]
    fn classify_page_rejects_out_of_vocabulary() {
        let vocab = Vocabulary::new(["Family"]);
        let err = classify_page(&Fixed(vec!["Dating"]), &request(&vocab, None)).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownTag { .. }));
    }
}
