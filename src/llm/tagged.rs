//! Extraction of `<tag>...</tag>` fields from free-text LLM responses.
//!
//! Proposal prompts ask the model to wrap each field in an XML-like tag.
//! [`TagParser`] declares which tags are required and returns a
//! [`TaggedResponse`] holding the trimmed content of the first occurrence
//! of each tag that was found.

use std::collections::HashMap;

use crate::error::LlmError;

/// Content of the first `<tag>...</tag>` pair, trimmed.
pub fn extract_tag(text: &str, tag: &str) -> Option<String> {
    next_tag(text, tag).map(|content| content.trim().to_string())
}

/// True when `<tag>` was opened but `</tag>` never appears.
pub fn is_truncated(text: &str, tag: &str) -> bool {
    text.contains(&format!("<{}>", tag)) && !text.contains(&format!("</{}>", tag))
}

/// Finds the first `<tag>` followed by a `</tag>` and returns the enclosed
/// text.
fn next_tag<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);

    let start = text.find(&open)? + open.len();
    let len = text[start..].find(&close)?;
    Some(&text[start..start + len])
}

/// Declarative set of required and optional tags.
#[derive(Debug, Clone, Default)]
pub struct TagParser {
    required: Vec<String>,
    optional: Vec<String>,
}

impl TagParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tag whose absence fails the parse.
    pub fn required(mut self, tag: impl Into<String>) -> Self {
        self.required.push(tag.into());
        self
    }

    /// Adds a tag that may be absent.
    pub fn optional(mut self, tag: impl Into<String>) -> Self {
        self.optional.push(tag.into());
        self
    }

    /// Extracts every declared tag from `text`.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::MissingTag`] naming the first required tag that
    /// is absent.
    pub fn parse(&self, text: &str) -> Result<TaggedResponse, LlmError> {
        let mut fields = HashMap::new();

        for tag in &self.required {
            let value = extract_tag(text, tag).ok_or_else(|| LlmError::MissingTag {
                tag: tag.clone(),
            })?;
            fields.insert(tag.clone(), value);
        }

        for tag in &self.optional {
            if let Some(value) = extract_tag(text, tag) {
                fields.insert(tag.clone(), value);
            }
        }

        Ok(TaggedResponse { fields })
    }
}

/// Fields extracted by a [`TagParser`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaggedResponse {
    fields: HashMap<String, String>,
}

impl TaggedResponse {
    pub fn get(&self, tag: &str) -> Option<&str> {
        self.fields.get(tag).map(String::as_str)
    }

    /// Value of a required tag.
    pub fn require(&self, tag: &str) -> Result<&str, LlmError> {
        self.get(tag).ok_or_else(|| LlmError::MissingTag {
            tag: tag.to_string(),
        })
    }

    /// Removes and returns a tag's value.
    pub fn take(&mut self, tag: &str) -> Result<String, LlmError> {
        self.fields.remove(tag).ok_or_else(|| LlmError::MissingTag {
            tag: tag.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_first_occurrence_multiline() {
        let text = "intro <issue>\n  off by one\n</issue> and <issue>second</issue>";
        assert_eq!(extract_tag(text, "issue").as_deref(), Some("off by one"));
    }

    #[test]
    fn test_truncation_detection() {
        assert!(is_truncated("<tasks>partial", "tasks"));
        assert!(!is_truncated("<tasks>done</tasks>", "tasks"));
        assert!(!is_truncated("no tags", "tasks"));
    }

    #[test]
    fn test_required_tag_missing() {
        let parser = TagParser::new().required("issue").required("description");
        let err = parser.parse("<issue>bug</issue>").unwrap_err();
        match err {
            LlmError::MissingTag { tag } => assert_eq!(tag, "description"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_required_and_optional() {
        let parser = TagParser::new().required("issue").optional("notes");
        let mut parsed = parser.parse("<issue> bug </issue>").unwrap();
        assert_eq!(parsed.require("issue").unwrap(), "bug");
        assert!(parsed.get("notes").is_none());
        assert_eq!(parsed.take("issue").unwrap(), "bug");
        assert!(parsed.take("issue").is_err());
    }
}
