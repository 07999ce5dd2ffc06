//! Turns free-text vision output into an [`ExtractedProducts`] mapping.
//!
//! Models often wrap the JSON they were asked for in prose or code fences.
//! Candidates are located in two passes:
//!
//! 1. a balanced-brace scan that respects string literals and escapes; the
//!    first complete object carrying the product list key wins, otherwise
//!    the first one that parses as JSON
//! 2. the substring from the first `{` to the last `}`, kept as a fallback
//!    for outputs the scanner cannot close (e.g. stray quotes)
//!
//! Parsing never fails: unusable output yields an empty mapping plus an
//! [`ExtractionIssue`] describing why.

use serde_json::Value;
use tracing::warn;

use crate::error::OutfitError;
use crate::models::ExtractedProducts;

/// Key under which the model is asked to nest the category mapping
pub const PRODUCT_LIST_KEY: &str = "product_list";

/// Why a response produced fewer products than expected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionIssue {
    /// Braces were found but no candidate parsed as JSON
    Malformed(String),
    /// Parsed, but the top-level value or the product list was not an object
    NotAnObject,
    /// Parsed object had no product list key
    MissingKey(String),
}

impl ExtractionIssue {
    pub fn message(&self) -> String {
        match self {
            ExtractionIssue::Malformed(details) => format!("no parseable JSON object: {details}"),
            ExtractionIssue::NotAnObject => "extracted JSON is not an object".to_string(),
            ExtractionIssue::MissingKey(key) => format!("extracted JSON has no '{key}' object"),
        }
    }
}

impl From<ExtractionIssue> for OutfitError {
    fn from(issue: ExtractionIssue) -> Self {
        OutfitError::MalformedExtraction(issue.message())
    }
}

/// Result of parsing one vision response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedExtraction {
    pub products: ExtractedProducts,
    pub issue: Option<ExtractionIssue>,
}

impl ParsedExtraction {
    fn empty(issue: Option<ExtractionIssue>) -> Self {
        Self {
            products: ExtractedProducts::new(),
            issue,
        }
    }
}

/// Parse with the default [`PRODUCT_LIST_KEY`]
pub fn parse_products(raw: &str) -> ParsedExtraction {
    parse_products_with_key(raw, PRODUCT_LIST_KEY)
}

pub fn parse_products_with_key(raw: &str, key: &str) -> ParsedExtraction {
    let Some(root) = locate_json_object(raw, key) else {
        return ParsedExtraction::empty(None);
    };

    let root = match root {
        Ok(value) => value,
        Err(details) => {
            warn!(
                error_kind = "MalformedExtraction",
                details = %details,
                "Vision output contained no parseable JSON"
            );
            return ParsedExtraction::empty(Some(ExtractionIssue::Malformed(details)));
        }
    };

    let Value::Object(mut root) = root else {
        return ParsedExtraction::empty(Some(ExtractionIssue::NotAnObject));
    };

    match root.remove(key) {
        Some(Value::Object(list)) => ParsedExtraction {
            products: ExtractedProducts::from_json_map(list),
            issue: None,
        },
        Some(_) => ParsedExtraction::empty(Some(ExtractionIssue::NotAnObject)),
        None => ParsedExtraction::empty(Some(ExtractionIssue::MissingKey(key.to_string()))),
    }
}

/// `None` when the text has no opening brace
fn locate_json_object(raw: &str, key: &str) -> Option<Result<Value, String>> {
    let first = raw.find('{')?;
    let Some(last) = raw.rfind('}') else {
        return Some(Err("no closing brace".to_string()));
    };

    let mut first_parsed = None;
    for candidate in balanced_objects(raw) {
        let Ok(value) = serde_json::from_str::<Value>(candidate) else {
            continue;
        };
        if value.get(key).is_some() {
            return Some(Ok(value));
        }
        if first_parsed.is_none() {
            first_parsed = Some(value);
        }
    }
    if let Some(value) = first_parsed {
        return Some(Ok(value));
    }

    if last < first {
        return Some(Err("closing brace precedes opening brace".to_string()));
    }
    Some(serde_json::from_str::<Value>(&raw[first..=last]).map_err(|e| e.to_string()))
}

/// Every top-level `{...}` span whose braces balance outside string literals
fn balanced_objects(raw: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in raw.char_indices() {
        if depth > 0 && in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    spans.push(&raw[start..=i]);
                }
            }
            _ => {}
        }
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_wrapped_in_prose() {
        let parsed = parse_products(r#"Here you go: {"product_list": {"hat": "blue cap"}} Thanks!"#);
        assert_eq!(parsed.products.get("hat"), Some("blue cap"));
        assert_eq!(parsed.products.len(), 1);
        assert!(parsed.issue.is_none());
    }

    #[test]
    fn test_code_fence_and_order() {
        let raw = "```json\n{\n  \"product_list\": {\n    \"jacket\": \"olive bomber\",\n    \"trousers\": \"black slim jeans\",\n    \"shoes\": \"white sneakers\"\n  }\n}\n```";
        let parsed = parse_products(raw);
        let categories: Vec<_> = parsed.products.iter().map(|e| e.category.as_str()).collect();
        assert_eq!(categories, vec!["jacket", "trousers", "shoes"]);
    }

    #[test]
    fn test_no_braces_is_empty_without_issue() {
        let parsed = parse_products("Sorry, I can't process that image.");
        assert!(parsed.products.is_empty());
        assert!(parsed.issue.is_none());
    }

    #[test]
    fn test_unbalanced_braces_report_malformed() {
        let parsed = parse_products(r#"{"product_list": {"hat": "blue cap"} oops"#);
        assert!(parsed.products.is_empty());
        assert!(matches!(parsed.issue, Some(ExtractionIssue::Malformed(_))));
    }

    #[test]
    fn test_truncated_output_reports_malformed() {
        let parsed = parse_products(r#"{"product_list": {"hat": "cap""#);
        assert!(parsed.products.is_empty());
        assert!(matches!(parsed.issue, Some(ExtractionIssue::Malformed(_))));
    }

    #[test]
    fn test_brace_inside_string_literal() {
        let raw = r#"Result: {"product_list": {"bag": "tote with {logo} print \"classic\""}}"#;
        let parsed = parse_products(raw);
        assert_eq!(
            parsed.products.get("bag"),
            Some(r#"tote with {logo} print "classic""#)
        );
    }

    #[test]
    fn test_first_complete_object_wins() {
        let raw = r#"{"product_list": {"hat": "cap"}} and also {"product_list": {"scarf": "wool"}}"#;
        let parsed = parse_products(raw);
        assert_eq!(parsed.products.get("hat"), Some("cap"));
        assert_eq!(parsed.products.get("scarf"), None);
    }

    #[test]
    fn test_prefers_object_with_product_list_over_echoed_schema() {
        let raw = r#"Format: {"category": "description"}. Answer: {"product_list": {"coat": "camel wool"}}"#;
        let parsed = parse_products(raw);
        assert_eq!(parsed.products.get("coat"), Some("camel wool"));
        assert_eq!(parsed.products.len(), 1);
        assert!(parsed.issue.is_none());
    }

    #[test]
    fn test_first_parsed_object_used_when_none_has_the_key() {
        let parsed = parse_products(r#"{"items": {"hat": "cap"}} then {"other": {}}"#);
        assert_eq!(
            parsed.issue,
            Some(ExtractionIssue::MissingKey("product_list".to_string()))
        );
    }

    #[test]
    fn test_skips_unparseable_object_before_valid_one() {
        let raw = r#"Template {category: description}. Answer: {"product_list": {"belt": "brown leather"}}"#;
        let parsed = parse_products(raw);
        assert_eq!(parsed.products.get("belt"), Some("brown leather"));
    }

    #[test]
    fn test_missing_key_and_non_object_values() {
        let parsed = parse_products(r#"{"items": {"hat": "cap"}}"#);
        assert!(parsed.products.is_empty());
        assert_eq!(
            parsed.issue,
            Some(ExtractionIssue::MissingKey("product_list".to_string()))
        );

        let parsed = parse_products(r#"{"product_list": ["hat", "cap"]}"#);
        assert_eq!(parsed.issue, Some(ExtractionIssue::NotAnObject));
    }

    #[test]
    fn test_garbage_values_pass_through() {
        let parsed = parse_products(r#"{"product_list": {"": "mystery", "count": 3, "hat": null}}"#);
        assert_eq!(parsed.products.get(""), Some("mystery"));
        assert_eq!(parsed.products.get("count"), Some("3"));
        assert_eq!(parsed.products.get("hat"), Some("null"));
    }

    #[test]
    fn test_custom_key() {
        let parsed = parse_products_with_key(r#"{"outfit": {"coat": "camel"}}"#, "outfit");
        assert_eq!(parsed.products.get("coat"), Some("camel"));
    }

    #[test]
    fn test_issue_converts_to_malformed_extraction() {
        let err: OutfitError = ExtractionIssue::NotAnObject.into();
        assert_eq!(err.kind(), "MALFORMED_EXTRACTION");
    }
}
