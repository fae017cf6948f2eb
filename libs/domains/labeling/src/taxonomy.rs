//! Category taxonomy
//!
//! A taxonomy file is a JSON object mapping each main category to its ordered
//! list of terms:
//!
//! ```json
//! {
//!   "Infrastructure": ["bridge", "road"],
//!   "Hazards": ["fire", "flood"]
//! }
//! ```
//!
//! Loading flattens it into the list of terms to query and a reverse map from
//! lowercased term to main category.

use std::collections::HashMap;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::TaxonomyError;
use crate::models::UNCATEGORIZED;

#[derive(Debug, Clone, Default)]
pub struct Taxonomy {
    terms: Vec<String>,
    term_to_main: HashMap<String, String>,
    main_categories: Vec<String>,
}

impl Taxonomy {
    /// Read and parse a taxonomy file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TaxonomyError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| TaxonomyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, TaxonomyError> {
        let value: Value = serde_json::from_str(raw)?;
        let Value::Object(object) = value else {
            return Err(TaxonomyError::Invalid(
                "top level must be an object of main category to term list".to_string(),
            ));
        };
        Self::from_object(object)
    }

    fn from_object(object: Map<String, Value>) -> Result<Self, TaxonomyError> {
        let mut taxonomy = Taxonomy::default();

        for (main_category, entries) in object {
            let Value::Array(entries) = entries else {
                return Err(TaxonomyError::Invalid(format!(
                    "terms for '{}' must be an array",
                    main_category
                )));
            };

            taxonomy.main_categories.push(main_category.clone());

            for entry in entries {
                let Value::String(term) = entry else {
                    return Err(TaxonomyError::Invalid(format!(
                        "non-string term under '{}'",
                        main_category
                    )));
                };
                taxonomy.insert(&main_category, &term);
            }
        }

        if taxonomy.terms.is_empty() {
            return Err(TaxonomyError::Invalid("taxonomy contains no terms".to_string()));
        }

        debug!(
            terms = taxonomy.terms.len(),
            main_categories = taxonomy.main_categories.len(),
            "Loaded taxonomy"
        );
        Ok(taxonomy)
    }

    /// Build from `(main_category, terms)` pairs, with the same duplicate and
    /// blank-term rules as a parsed file.
    pub fn from_pairs<M, T, I>(pairs: I) -> Self
    where
        M: AsRef<str>,
        T: AsRef<str>,
        I: IntoIterator<Item = (M, Vec<T>)>,
    {
        let mut taxonomy = Taxonomy::default();
        for (main_category, terms) in pairs {
            let main_category = main_category.as_ref();
            taxonomy.main_categories.push(main_category.to_string());
            for term in terms {
                taxonomy.insert(main_category, term.as_ref());
            }
        }
        taxonomy
    }

    fn insert(&mut self, main_category: &str, term: &str) {
        let term = term.trim();
        if term.is_empty() {
            warn!(main_category = %main_category, "Skipping empty taxonomy term");
            return;
        }

        let key = term.to_lowercase();
        if let Some(existing) = self.term_to_main.get(&key) {
            if existing != main_category {
                warn!(
                    term = %term,
                    kept = %existing,
                    ignored = %main_category,
                    "Term listed under several main categories, keeping the first"
                );
            }
            return;
        }

        self.term_to_main.insert(key, main_category.to_string());
        self.terms.push(term.to_string());
    }

    /// Terms to query, in file order, each listed once.
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn main_categories(&self) -> &[String] {
        &self.main_categories
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Main category for `term`, case-insensitive. Unknown terms map to
    /// [`UNCATEGORIZED`].
    pub fn main_category_of(&self, term: &str) -> &str {
        self.term_to_main
            .get(&term.trim().to_lowercase())
            .map(String::as_str)
            .unwrap_or(UNCATEGORIZED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "Infrastructure": ["Bridge", "road", "power"],
        "Hazards": ["fire", "flood"],
        "Needs": ["water", "medical", "rescue"]
    }"#;

    #[test]
    fn test_terms_keep_file_order() {
        let taxonomy = Taxonomy::from_json_str(SAMPLE).unwrap();
        assert_eq!(
            taxonomy.terms(),
            &["Bridge", "road", "power", "fire", "flood", "water", "medical", "rescue"]
        );
        assert_eq!(taxonomy.main_categories(), &["Infrastructure", "Hazards", "Needs"]);
    }

    #[test]
    fn test_reverse_lookup_is_case_insensitive() {
        let taxonomy = Taxonomy::from_json_str(SAMPLE).unwrap();
        assert_eq!(taxonomy.main_category_of("bridge"), "Infrastructure");
        assert_eq!(taxonomy.main_category_of("FLOOD"), "Hazards");
        assert_eq!(taxonomy.main_category_of("earthquake"), UNCATEGORIZED);
    }

    #[test]
    fn test_duplicate_term_first_category_wins() {
        let taxonomy =
            Taxonomy::from_json_str(r#"{"Hazards": ["fire"], "Needs": ["Fire", "water"]}"#).unwrap();
        assert_eq!(taxonomy.terms(), &["fire", "water"]);
        assert_eq!(taxonomy.main_category_of("fire"), "Hazards");
    }

    #[test]
    fn test_blank_terms_are_skipped() {
        let taxonomy = Taxonomy::from_json_str(r#"{"Needs": ["", "  ", "food"]}"#).unwrap();
        assert_eq!(taxonomy.terms(), &["food"]);
    }

    #[test]
    fn test_empty_taxonomy_is_invalid() {
        let err = Taxonomy::from_json_str(r#"{"Needs": []}"#).unwrap_err();
        assert!(matches!(err, TaxonomyError::Invalid(_)));
    }

    #[test]
    fn test_wrong_shapes_are_invalid() {
        assert!(matches!(
            Taxonomy::from_json_str(r#"["fire"]"#).unwrap_err(),
            TaxonomyError::Invalid(_)
        ));
        assert!(matches!(
            Taxonomy::from_json_str(r#"{"Needs": "water"}"#).unwrap_err(),
            TaxonomyError::Invalid(_)
        ));
        assert!(matches!(
            Taxonomy::from_json_str(r#"{"Needs": [1]}"#).unwrap_err(),
            TaxonomyError::Invalid(_)
        ));
        assert!(matches!(
            Taxonomy::from_json_str("{not json").unwrap_err(),
            TaxonomyError::Parse(_)
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let taxonomy = Taxonomy::load(file.path()).unwrap();
        assert_eq!(taxonomy.len(), 8);
    }

    #[test]
    fn test_load_missing_file_reports_path() {
        let err = Taxonomy::load("/nonexistent/taxonomy.json").unwrap_err();
        match err {
            TaxonomyError::Io { path, .. } => {
                assert_eq!(path, std::path::PathBuf::from("/nonexistent/taxonomy.json"))
            }
            other => panic!("expected Io error, got {other:?}"),
        }
    }

    #[test]
    fn test_from_pairs() {
        let taxonomy = Taxonomy::from_pairs([("Hazards", vec!["flood"]), ("Other", vec!["earthquake"])]);
        assert_eq!(taxonomy.main_category_of("earthquake"), "Other");
        assert_eq!(taxonomy.len(), 2);
    }
}
