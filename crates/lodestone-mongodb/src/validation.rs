//! Input validation for collection bindings and queries
//!
//! Collection names and relation field names are checked when a model is
//! bound, so a bad binding is reported before any I/O. Filters and pipelines
//! can optionally be screened for operators that run JavaScript on the server.

use bson::Bson;
use lodestone_common::{LodestoneError, Result};
use tracing::warn;

/// Maximum allowed length for collection names (MongoDB limit is 255, we're more conservative)
const MAX_COLLECTION_NAME_LENGTH: usize = 120;

/// Maximum allowed length for field names
const MAX_FIELD_NAME_LENGTH: usize = 1024;

/// Operators that execute JavaScript on the server
const DANGEROUS_OPERATORS: &[&str] = &["$where", "$function", "$accumulator"];

/// A collection name that is safe to bind a model to
///
/// - Not empty
/// - Maximum 120 characters
/// - No null bytes
/// - No "system." prefix
/// - No $ characters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCollectionName {
    name: String,
}

impl ValidatedCollectionName {
    /// Validate a collection name
    ///
    /// # Errors
    /// Returns [`LodestoneError::Configuration`] describing the first rule broken.
    pub fn new(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(LodestoneError::Configuration(
                "Collection name cannot be empty".to_string(),
            ));
        }

        if name.len() > MAX_COLLECTION_NAME_LENGTH {
            return Err(LodestoneError::Configuration(format!(
                "Collection name exceeds maximum length of {} characters: '{}'",
                MAX_COLLECTION_NAME_LENGTH, name
            )));
        }

        if name.contains('\0') {
            return Err(LodestoneError::Configuration(
                "Collection name cannot contain null bytes".to_string(),
            ));
        }

        if name.starts_with("system.") {
            return Err(LodestoneError::Configuration(format!(
                "Collection name cannot start with 'system.' (reserved): '{}'",
                name
            )));
        }

        if name.contains('$') {
            return Err(LodestoneError::Configuration(format!(
                "Collection name cannot contain '$' character: '{}'",
                name
            )));
        }

        if name.contains("..") || name.contains("//") {
            warn!(collection = name, "Collection name contains suspicious pattern");
        }

        Ok(ValidatedCollectionName {
            name: name.to_string(),
        })
    }

    /// Returns the validated collection name as a string slice
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Consumes the ValidatedCollectionName and returns the inner String
    pub fn into_string(self) -> String {
        self.name
    }
}

impl AsRef<str> for ValidatedCollectionName {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for ValidatedCollectionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Check a document field path used in a relation or lookup stage.
///
/// Dotted paths are allowed; a leading `$` is not, since the server would
/// read it as an expression.
pub fn validate_field_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(LodestoneError::Configuration(
            "Field name cannot be empty".to_string(),
        ));
    }

    if name.len() > MAX_FIELD_NAME_LENGTH {
        return Err(LodestoneError::Configuration(format!(
            "Field name exceeds maximum length of {} characters",
            MAX_FIELD_NAME_LENGTH
        )));
    }

    if name.contains('\0') {
        return Err(LodestoneError::Configuration(
            "Field name cannot contain null bytes".to_string(),
        ));
    }

    if name.starts_with('$') {
        return Err(LodestoneError::Configuration(format!(
            "Field name cannot start with '$' (reserved for operators): '{}'",
            name
        )));
    }

    Ok(())
}

/// Reject documents containing operators that run JavaScript on the server
///
/// # Errors
/// Returns [`LodestoneError::Validation`] if a dangerous operator is found at
/// any depth.
pub fn validate_query(query: &Bson) -> Result<()> {
    match query {
        Bson::Document(doc) => {
            for (key, value) in doc.iter() {
                if DANGEROUS_OPERATORS.contains(&key.as_str()) {
                    return Err(LodestoneError::Validation(format!(
                        "Dangerous operator '{}' is not allowed for security reasons",
                        key
                    )));
                }
                validate_query(value)?;
            }
            Ok(())
        }
        Bson::Array(arr) => {
            for item in arr {
                validate_query(item)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_valid_collection_names() {
        assert!(ValidatedCollectionName::new("users").is_ok());
        assert!(ValidatedCollectionName::new("blog.posts").is_ok());
        assert!(ValidatedCollectionName::new("user_profiles_2024").is_ok());
    }

    #[test]
    fn test_invalid_collection_names() {
        for bad in ["", "system.users", "users$", "a\0b"] {
            let err = ValidatedCollectionName::new(bad).unwrap_err();
            assert!(
                matches!(err, LodestoneError::Configuration(_)),
                "expected configuration error for {:?}",
                bad
            );
        }
        let long = "a".repeat(MAX_COLLECTION_NAME_LENGTH + 1);
        assert!(ValidatedCollectionName::new(&long).is_err());
    }

    #[test]
    fn test_collection_name_accessors() {
        let name = ValidatedCollectionName::new("posts").unwrap();
        assert_eq!(name.as_str(), "posts");
        assert_eq!(name.to_string(), "posts");
        assert_eq!(name.into_string(), "posts".to_string());
    }

    #[test]
    fn test_field_names() {
        assert!(validate_field_name("author_id").is_ok());
        assert!(validate_field_name("meta.owner").is_ok());
        assert!(validate_field_name("").is_err());
        assert!(validate_field_name("$author").is_err());
        assert!(validate_field_name("a\0b").is_err());
    }

    #[test]
    fn test_validate_query_allows_plain_filters() {
        let filter = doc! {
            "$and": [
                { "age": { "$gte": 18 } },
                { "status": { "$in": ["active", "pending"] } }
            ]
        };
        assert!(validate_query(&Bson::Document(filter)).is_ok());
    }

    #[test]
    fn test_validate_query_blocks_nested_where() {
        let filter = doc! {
            "$or": [
                { "name": "alice" },
                { "$where": "this.admin == true" }
            ]
        };
        let err = validate_query(&Bson::Document(filter)).unwrap_err();
        assert!(matches!(err, LodestoneError::Validation(_)));
    }

    #[test]
    fn test_validate_query_blocks_pipeline_function() {
        let pipeline = Bson::Array(vec![
            Bson::Document(doc! { "$match": {} }),
            Bson::Document(doc! {
                "$addFields": { "x": { "$function": { "body": "", "args": [], "lang": "js" } } }
            }),
        ]);
        assert!(validate_query(&pipeline).is_err());
    }
}
