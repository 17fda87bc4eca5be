//! Relation descriptors for virtual populate.
//!
//! Each model declares the fields that can be populated as a static table of
//! [`Relation`] values, usually built with the [`relations!`](crate::relations)
//! macro. The table is checked once when the model is bound to a collection.

use std::collections::HashSet;

use lodestone_common::{LodestoneError, Result};

use crate::model::default_collection_name;
use crate::validation::{validate_field_name, ValidatedCollectionName};

/// How a populated field joins another collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    /// Name callers pass to `populate`, e.g. `"Author"`
    pub field: &'static str,
    /// Field on this model holding the join key
    pub local_field: &'static str,
    /// Field on the joined collection matched against `local_field`
    pub foreign_field: &'static str,
    /// Collapse the joined array to its first element
    pub just_one: bool,
    /// Replace the joined array with its length
    pub count: bool,
    /// Joined collection; derived from `field` when unset
    pub from: Option<&'static str>,
}

impl Relation {
    pub const fn new(
        field: &'static str,
        local_field: &'static str,
        foreign_field: &'static str,
    ) -> Self {
        Self {
            field,
            local_field,
            foreign_field,
            just_one: false,
            count: false,
            from: None,
        }
    }

    pub const fn just_one(mut self, just_one: bool) -> Self {
        self.just_one = just_one;
        self
    }

    pub const fn count(mut self, count: bool) -> Self {
        self.count = count;
        self
    }

    pub const fn from(mut self, collection: &'static str) -> Self {
        self.from = Some(collection);
        self
    }

    /// Key the joined data is stored under in the result document
    pub fn alias(&self) -> String {
        self.field.to_lowercase()
    }

    /// Collection the `$lookup` reads from
    pub fn from_collection(&self) -> String {
        match self.from {
            Some(name) => name.to_string(),
            None => default_collection_name(self.field),
        }
    }

    /// Whether the joined array is collapsed to a single document
    pub fn collapses_to_one(&self) -> bool {
        self.just_one && !self.count
    }
}

/// Find the relation declared for `field`
///
/// # Errors
/// [`LodestoneError::FieldNotFound`] when the model declares no such relation.
pub fn find_relation<'a>(
    relations: &'a [Relation],
    model: &str,
    field: &str,
) -> Result<&'a Relation> {
    relations
        .iter()
        .find(|r| r.field == field)
        .ok_or_else(|| LodestoneError::FieldNotFound {
            model: model.to_string(),
            field: field.to_string(),
        })
}

/// Check a relation table for mistakes that would only surface at query time
pub fn validate_relations(model: &str, relations: &[Relation]) -> Result<()> {
    let mut seen = HashSet::new();
    for relation in relations {
        if relation.field.is_empty() {
            return Err(LodestoneError::Configuration(format!(
                "{} declares a relation with an empty field name",
                model
            )));
        }
        if !seen.insert(relation.field) {
            return Err(LodestoneError::Configuration(format!(
                "{} declares relation '{}' more than once",
                model, relation.field
            )));
        }
        validate_field_name(relation.local_field).map_err(|e| in_relation(model, relation, e))?;
        validate_field_name(relation.foreign_field)
            .map_err(|e| in_relation(model, relation, e))?;
        validate_field_name(&relation.alias()).map_err(|e| in_relation(model, relation, e))?;
        ValidatedCollectionName::new(&relation.from_collection())
            .map_err(|e| in_relation(model, relation, e))?;
    }
    Ok(())
}

fn in_relation(model: &str, relation: &Relation, err: LodestoneError) -> LodestoneError {
    LodestoneError::Configuration(format!(
        "{}.{}: {}",
        model, relation.field, err
    ))
}

/// Build a static relation table.
///
/// ```ignore
/// fn relations() -> &'static [Relation] {
///     relations![
///         "Author" => { local: "author_id", foreign: "_id", just_one: true },
///         "Comments" => { local: "_id", foreign: "post_id" },
///         "Likes" => { local: "_id", foreign: "post_id", count: true },
///     ]
/// }
/// ```
#[macro_export]
macro_rules! relations {
    ($(
        $field:literal => {
            local: $local:literal,
            foreign: $foreign:literal
            $(, just_one: $just_one:literal)?
            $(, count: $count:literal)?
            $(, from: $from:literal)?
            $(,)?
        }
    ),* $(,)?) => {{
        const RELATIONS: &[$crate::Relation] = &[
            $(
                $crate::Relation::new($field, $local, $foreign)
                    $(.just_one($just_one))?
                    $(.count($count))?
                    $(.from($from))?
            ),*
        ];
        RELATIONS
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> &'static [Relation] {
        crate::relations![
            "Author" => { local: "author_id", foreign: "_id", just_one: true },
            "Comments" => { local: "_id", foreign: "post_id" },
            "Likes" => { local: "_id", foreign: "post_id", count: true },
            "Editor" => { local: "editor_id", foreign: "_id", just_one: true, from: "people" },
        ]
    }

    #[test]
    fn test_macro_builds_table() {
        let relations = table();
        assert_eq!(relations.len(), 4);
        assert_eq!(
            relations[0],
            Relation::new("Author", "author_id", "_id").just_one(true)
        );
        assert!(!relations[1].just_one);
        assert!(relations[2].count);
        assert_eq!(relations[3].from, Some("people"));
    }

    #[test]
    fn test_alias_and_collection() {
        let author = Relation::new("Author", "author_id", "_id");
        assert_eq!(author.alias(), "author");
        assert_eq!(author.from_collection(), "authors");

        let editor = author.from("people");
        assert_eq!(editor.from_collection(), "people");
    }

    #[test]
    fn test_collapses_to_one() {
        assert!(Relation::new("A", "a", "b").just_one(true).collapses_to_one());
        assert!(!Relation::new("A", "a", "b").collapses_to_one());
        assert!(!Relation::new("A", "a", "b")
            .just_one(true)
            .count(true)
            .collapses_to_one());
    }

    #[test]
    fn test_find_relation() {
        let found = find_relation(table(), "Post", "Comments").unwrap();
        assert_eq!(found.foreign_field, "post_id");

        let err = find_relation(table(), "Post", "Tags").unwrap_err();
        match err {
            LodestoneError::FieldNotFound { model, field } => {
                assert_eq!(model, "Post");
                assert_eq!(field, "Tags");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_field_lookup_is_case_sensitive() {
        assert!(find_relation(table(), "Post", "author").is_err());
    }

    #[test]
    fn test_validate_relations_ok() {
        assert!(validate_relations("Post", table()).is_ok());
        assert!(validate_relations("Post", &[]).is_ok());
    }

    #[test]
    fn test_validate_relations_rejects_duplicates() {
        let dup = [
            Relation::new("Author", "author_id", "_id"),
            Relation::new("Author", "writer_id", "_id"),
        ];
        let err = validate_relations("Post", &dup).unwrap_err();
        assert!(matches!(err, LodestoneError::Configuration(_)));
    }

    #[test]
    fn test_validate_relations_rejects_bad_fields() {
        let bad_local = [Relation::new("Author", "", "_id")];
        assert!(validate_relations("Post", &bad_local).is_err());

        let operator = [Relation::new("Author", "author_id", "$id")];
        assert!(validate_relations("Post", &operator).is_err());

        let empty = [Relation::new("", "author_id", "_id")];
        assert!(validate_relations("Post", &empty).is_err());

        let system = [Relation::new("Author", "author_id", "_id").from("system.users")];
        assert!(validate_relations("Post", &system).is_err());
    }
}
