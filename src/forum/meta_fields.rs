//! Metadata fields a posting form offers, per content type.

use crate::error::{PuffError, Result};
use regex::Regex;
use std::collections::BTreeMap;

/// How a field is edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaFieldKind {
    Text,
    Textarea,
    Pulldown,
    Array,
}

/// One metadata field.
#[derive(Debug, Clone)]
pub struct MetaField {
    pub name: String,
    pub kind: MetaFieldKind,
    /// Choices for pulldowns.
    pub options: Vec<String>,
    pub default_value: Option<String>,
    /// Each value (each element, for arrays) must match.
    pub validator: Option<Regex>,
}

impl MetaField {
    pub fn new(name: impl Into<String>, kind: MetaFieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            options: Vec::new(),
            default_value: None,
            validator: None,
        }
    }

    pub fn with_options(mut self, options: &[&str]) -> Self {
        self.options = options.iter().map(|o| o.to_string()).collect();
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_validator(mut self, validator: Regex) -> Self {
        self.validator = Some(validator);
        self
    }

    /// True if `value` is acceptable for this field.
    pub fn accepts(&self, value: &str) -> bool {
        if self.kind == MetaFieldKind::Pulldown && !self.options.iter().any(|o| o == value) {
            return false;
        }
        self.validator.as_ref().map_or(true, |re| re.is_match(value))
    }
}

/// Which content types a field applies to.
#[derive(Debug, Clone, Default)]
pub struct FieldContext {
    /// Types the field is offered for. `None` means every known type.
    pub include: Option<Vec<String>>,
    pub exclude: Vec<String>,
}

impl FieldContext {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn only(types: &[&str]) -> Self {
        Self {
            include: Some(types.iter().map(|t| t.to_string()).collect()),
            exclude: Vec::new(),
        }
    }

    pub fn except(types: &[&str]) -> Self {
        Self {
            include: None,
            exclude: types.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// Registered fields and their per-type scoping.
#[derive(Debug, Clone, Default)]
pub struct MetaFieldRegistry {
    fields: Vec<MetaField>,
    by_type: BTreeMap<String, Vec<String>>,
}

impl MetaFieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The fields every forum starts with.
    pub fn with_defaults(content_types: &[&str]) -> Result<Self> {
        let mut registry = Self::new();
        let tag = Regex::new(r"(?i)^[a-z0-9]+$")
            .map_err(|e| PuffError::config(format!("invalid tag validator: {}", e)))?;

        registry.add(
            MetaField::new("reply privacy", MetaFieldKind::Pulldown)
                .with_options(&["", "public", "private", "anonymous", "invisible"])
                .with_default(""),
            FieldContext::all(),
            content_types,
        )?;
        registry.add(
            MetaField::new("content license", MetaFieldKind::Pulldown)
                .with_options(&[
                    "",
                    "CreativeCommonsAttribution",
                    "GNUPublicLicense",
                    "Publicdomain",
                    "Rights-managed",
                    "Royalty-free",
                ])
                .with_default(""),
            FieldContext::all(),
            content_types,
        )?;
        registry.add(
            MetaField::new("tags", MetaFieldKind::Array).with_validator(tag),
            FieldContext::except(&["profile"]),
            content_types,
        )?;
        registry.add(
            MetaField::new("language", MetaFieldKind::Text),
            FieldContext::all(),
            content_types,
        )?;
        registry.add(
            MetaField::new("name", MetaFieldKind::Text),
            FieldContext::only(&["profile"]),
            content_types,
        )?;
        Ok(registry)
    }

    /// Registers `field` for the types selected by `context`.
    ///
    /// `known_types` is what an unrestricted context expands to.
    pub fn add(&mut self, field: MetaField, context: FieldContext, known_types: &[&str]) -> Result<()> {
        if field.name.is_empty() {
            return Err(PuffError::validation("Invalid meta field name"));
        }

        let types: Vec<String> = match context.include {
            Some(include) => include,
            None => known_types.iter().map(|t| t.to_string()).collect(),
        };
        for content_type in types {
            if context.exclude.contains(&content_type) {
                continue;
            }
            self.by_type
                .entry(content_type)
                .or_default()
                .push(field.name.clone());
        }

        self.fields.push(field);
        Ok(())
    }

    pub fn field(&self, name: &str) -> Option<&MetaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn fields(&self) -> &[MetaField] {
        &self.fields
    }

    /// Fields offered for `content_type`, in registration order.
    pub fn fields_for(&self, content_type: &str) -> Vec<&MetaField> {
        self.by_type
            .get(content_type)
            .map(|names| names.iter().filter_map(|n| self.field(n)).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TYPES: &[&str] = &["text", "image", "profile"];

    fn names(fields: Vec<&MetaField>) -> Vec<&str> {
        fields.into_iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn test_default_fields_scoped_by_type() {
        let registry = MetaFieldRegistry::with_defaults(TYPES).unwrap();

        assert_eq!(
            names(registry.fields_for("text")),
            vec!["reply privacy", "content license", "tags", "language"]
        );
        assert_eq!(
            names(registry.fields_for("profile")),
            vec!["reply privacy", "content license", "language", "name"]
        );
        assert!(registry.fields_for("unknown").is_empty());
    }

    #[test]
    fn test_validators() {
        let registry = MetaFieldRegistry::with_defaults(TYPES).unwrap();

        let tags = registry.field("tags").unwrap();
        assert!(tags.accepts("Rust2024"));
        assert!(!tags.accepts("two words"));

        let license = registry.field("content license").unwrap();
        assert!(license.accepts("Publicdomain"));
        assert!(!license.accepts("MIT"));

        assert!(registry.field("name").unwrap().accepts("anything at all"));
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut registry = MetaFieldRegistry::new();
        let field = MetaField::new("", MetaFieldKind::Text);
        assert!(registry.add(field, FieldContext::all(), TYPES).is_err());
        assert!(registry.fields().is_empty());
    }
}
