//! Catalog-facing input types.
//!
//! The catalog/search layer hands over an ordered product list. Only two
//! things matter here: the ordinal position of each product (which decides
//! its render [`Role`]) and its raw image URL.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of leading positions in a rendered list treated as above the fold.
pub const CRITICAL_POSITIONS: usize = 3;

/// Render priority of an image, derived from its position in a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// First item in the list; the largest contributor to first paint.
    PrimaryCritical,
    /// Second item in the list.
    SecondaryCritical,
    /// Third item in the list.
    TertiaryCritical,
    /// Everything below the fold.
    Standard,
}

impl Role {
    /// Derive the role from a zero-based list position.
    pub fn from_ordinal(position: usize) -> Self {
        match position {
            0 => Role::PrimaryCritical,
            1 => Role::SecondaryCritical,
            2 => Role::TertiaryCritical,
            _ => Role::Standard,
        }
    }

    /// Returns true for the above-the-fold roles.
    pub fn is_critical(&self) -> bool {
        !matches!(self, Role::Standard)
    }

    /// Short name for logs and CLI output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::PrimaryCritical => "primary",
            Role::SecondaryCritical => "secondary",
            Role::TertiaryCritical => "tertiary",
            Role::Standard => "standard",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A product as supplied by the catalog layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Catalog identifier.
    pub id: String,
    /// Display label, used as placeholder text when the image cannot be shown.
    #[serde(default)]
    pub label: String,
    /// Raw image URLs in catalog order. The first one is the listing image.
    #[serde(default)]
    pub image_urls: Vec<String>,
}

impl CatalogItem {
    /// Create a catalog item with a single image.
    pub fn new(id: impl Into<String>, label: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            image_urls: vec![image_url.into()],
        }
    }

    /// The listing image URL, if the product has any non-blank one.
    pub fn primary_image(&self) -> Option<&str> {
        self.image_urls
            .iter()
            .map(|u| u.trim())
            .find(|u| !u.is_empty())
    }

    /// Label for alt text and placeholders, falling back to the id.
    pub fn display_label(&self) -> &str {
        match self.label.trim() {
            "" => &self.id,
            label => label,
        }
    }
}

/// A single image to resolve: the raw asset URL plus its render role.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    /// Untransformed asset URL as the catalog provides it. May be empty.
    pub raw_url: String,
    /// Render priority.
    pub role: Role,
}

impl ImageReference {
    /// Create a reference.
    pub fn new(raw_url: impl Into<String>, role: Role) -> Self {
        Self {
            raw_url: raw_url.into(),
            role,
        }
    }

    /// Build references for an ordered product list.
    ///
    /// Products without an image still produce a reference (with an empty
    /// URL) so ordinal positions, and therefore roles, stay aligned with
    /// what the renderer shows.
    pub fn from_catalog(items: &[CatalogItem]) -> Vec<Self> {
        items
            .iter()
            .enumerate()
            .map(|(position, item)| {
                Self::new(
                    item.primary_image().unwrap_or_default(),
                    Role::from_ordinal(position),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_ordinal() {
        assert_eq!(Role::from_ordinal(0), Role::PrimaryCritical);
        assert_eq!(Role::from_ordinal(1), Role::SecondaryCritical);
        assert_eq!(Role::from_ordinal(2), Role::TertiaryCritical);
        assert_eq!(Role::from_ordinal(3), Role::Standard);
        assert_eq!(Role::from_ordinal(500), Role::Standard);
    }

    #[test]
    fn test_critical_positions_match_roles() {
        for position in 0..CRITICAL_POSITIONS {
            assert!(Role::from_ordinal(position).is_critical());
        }
        assert!(!Role::from_ordinal(CRITICAL_POSITIONS).is_critical());
    }

    #[test]
    fn test_primary_image_skips_blank_urls() {
        let item = CatalogItem {
            id: "p1".to_string(),
            label: "Pendant".to_string(),
            image_urls: vec!["  ".to_string(), "https://cdn.test/a.jpg".to_string()],
        };
        assert_eq!(item.primary_image(), Some("https://cdn.test/a.jpg"));
    }

    #[test]
    fn test_from_catalog_keeps_positions_for_missing_images() {
        let items = vec![
            CatalogItem::new("a", "A", "https://cdn.test/a.jpg"),
            CatalogItem {
                id: "b".to_string(),
                label: "B".to_string(),
                image_urls: vec![],
            },
            CatalogItem::new("c", "C", "https://cdn.test/c.jpg"),
            CatalogItem::new("d", "D", "https://cdn.test/d.jpg"),
        ];

        let refs = ImageReference::from_catalog(&items);

        assert_eq!(refs.len(), 4);
        assert_eq!(refs[1].raw_url, "");
        assert_eq!(refs[1].role, Role::SecondaryCritical);
        assert_eq!(refs[3].role, Role::Standard);
    }

    #[test]
    fn test_display_label_falls_back_to_id() {
        assert_eq!(CatalogItem::new("sku-9", "Drum Shade", "").display_label(), "Drum Shade");
        assert_eq!(CatalogItem::new("sku-9", "  ", "").display_label(), "sku-9");
    }

    #[test]
    fn test_catalog_item_deserializes_without_optional_fields() {
        let item: CatalogItem = serde_json::from_str(r#"{"id":"x"}"#).unwrap();
        assert_eq!(item.id, "x");
        assert!(item.primary_image().is_none());
    }
}
