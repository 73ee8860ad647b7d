use serde::{Deserialize, Serialize};

/// Per-collection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CollectionConfig {
    /// Identifier field used for element links and point lookups.
    pub id_field: String,
    /// Page size applied when the request leaves it unset.
    pub default_page_size: u64,
    /// Upper bound for requested page sizes.
    pub max_page_size: u64,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            id_field: "id".to_owned(),
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

impl CollectionConfig {
    /// Effective page size for a requested size (`0` = unset).
    #[must_use]
    pub fn effective_page_size(&self, requested: u64) -> u64 {
        let size = if requested == 0 {
            self.default_page_size
        } else {
            requested
        };
        size.clamp(1, self.max_page_size.max(1))
    }
}
