use serde::{Deserialize, Serialize};

use crate::filter::FilterPredicate;

/// Requested page: 1-based number and size.
///
/// A size of `0` means "no explicit size", letting the collection apply its
/// configured default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub number: u64,
    pub size: u64,
}

impl Default for Page {
    fn default() -> Self {
        Self { number: 1, size: 0 }
    }
}

impl Page {
    #[must_use]
    pub const fn new(number: u64, size: u64) -> Self {
        Self { number, size }
    }

    /// Number of rows preceding this page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.number.saturating_sub(1).saturating_mul(self.size)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

/// Ordered field → direction list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sort(Vec<(String, SortDir)>);

impl Sort {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn asc(mut self, field: impl Into<String>) -> Self {
        self.0.push((field.into(), SortDir::Asc));
        self
    }

    #[must_use]
    pub fn desc(mut self, field: impl Into<String>) -> Self {
        self.0.push((field.into(), SortDir::Desc));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, SortDir)> {
        self.0.iter().map(|(field, dir)| (field.as_str(), *dir))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Querystring form: `name,-age`.
    #[must_use]
    pub fn to_param(&self) -> String {
        self.0
            .iter()
            .map(|(field, dir)| match dir {
                SortDir::Asc => field.clone(),
                SortDir::Desc => format!("-{field}"),
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Parsed query options of a collection request.
///
/// Implementations are immutable per request. [`QueryOptions::with_page_number`]
/// derives a copy for pagination links without touching the original.
pub trait QueryOptions: Send + Sync {
    fn page(&self) -> Page;

    fn sort(&self) -> Option<&Sort>;

    /// Sparse fieldset for a resource type; `None` means all fields.
    fn fields_for(&self, scope: &str) -> Option<&[String]>;

    fn filter(&self) -> Option<&FilterPredicate>;

    /// Requested relationship names; `None` means none.
    fn include(&self) -> Option<&[String]>;

    /// Copy of these options with only the page number replaced.
    #[must_use]
    fn with_page_number(&self, number: u64) -> Self
    where
        Self: Sized;

    /// Querystring form, without the leading `?`.
    fn to_query_string(&self) -> String;
}
