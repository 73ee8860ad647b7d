use std::collections::BTreeMap;

use url::form_urlencoded;

use crate::filter::FilterPredicate;
use crate::options::{Page, QueryOptions, Sort};

/// Builder-constructed [`QueryOptions`].
///
/// Serializes as
/// `page[number]=..&page[size]=..&sort=a,-b&fields[type]=x,y&include=r&filter=<json>`
/// (form-urlencoded). Only non-default parts are emitted, except the page
/// number which is always present so that pagination links are explicit.
///
/// ```
/// use modkit_query::{FilterPredicate, QueryOptions, ResourceQuery, Sort};
///
/// let q = ResourceQuery::new()
///     .with_page(2, 10)
///     .with_sort(Sort::new().desc("name"))
///     .with_filter(FilterPredicate::eq("groupId", 1));
/// assert_eq!(q.page().number, 2);
/// assert_eq!(q.with_page_number(3).page().number, 3);
/// assert_eq!(q.page().number, 2);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResourceQuery {
    page: Page,
    sort: Option<Sort>,
    fields: BTreeMap<String, Vec<String>>,
    filter: Option<FilterPredicate>,
    include: Option<Vec<String>>,
}

impl ResourceQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_page(mut self, number: u64, size: u64) -> Self {
        self.page = Page::new(number, size);
        self
    }

    #[must_use]
    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = (!sort.is_empty()).then_some(sort);
        self
    }

    #[must_use]
    pub fn with_fields<I, S>(mut self, scope: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields
            .insert(scope.into(), fields.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: FilterPredicate) -> Self {
        self.filter = Some(filter);
        self
    }

    #[must_use]
    pub fn with_include<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = Some(names.into_iter().map(Into::into).collect());
        self
    }
}

impl QueryOptions for ResourceQuery {
    fn page(&self) -> Page {
        self.page
    }

    fn sort(&self) -> Option<&Sort> {
        self.sort.as_ref()
    }

    fn fields_for(&self, scope: &str) -> Option<&[String]> {
        self.fields.get(scope).map(Vec::as_slice)
    }

    fn filter(&self) -> Option<&FilterPredicate> {
        self.filter.as_ref()
    }

    fn include(&self) -> Option<&[String]> {
        self.include.as_deref()
    }

    fn with_page_number(&self, number: u64) -> Self {
        let mut derived = self.clone();
        derived.page.number = number;
        derived
    }

    fn to_query_string(&self) -> String {
        let mut out = form_urlencoded::Serializer::new(String::new());
        out.append_pair("page[number]", &self.page.number.to_string());
        if self.page.size > 0 {
            out.append_pair("page[size]", &self.page.size.to_string());
        }
        if let Some(sort) = &self.sort {
            out.append_pair("sort", &sort.to_param());
        }
        for (scope, fields) in &self.fields {
            out.append_pair(&format!("fields[{scope}]"), &fields.join(","));
        }
        if let Some(include) = &self.include {
            out.append_pair("include", &include.join(","));
        }
        if let Some(filter) = &self.filter {
            out.append_pair("filter", &filter.to_json().to_string());
        }
        out.finish()
    }
}
