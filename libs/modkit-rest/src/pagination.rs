use std::collections::BTreeMap;

use modkit_query::QueryOptions;

use crate::resource::{Link, PageMeta};

pub const FIRST: &str = "$first";
pub const LAST: &str = "$last";
pub const PREVIOUS: &str = "$previous";
pub const NEXT: &str = "$next";

/// Navigation links for a collection page.
///
/// `$first` and `$last` are always present (`$last` is page 1 when there are
/// no rows); `$previous` only past page 1, `$next` only before the last page.
/// Each link is `base_url?` followed by `options` with the page number
/// replaced.
#[must_use]
pub fn page_links<Q: QueryOptions>(
    base_url: &str,
    options: &Q,
    page: &PageMeta,
) -> BTreeMap<String, Link> {
    let link = |number: u64| {
        Link::One(format!(
            "{base_url}?{}",
            options.with_page_number(number).to_query_string()
        ))
    };

    let mut links = BTreeMap::new();
    links.insert(FIRST.to_owned(), link(1));
    links.insert(LAST.to_owned(), link(page.count.max(1)));
    if page.number > 1 {
        links.insert(PREVIOUS.to_owned(), link(page.number - 1));
    }
    if page.number < page.count {
        links.insert(NEXT.to_owned(), link(page.number + 1));
    }
    links
}
