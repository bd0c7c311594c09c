// Pagination helpers for GitHub list endpoints.
// Parses the `Link` header and builds `per_page`/`page` query strings.

use reqwest::Url;
use reqwest::header::{HeaderMap, LINK};

/// Items requested per page when following pagination.
pub const PER_PAGE: u32 = 100;

/// Hard cap on pages requested by a single pagination-following fetch.
pub const MAX_PAGE_FOLLOW: u32 = 100;

/// Whether the response declares another page.
///
/// GitHub sends links as `<https://api.github.com/...&page=2>; rel="next", <...>; rel="last"`.
pub fn has_next_page(headers: &HeaderMap) -> bool {
    headers
        .get(LINK)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|link| link.contains(r#"rel="next""#))
}

/// Copy of `url` with `per_page` and `page` set, replacing any existing values
/// and keeping all other query parameters.
pub fn page_url(url: &Url, per_page: u32, page: u32) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "per_page" && k != "page")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut paged = url.clone();
    paged
        .query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("per_page", &per_page.to_string())
        .append_pair("page", &page.to_string());
    paged
}
