//! forge::pagination
//!
//! Follow `Link: <url>; rel="next"` headers across list endpoints.
//!
//! GitHub does not always honor large `per_page` values, so list helpers
//! keep requesting the next page until the header no longer advertises
//! one, concatenating every page into one sequence.

use serde::de::DeserializeOwned;

use super::traits::{ApiRequest, ForgeError, Transport};

/// Hard stop against a remote that keeps advertising a next page.
const MAX_PAGES: usize = 1000;

/// Extract the `rel="next"` target from a `Link` header value.
///
/// ```
/// use ghtree::forge::next_page_link;
///
/// let header = r#"<https://api.github.com/x?page=2>; rel="next", <https://api.github.com/x?page=5>; rel="last""#;
/// assert_eq!(next_page_link(header), Some("https://api.github.com/x?page=2"));
/// assert_eq!(next_page_link(r#"<https://api.github.com/x?page=1>; rel="prev""#), None);
/// ```
pub fn next_page_link(header: &str) -> Option<&str> {
    header.split(',').find_map(|link| {
        let mut parts = link.split(';').map(str::trim);
        let target = parts.next()?.strip_prefix('<')?.strip_suffix('>')?;
        let is_next = parts.any(|param| {
            param
                .strip_prefix("rel=")
                .map(|v| v.trim_matches(|c| c == '"' || c == '\''))
                .is_some_and(|v| v.split_whitespace().any(|rel| rel == "next"))
        });
        is_next.then_some(target)
    })
}

/// GET `path` and every following page, concatenating the JSON arrays.
///
/// # Errors
///
/// The first failing page aborts the walk and its error is returned.
pub async fn request_all_pages<T: DeserializeOwned>(
    transport: &dyn Transport,
    path: &str,
) -> Result<Vec<T>, ForgeError> {
    let mut results = Vec::new();
    let mut next = Some(path.to_string());
    let mut pages = 0;

    while let Some(current) = next.take() {
        let response = transport.send(ApiRequest::get(current.clone())).await?;
        let page: Vec<T> = response.json(&current)?;
        results.extend(page);

        pages += 1;
        if pages >= MAX_PAGES {
            tracing::warn!(path, pages, "pagination limit reached");
            break;
        }
        next = response
            .header("link")
            .and_then(next_page_link)
            .map(str::to_string);
    }

    Ok(results)
}
