//! Cursor-following pagination over Cloud Director list endpoints
//!
//! Listing endpoints return a page of values plus a `Link` response header;
//! the continuation cursor for the next call is the `cursor` query parameter
//! of the link with `rel="nextPage"`. An absent link or absent cursor always
//! means "no further pages", never an error, so a lister backed by N pages
//! issues exactly N requests and terminates.

use async_trait::async_trait;
use futures::stream::{self, Stream, TryStreamExt};
use url::Url;

use crate::error::Error;

/// One page of values plus the raw `Link` header values of the response
#[derive(Clone, Debug, Default)]
pub struct PageResponse<T> {
    /// Records carried by this page (may be empty)
    pub values: Vec<T>,
    /// Raw `Link` header values, unparsed
    pub link_headers: Vec<String>,
}

/// A remote listing endpoint that serves one page per call
#[async_trait]
pub trait PagedEndpoint: Send + Sync {
    /// Record type produced by the endpoint
    type Item: Send;

    /// Fetch one page. `cursor` of `None` requests the first page.
    async fn fetch(
        &self,
        page_size: u32,
        cursor: Option<&str>,
    ) -> Result<PageResponse<Self::Item>, Error>;
}

enum PageState {
    Fetch(Option<String>),
    Done,
}

/// Lazily enumerate every record behind a paged endpoint.
///
/// Pages are fetched on demand as the stream is polled; the stream is finite
/// and ends when a response carries no usable next-page cursor.
pub fn stream<E: PagedEndpoint>(
    endpoint: &E,
    page_size: u32,
) -> impl Stream<Item = Result<E::Item, Error>> + '_ {
    stream::try_unfold(PageState::Fetch(None), move |state| async move {
        let cursor = match state {
            PageState::Fetch(cursor) => cursor,
            PageState::Done => return Ok::<_, Error>(None),
        };
        let page = endpoint.fetch(page_size, cursor.as_deref()).await?;
        let next = match next_cursor(&page.link_headers)? {
            Some(c) => PageState::Fetch(Some(c)),
            None => PageState::Done,
        };
        Ok(Some((stream::iter(page.values.into_iter().map(Ok)), next)))
    })
    .try_flatten()
}

/// Collect every record behind a paged endpoint into a Vec.
///
/// The DNAT cleaner needs the full result set before issuing any delete
/// (deleting mid-enumeration invalidates the server-side cursor).
pub async fn list_all<E: PagedEndpoint>(
    endpoint: &E,
    page_size: u32,
) -> Result<Vec<E::Item>, Error> {
    stream(endpoint, page_size).try_collect().await
}

/// Extract the continuation cursor from raw `Link` header values.
///
/// Returns `Ok(None)` when no `nextPage` relation is present or the link
/// carries no non-empty `cursor` query parameter. A `nextPage` link whose
/// URI does not parse is an error.
pub fn next_cursor(link_headers: &[String]) -> Result<Option<String>, Error> {
    let Some(uri) = link_headers
        .iter()
        .flat_map(|value| parse_link_header(value))
        .find_map(|(uri, rel)| (rel == "nextPage").then_some(uri))
    else {
        return Ok(None);
    };

    let url = Url::parse(&uri)
        .map_err(|e| Error::serialization(format!("unable to parse cursor URI [{uri}]: {e}")))?;

    let cursor = url
        .query_pairs()
        .find_map(|(k, v)| (k == "cursor").then(|| v.into_owned()));

    Ok(cursor.filter(|c| !c.is_empty()))
}

/// Parse one `Link` header value into (uri, rel) pairs.
///
/// Handles the common form `<uri>; rel="nextPage", <uri>; rel="lastPage"`.
fn parse_link_header(value: &str) -> Vec<(String, String)> {
    value
        .split(',')
        .filter_map(|segment| {
            let start = segment.find('<')?;
            let end = segment.find('>')?;
            let uri = segment.get(start + 1..end)?.trim().to_string();
            let rel = segment[end + 1..].split(';').find_map(|param| {
                let (key, val) = param.split_once('=')?;
                (key.trim() == "rel").then(|| val.trim().trim_matches('"').to_string())
            })?;
            Some((uri, rel))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn next_page_link(cursor: &str) -> String {
        format!("<https://vcd.example.com/cloudapi/1.0.0/nat/rules?cursor={cursor}>; rel=\"nextPage\"; model=\"EdgeNatRules\"")
    }

    /// A fake endpoint serving `pages` pages of `per_page` numbered records
    struct FakeEndpoint {
        pages: u32,
        per_page: u32,
        calls: AtomicU32,
    }

    impl FakeEndpoint {
        fn new(pages: u32, per_page: u32) -> Self {
            Self {
                pages,
                per_page,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl PagedEndpoint for FakeEndpoint {
        type Item = String;

        async fn fetch(
            &self,
            _page_size: u32,
            cursor: Option<&str>,
        ) -> Result<PageResponse<String>, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let page: u32 = cursor.map_or(0, |c| c.parse().unwrap());
            if page >= self.pages {
                // zero-result page with no continuation link
                return Ok(PageResponse::default());
            }
            let values = (0..self.per_page)
                .map(|i| format!("record-{}-{}", page, i))
                .collect();
            let link_headers = if page + 1 < self.pages {
                vec![next_page_link(&(page + 1).to_string())]
            } else {
                vec![]
            };
            Ok(PageResponse {
                values,
                link_headers,
            })
        }
    }

    /// Story: a lister backed by N pages terminates after exactly N calls
    /// and yields every record
    #[rstest::rstest]
    #[case(1)]
    #[case(3)]
    #[case(7)]
    #[tokio::test]
    async fn story_pagination_terminates_and_is_complete(#[case] pages: u32) {
        let endpoint = FakeEndpoint::new(pages, 4);
        let items = list_all(&endpoint, 4).await.unwrap();
        assert_eq!(items.len(), (pages * 4) as usize);
        assert_eq!(endpoint.calls.load(Ordering::SeqCst), pages);
        assert_eq!(items[0], "record-0-0");
        assert_eq!(items.last().unwrap(), &format!("record-{}-3", pages - 1));
    }

    /// Story: an empty result set is one call, zero records, no error
    #[tokio::test]
    async fn story_zero_pages_is_a_single_empty_call() {
        let endpoint = FakeEndpoint::new(0, 4);
        let items = list_all(&endpoint, 128).await.unwrap();
        assert!(items.is_empty());
        assert_eq!(endpoint.calls.load(Ordering::SeqCst), 1);
    }

    /// Story: a mid-enumeration failure propagates instead of truncating
    struct FailingEndpoint;

    #[async_trait]
    impl PagedEndpoint for FailingEndpoint {
        type Item = String;

        async fn fetch(
            &self,
            _page_size: u32,
            cursor: Option<&str>,
        ) -> Result<PageResponse<String>, Error> {
            match cursor {
                None => Ok(PageResponse {
                    values: vec!["first".into()],
                    link_headers: vec![next_page_link("2")],
                }),
                Some(_) => Err(Error::vcd("listing failed: 502 Bad Gateway")),
            }
        }
    }

    #[tokio::test]
    async fn story_fetch_error_propagates() {
        let err = list_all(&FailingEndpoint, 128).await.unwrap_err();
        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn next_cursor_extracts_the_next_page_cursor() {
        let headers = vec![
            "<https://vcd.example.com/x?cursor=prev1>; rel=\"prevPage\"".to_string(),
            next_page_link("abc%3D%3D"),
        ];
        assert_eq!(next_cursor(&headers).unwrap().as_deref(), Some("abc=="));
    }

    #[test]
    fn next_cursor_absent_relation_means_no_more_pages() {
        assert_eq!(next_cursor(&[]).unwrap(), None);
        let headers = vec!["<https://vcd.example.com/x?cursor=z>; rel=\"lastPage\"".to_string()];
        assert_eq!(next_cursor(&headers).unwrap(), None);
    }

    #[test]
    fn next_cursor_missing_or_empty_parameter_means_no_more_pages() {
        let headers = vec!["<https://vcd.example.com/x?page=2>; rel=\"nextPage\"".to_string()];
        assert_eq!(next_cursor(&headers).unwrap(), None);

        let headers = vec!["<https://vcd.example.com/x?cursor=>; rel=\"nextPage\"".to_string()];
        assert_eq!(next_cursor(&headers).unwrap(), None);
    }

    #[test]
    fn next_cursor_malformed_uri_is_an_error() {
        let headers = vec!["<::not a uri::>; rel=\"nextPage\"".to_string()];
        let err = next_cursor(&headers).unwrap_err();
        assert!(err.to_string().contains("cursor URI"));
    }

    #[test]
    fn link_header_with_multiple_relations_in_one_value() {
        let combined = format!(
            "<https://vcd.example.com/x?cursor=a>; rel=\"lastPage\", {}",
            next_page_link("b")
        );
        assert_eq!(next_cursor(&[combined]).unwrap().as_deref(), Some("b"));
    }
}
