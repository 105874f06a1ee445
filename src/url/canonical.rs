use crate::UrlError;
use url::Url;

/// Canonicalizes a URL into the key used to detect repeat requests
///
/// # Canonicalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Require an `http` or `https` scheme and a host
/// 3. Lowercase scheme and host, drop default ports, resolve dot segments
///    (all handled by the URL parser)
/// 4. Remove the fragment
/// 5. Sort query pairs by key, then value; drop an empty query string
///
/// Two URLs with the same canonical form address the same resource as far as
/// the crawl is concerned, so only the first of them is fetched.
///
/// # Examples
///
/// ```
/// use site2graph::url::canonicalize_url;
///
/// let key = canonicalize_url("HTTP://Example.COM:80/a/../b?z=1&a=2#top").unwrap();
/// assert_eq!(key, "http://example.com/b?a=2&z=1");
/// ```
pub fn canonicalize_url(url_str: &str) -> Result<String, UrlError> {
    let mut url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    url.set_fragment(None);

    if url.query().is_some() {
        let mut pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if pairs.is_empty() {
            url.set_query(None);
        } else {
            pairs.sort();
            url.query_pairs_mut().clear().extend_pairs(pairs);
        }
    }

    Ok(url.into())
}
