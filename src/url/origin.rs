use url::{Origin, Url};

/// Returns the origin (scheme, host, port) of a URL string
///
/// Unparseable input yields `None`. URLs without a tuple origin
/// (`mailto:`, `data:`, ...) yield an opaque origin, which is never equal to
/// any other origin.
///
/// # Examples
///
/// ```
/// use site2graph::url::origin_of;
///
/// let a = origin_of("http://example.com/about").unwrap();
/// let b = origin_of("http://EXAMPLE.com:80/").unwrap();
/// assert_eq!(a, b);
///
/// let c = origin_of("https://example.com/").unwrap();
/// assert_ne!(a, c);
/// ```
pub fn origin_of(url: &str) -> Option<Origin> {
    Url::parse(url).ok().map(|u| u.origin())
}

/// Returns true if `url` parses and shares `origin`
pub fn is_same_origin(url: &str, origin: &Origin) -> bool {
    origin_of(url).is_some_and(|o| o.is_tuple() && &o == origin)
}
