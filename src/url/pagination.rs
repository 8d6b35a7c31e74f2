use crate::UrlError;
use url::Url;

/// Name of the query parameter that selects a directory page
pub const PAGE_PARAM: &str = "page";

/// Parses a directory URL into the base URL that pages are built from
///
/// A missing scheme defaults to `https://`. The query string and fragment are
/// dropped; pagination is always expressed through [`page_url`].
///
/// # Examples
///
/// ```
/// use mx_harvest::url::directory_base;
///
/// let base = directory_base("example.com/dir?page=3").unwrap();
/// assert_eq!(base.as_str(), "https://example.com/dir");
/// ```
pub fn directory_base(raw: &str) -> Result<Url, UrlError> {
    let trimmed = raw.trim();
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let mut url = Url::parse(&with_scheme).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingDomain);
    }

    url.set_query(None);
    url.set_fragment(None);

    Ok(url)
}

/// Builds the URL of one directory page: `base?page=N`
pub fn page_url(base: &Url, page: u32) -> String {
    let mut url = base.clone();
    url.set_query(None);
    url.query_pairs_mut()
        .append_pair(PAGE_PARAM, &page.to_string());
    url.to_string()
}

/// Extracts the `page=N` query parameter from a raw directory URL
///
/// Returns None when the parameter is absent or not a positive integer.
pub fn page_param(raw: &str) -> Option<u32> {
    let query = raw.split_once('?')?.1;
    let query = query.split('#').next().unwrap_or_default();

    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == PAGE_PARAM)
        .and_then(|(_, value)| value.parse::<u32>().ok())
        .filter(|page| *page >= 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_base_adds_scheme() {
        let base = directory_base("example.com/dir").unwrap();
        assert_eq!(base.as_str(), "https://example.com/dir");
    }

    #[test]
    fn test_directory_base_drops_query() {
        let base = directory_base("https://example.com/dir.html?page=4&x=1#frag").unwrap();
        assert_eq!(base.as_str(), "https://example.com/dir.html");
    }

    #[test]
    fn test_directory_base_rejects_other_schemes() {
        let result = directory_base("ftp://example.com/dir");
        assert!(matches!(result, Err(UrlError::InvalidScheme(_))));
    }

    #[test]
    fn test_directory_base_rejects_garbage() {
        assert!(directory_base("http://").is_err());
        assert!(directory_base("https://exa mple.com").is_err());
    }

    #[test]
    fn test_page_url() {
        let base = directory_base("https://example.com/dir").unwrap();
        assert_eq!(page_url(&base, 1), "https://example.com/dir?page=1");
        assert_eq!(page_url(&base, 12), "https://example.com/dir?page=12");
    }

    #[test]
    fn test_page_param() {
        assert_eq!(page_param("https://example.com/dir?page=3"), Some(3));
        assert_eq!(page_param("https://example.com/dir?x=1&page=7#top"), Some(7));
        assert_eq!(page_param("https://example.com/dir"), None);
        assert_eq!(page_param("https://example.com/dir?page=0"), None);
        assert_eq!(page_param("https://example.com/dir?page=abc"), None);
    }
}
