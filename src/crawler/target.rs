use crate::url::{directory_base, page_param, page_url};
use crate::UrlResult;
use url::Url;

/// One paginated directory to harvest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Directory URL without query; pages are `base_url?page=N`
    pub base_url: Url,

    /// Affiliated domains wanted from this directory
    pub quota: u32,

    /// First page to request
    pub start_page: u32,
}

impl Target {
    /// Builds a target from a raw directory URL
    ///
    /// When `start_page` is None the page is taken from a `page=N` query
    /// parameter on `url`, defaulting to 1.
    pub fn new(url: &str, quota: u32, start_page: Option<u32>) -> UrlResult<Self> {
        let base_url = directory_base(url)?;
        let start_page = start_page.or_else(|| page_param(url)).unwrap_or(1).max(1);

        Ok(Self {
            base_url,
            quota,
            start_page,
        })
    }

    /// URL of directory page `page`
    pub fn page_url(&self, page: u32) -> String {
        page_url(&self.base_url, page)
    }

    /// Short label used in logs and reports
    pub fn label(&self) -> &str {
        self.base_url.as_str()
    }
}
