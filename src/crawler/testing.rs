//! Scripted collaborators shared by the crawler and egress tests

use crate::classify::{LookupError, MxResolver};
use crate::crawler::fetcher::{FetchError, FetchedPage, PageFetcher};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

pub(crate) const DIR: &str = "https://dir.test/dir";
pub(crate) const PATTERN: &str = "/business-directory/company-profiles.";
pub(crate) const SELECTOR: &str = "a#hero-company-link";

pub(crate) fn page(n: u32) -> String {
    format!("{}?page={}", DIR, n)
}

pub(crate) fn entity_url(name: &str) -> String {
    format!("https://dir.test/business-directory/company-profiles.{}.html", name)
}

pub(crate) fn directory_html(names: &[&str]) -> String {
    let links: String = names
        .iter()
        .map(|name| {
            format!(
                r#"<li><a href="/business-directory/company-profiles.{}.html">{}</a></li>"#,
                name, name
            )
        })
        .collect();
    format!("<html><body><ul>{}</ul><a href=\"/about\">About</a></body></html>", links)
}

pub(crate) fn entity_html(website: &str) -> String {
    format!(
        r#"<html><body><h1>Company</h1><a id="hero-company-link" href="https://www.{}/">Website</a></body></html>"#,
        website
    )
}

/// Fetcher answering from per-URL scripts; the last answer of a script repeats
#[derive(Default)]
pub(crate) struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, VecDeque<Result<String, FetchError>>>>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn script(self, url: impl Into<String>, answers: Vec<Result<String, FetchError>>) -> Self {
        self.scripts.lock().unwrap().insert(url.into(), answers.into());
        self
    }

    pub(crate) fn html(self, url: impl Into<String>, html: String) -> Self {
        self.script(url, vec![Ok(html)])
    }

    /// Adds a directory page plus one entity page per `(name, website)`
    pub(crate) fn directory(mut self, n: u32, entities: &[(&str, &str)]) -> Self {
        let names: Vec<&str> = entities.iter().map(|(name, _)| *name).collect();
        self = self.html(page(n), directory_html(&names));
        for (name, website) in entities {
            self = self.html(entity_url(name), entity_html(website));
        }
        self
    }

    pub(crate) fn requests_for(&self, url: &str) -> usize {
        self.requests.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    pub(crate) fn total_requests(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<FetchedPage, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());

        let mut scripts = self.scripts.lock().unwrap();
        let answer = match scripts.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap(),
            None => Err(FetchError::Status(404)),
        };

        answer.map(|html| FetchedPage {
            html,
            final_url: url.to_string(),
        })
    }
}

/// Resolver with fixed answers; unknown domains do not exist
#[derive(Default)]
pub(crate) struct StaticResolver {
    answers: HashMap<String, Result<Vec<String>, LookupError>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl StaticResolver {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn mx(mut self, domain: &str, exchanges: &[&str]) -> Self {
        self.answers.insert(
            domain.to_string(),
            Ok(exchanges.iter().map(|e| e.to_string()).collect()),
        );
        self
    }

    pub(crate) fn failing(mut self, domain: &str, error: LookupError) -> Self {
        self.answers.insert(domain.to_string(), Err(error));
        self
    }

    pub(crate) fn calls_for(&self, domain: &str) -> usize {
        self.calls.lock().unwrap().get(domain).copied().unwrap_or(0)
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl MxResolver for StaticResolver {
    async fn mx_exchanges(&self, domain: &str) -> Result<Vec<String>, LookupError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(domain.to_string())
            .or_default() += 1;

        tokio::task::yield_now().await;

        self.answers
            .get(domain)
            .cloned()
            .unwrap_or(Err(LookupError::NxDomain))
    }
}
