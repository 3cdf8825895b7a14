//! `webscraper` sources: one document per element matching a CSS selector.

use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};

use crate::error::ReadError;
use crate::models::Document;
use crate::reader::DocumentReader;
use crate::sources::SourceKind;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub struct WebPageReader {
    url: String,
    text_selector: String,
}

impl WebPageReader {
    pub fn new(url: String, text_selector: String) -> Self {
        Self { url, text_selector }
    }

    fn selector(&self) -> Result<Selector, ReadError> {
        Selector::parse(&self.text_selector).map_err(|e| ReadError::InvalidSelector {
            selector: self.text_selector.clone(),
            message: e.to_string(),
        })
    }

    async fn fetch(&self) -> Result<String, ReadError> {
        let request_error = |e: reqwest::Error| ReadError::Request {
            url: self.url.clone(),
            message: e.to_string(),
        };

        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(request_error)?;
        let resp = client.get(&self.url).send().await.map_err(request_error)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ReadError::FetchFailed {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }
        resp.text().await.map_err(request_error)
    }
}

/// Trimmed text of every element matching `selector`, in document order.
fn select_texts(html: &str, selector: &Selector) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .collect()
}

#[async_trait]
impl DocumentReader for WebPageReader {
    fn kind(&self) -> SourceKind {
        SourceKind::WebPage
    }

    fn origin(&self) -> String {
        self.url.clone()
    }

    async fn load(&self) -> Result<Vec<Document>, ReadError> {
        // Selector and parsed DOM are not held across the fetch.
        self.selector()?;
        let body = self.fetch().await?;
        let selector = self.selector()?;

        let docs: Vec<Document> = select_texts(&body, &selector)
            .into_iter()
            .map(|text| Document::new(text).with_meta("source", self.url.as_str()))
            .collect();

        tracing::debug!(url = %self.url, matched = docs.len(), "scraped page");
        Ok(docs)
    }
}
