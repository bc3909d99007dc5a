//! Loader adapters: turn a batch description into [`Document`]s.
//!
//! A [`SourceBatch`] names what the caller submitted. It is split into
//! ingestion units, each backed by one [`DocumentLoader`]:
//!
//! | Batch | Units |
//! |-------|-------|
//! | [`SourceBatch::Urls`] | one [`UrlLoader`] for all URLs |
//! | [`SourceBatch::Pdfs`] | one [`PdfLoader`] per file |
//! | [`SourceBatch::Documents`] | one unit per pre-loaded document |
//!
//! Every produced document carries a non-empty `source` metadata value.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use scraper::{Html, Selector};

use crate::config::LoaderConfig;
use crate::error::{RagError, Result};
use crate::models::Document;

pub const MIME_PDF: &str = "application/pdf";

/// Elements whose text never reaches the document body.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// An uploaded PDF: the original filename plus its raw bytes.
#[derive(Debug, Clone)]
pub struct PdfUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl PdfUpload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    /// Read a PDF from disk, naming it by its file name.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(filename, bytes))
    }
}

/// What the caller submitted for one ingestion batch.
#[derive(Debug, Clone)]
pub enum SourceBatch {
    Urls(Vec<String>),
    Pdfs(Vec<PdfUpload>),
    /// Documents already in memory (plain-text files, tests).
    Documents(Vec<Document>),
}

impl SourceBatch {
    /// Reject empty batches and URL batches over the configured limit.
    pub fn validate(&self, config: &LoaderConfig) -> Result<()> {
        match self {
            SourceBatch::Urls(urls) => {
                let given = urls.iter().filter(|u| !u.trim().is_empty()).count();
                if given == 0 {
                    return Err(RagError::NoInput);
                }
                if given > config.max_urls {
                    return Err(RagError::TooManyUrls {
                        given,
                        max: config.max_urls,
                    });
                }
            }
            SourceBatch::Pdfs(files) if files.is_empty() => return Err(RagError::NoInput),
            SourceBatch::Documents(docs) if docs.is_empty() => return Err(RagError::NoInput),
            _ => {}
        }
        Ok(())
    }

    /// Validate, then build one loader per ingestion unit.
    pub fn into_units(self, config: &LoaderConfig) -> Result<Vec<Box<dyn DocumentLoader>>> {
        self.validate(config)?;

        let units: Vec<Box<dyn DocumentLoader>> = match self {
            SourceBatch::Urls(urls) => {
                let urls = urls
                    .into_iter()
                    .map(|u| u.trim().to_string())
                    .filter(|u| !u.is_empty())
                    .collect();
                vec![Box::new(UrlLoader::new(urls, config)?) as Box<dyn DocumentLoader>]
            }
            SourceBatch::Pdfs(files) => files
                .into_iter()
                .map(|file| Box::new(PdfLoader::new(file)) as Box<dyn DocumentLoader>)
                .collect(),
            SourceBatch::Documents(docs) => docs
                .into_iter()
                .map(|doc| Box::new(StaticLoader(doc)) as Box<dyn DocumentLoader>)
                .collect(),
        };
        Ok(units)
    }
}

/// Produces the documents of one ingestion unit.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Short human-readable label for logs.
    fn describe(&self) -> String;

    async fn load(&self) -> Result<Vec<Document>>;
}

// ============ URLs ============

/// Fetches web pages and strips them down to their visible text.
pub struct UrlLoader {
    urls: Vec<String>,
    skip_failed: bool,
    client: reqwest::Client,
}

impl UrlLoader {
    pub fn new(urls: Vec<String>, config: &LoaderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| RagError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            urls,
            skip_failed: config.skip_failed_urls,
            client,
        })
    }

    async fn fetch(&self, url: &str) -> Result<Document> {
        let parsed = reqwest::Url::parse(url).map_err(|e| RagError::fetch(url, e))?;
        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| RagError::fetch(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RagError::fetch(url, format!("HTTP {}", status)));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        let body = response.text().await.map_err(|e| RagError::fetch(url, e))?;

        let is_html = content_type.contains("html")
            || (content_type.is_empty() && body.trim_start().starts_with('<'));

        let doc = if is_html {
            html_to_document(&body, url)
        } else {
            Document::new(body, url)
        };
        Ok(doc)
    }
}

#[async_trait]
impl DocumentLoader for UrlLoader {
    fn describe(&self) -> String {
        self.urls.join(", ")
    }

    async fn load(&self) -> Result<Vec<Document>> {
        let mut docs = Vec::with_capacity(self.urls.len());
        let mut last_err = None;

        for url in &self.urls {
            match self.fetch(url).await {
                Ok(doc) => {
                    tracing::debug!(url = %url, chars = doc.text.len(), "fetched");
                    docs.push(doc);
                }
                Err(e) if self.skip_failed => {
                    tracing::warn!(url = %url, error = %e, "skipping URL");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        match (docs.is_empty(), last_err) {
            (true, Some(e)) => Err(e),
            _ => Ok(docs),
        }
    }
}

/// Convert an HTML page into a document: visible text nodes, trimmed and
/// joined by newlines, plus `title`, `description` and `language` metadata
/// when the page declares them.
pub fn html_to_document(html: &str, source: &str) -> Document {
    let page = Html::parse_document(html);
    let root = page.root_element();

    let mut lines: Vec<&str> = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let skipped = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|el| SKIPPED_ELEMENTS.contains(&el.name()))
                .unwrap_or(false)
        });
        let trimmed = text.trim();
        if !skipped && !trimmed.is_empty() {
            lines.push(trimmed);
        }
    }

    let mut doc = Document::new(lines.join("\n"), source);

    if let Some(title) = first_match(&page, "title").map(|el| el.text().collect::<String>()) {
        if !title.trim().is_empty() {
            doc = doc.with_metadata("title", title.trim());
        }
    }
    if let Some(description) =
        first_match(&page, r#"meta[name="description"]"#).and_then(|el| el.value().attr("content"))
    {
        doc = doc.with_metadata("description", description.trim());
    }
    if let Some(lang) = root.value().attr("lang") {
        doc = doc.with_metadata("language", lang);
    }
    doc
}

fn first_match<'a>(page: &'a Html, css: &str) -> Option<scraper::ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    page.select(&selector).next()
}

// ============ PDFs ============

/// Extracts the text of one uploaded PDF into a single document.
pub struct PdfLoader {
    filename: String,
    bytes: Arc<[u8]>,
}

impl PdfLoader {
    pub fn new(upload: PdfUpload) -> Self {
        Self {
            filename: upload.filename,
            bytes: upload.bytes.into(),
        }
    }
}

#[async_trait]
impl DocumentLoader for PdfLoader {
    fn describe(&self) -> String {
        self.filename.clone()
    }

    async fn load(&self) -> Result<Vec<Document>> {
        if self.filename.trim().is_empty() {
            return Err(RagError::extraction("<unnamed>", "uploaded file has no name"));
        }

        let bytes = Arc::clone(&self.bytes);
        let text = tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem(&bytes).map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| RagError::extraction(&self.filename, e))?
        .map_err(|e| RagError::extraction(&self.filename, e))?;

        if text.trim().is_empty() {
            return Err(RagError::extraction(&self.filename, "no extractable text"));
        }

        Ok(vec![Document::new(text, &self.filename).with_metadata("content_type", MIME_PDF)])
    }
}

// ============ Pre-loaded documents ============

struct StaticLoader(Document);

#[async_trait]
impl DocumentLoader for StaticLoader {
    fn describe(&self) -> String {
        self.0.source().unwrap_or("<document>").to_string()
    }

    async fn load(&self) -> Result<Vec<Document>> {
        if self.0.source().is_none() {
            return Err(RagError::extraction("<document>", "document has no source"));
        }
        Ok(vec![self.0.clone()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LoaderConfig {
        LoaderConfig::default()
    }

    #[test]
    fn html_text_skips_scripts_and_styles() {
        let html = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <title> Mortgage Rates </title>
  <meta name="description" content="Weekly rate update">
  <style>body { color: red; }</style>
  <script>var tracking = 1;</script>
</head>
<body>
  <h1>Rates rise</h1>
  <p>The 30-year rate is <b>6.8%</b>.</p>
  <noscript>Enable JavaScript</noscript>
</body>
</html>"#;
        let doc = html_to_document(html, "https://example.com/rates");

        assert_eq!(doc.source(), Some("https://example.com/rates"));
        assert!(doc.text.contains("Rates rise"));
        assert!(doc.text.contains("The 30-year rate is\n6.8%\n."));
        assert!(!doc.text.contains("tracking"));
        assert!(!doc.text.contains("color: red"));
        assert!(!doc.text.contains("Enable JavaScript"));
        assert_eq!(doc.metadata.get("title").map(String::as_str), Some("Mortgage Rates"));
        assert_eq!(
            doc.metadata.get("description").map(String::as_str),
            Some("Weekly rate update")
        );
        assert_eq!(doc.metadata.get("language").map(String::as_str), Some("en"));
    }

    #[test]
    fn url_batches_are_bounded() {
        let urls = |n: usize| {
            SourceBatch::Urls((0..n).map(|i| format!("https://e.com/{}", i)).collect())
        };

        assert!(urls(3).validate(&config()).is_ok());
        assert!(matches!(
            urls(4).validate(&config()),
            Err(RagError::TooManyUrls { given: 4, max: 3 })
        ));
        assert!(matches!(urls(0).validate(&config()), Err(RagError::NoInput)));
        assert!(matches!(
            SourceBatch::Urls(vec!["  ".into()]).validate(&config()),
            Err(RagError::NoInput)
        ));
    }

    #[test]
    fn units_per_batch_kind() {
        let urls = SourceBatch::Urls(vec!["https://a.com".into(), "https://b.com".into()]);
        assert_eq!(urls.into_units(&config()).unwrap().len(), 1);

        let pdfs = SourceBatch::Pdfs(vec![
            PdfUpload::new("a.pdf", vec![]),
            PdfUpload::new("b.pdf", vec![]),
        ]);
        let units = pdfs.into_units(&config()).unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(units[1].describe(), "b.pdf");

        assert!(matches!(
            SourceBatch::Pdfs(vec![]).into_units(&config()),
            Err(RagError::NoInput)
        ));
    }

    #[tokio::test]
    async fn invalid_pdf_is_extraction_error() {
        let loader = PdfLoader::new(PdfUpload::new("broken.pdf", b"not a pdf".to_vec()));
        match loader.load().await {
            Err(RagError::Extraction { filename, .. }) => assert_eq!(filename, "broken.pdf"),
            other => panic!("expected extraction error, got {:?}", other.map(|d| d.len())),
        }
    }

    #[tokio::test]
    async fn malformed_url_is_fetch_error() {
        let loader = UrlLoader::new(vec!["not a url".into()], &config()).unwrap();
        assert!(matches!(loader.load().await, Err(RagError::Fetch { .. })));
    }

    #[tokio::test]
    async fn documents_without_source_are_rejected() {
        let units = SourceBatch::Documents(vec![Document::new("text", "")])
            .into_units(&config())
            .unwrap();
        assert!(matches!(
            units[0].load().await,
            Err(RagError::Extraction { .. })
        ));
    }
}
