//! Source loaders: PDF files and web pages → [`Document`].
//!
//! | Source | Backend | Pages |
//! |--------|---------|-------|
//! | PDF file | `pdf-extract`, one [`Page`] per PDF page, numbered from 0 | many |
//! | `http(s)://` HTML | `reqwest` + `scraper` | one, unnumbered |
//! | `http(s)://` `text/*` | `reqwest`, body as-is | one, unnumbered |
//! | `http(s)://` PDF | `reqwest` + `pdf-extract` | many |
//!
//! Every failure to read or fetch a source is a
//! [`RagError::SourceFetch`] naming the path or URL.

use scraper::{ElementRef, Html, Node, Selector};
use std::path::Path;
use std::time::Duration;

use crate::config::LoaderConfig;
use crate::error::{RagError, Result};
use crate::models::{Document, Page};

/// Elements whose text never reaches the index.
const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "svg", "head"];

/// Elements that end a paragraph of extracted text.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "main", "aside", "header", "footer", "nav", "h1", "h2",
    "h3", "h4", "h5", "h6", "li", "ul", "ol", "table", "tr", "blockquote", "pre", "figure",
    "figcaption", "dl", "dt", "dd",
];

/// Load a PDF from disk, one page per PDF page.
pub async fn load_pdf(path: &Path) -> Result<Document> {
    let source = path.display().to_string();
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| RagError::source_fetch(&source, e))?;
    let pages = pdf_pages(&source, bytes).await?;
    Ok(Document {
        source,
        title: None,
        pages,
    })
}

/// Fetch a web page (or a remote PDF) and turn it into a document.
pub async fn load_url(url: &str, config: &LoaderConfig) -> Result<Document> {
    let parsed = validate_url(url)?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(concat!("research-assistant/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| RagError::config(format!("failed to build HTTP client: {}", e)))?;

    let mut response = client
        .get(parsed)
        .send()
        .await
        .map_err(|e| RagError::source_fetch(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(RagError::source_fetch(url, format!("HTTP {}", status)));
    }

    let content_type_header = response.headers().get(reqwest::header::CONTENT_TYPE).cloned();
    let content_type = content_type_header
        .as_ref()
        .and_then(|v| v.to_str().ok())
        .unwrap_or("text/html")
        .to_ascii_lowercase();

    if let Some(len) = response.content_length() {
        if len as usize > config.max_bytes {
            return Err(RagError::source_fetch(
                url,
                format!("response of {} bytes exceeds limit of {}", len, config.max_bytes),
            ));
        }
    }
    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| RagError::source_fetch(url, e))?
    {
        if body.len() + chunk.len() > config.max_bytes {
            return Err(RagError::source_fetch(
                url,
                format!("response exceeds limit of {} bytes", config.max_bytes),
            ));
        }
        body.extend_from_slice(&chunk);
    }

    if content_type.starts_with("application/pdf") {
        let pages = pdf_pages(url, body).await?;
        return Ok(Document {
            source: url.to_string(),
            title: None,
            pages,
        });
    }

    let bytes = body.len();
    let (title, text) = if content_type.contains("html") || content_type.contains("xml") {
        html_to_text(&decode_text(url, body, content_type_header).await?)
    } else if content_type.starts_with("text/") {
        (None, decode_text(url, body, content_type_header).await?)
    } else {
        return Err(RagError::source_fetch(
            url,
            format!("unsupported content type: {}", content_type),
        ));
    };

    tracing::debug!(url, bytes, chars = text.len(), "fetched page");
    Ok(Document {
        source: url.to_string(),
        title,
        pages: vec![Page { number: None, text }],
    })
}

/// Decode a capped body using the charset named in `Content-Type`,
/// falling back to UTF-8.
async fn decode_text(
    url: &str,
    body: Vec<u8>,
    content_type: Option<reqwest::header::HeaderValue>,
) -> Result<String> {
    let mut buffered = axum::http::Response::new(body);
    if let Some(value) = content_type {
        buffered
            .headers_mut()
            .insert(reqwest::header::CONTENT_TYPE, value);
    }
    reqwest::Response::from(buffered)
        .text()
        .await
        .map_err(|e| RagError::source_fetch(url, e))
}

/// Parse `url` and require an `http` or `https` scheme.
pub fn validate_url(url: &str) -> Result<reqwest::Url> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| RagError::validation(format!("invalid url '{}': {}", url, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(RagError::validation(format!(
            "unsupported url scheme '{}': only http and https are allowed",
            parsed.scheme()
        )));
    }
    Ok(parsed)
}

/// Extract text page by page. `pdf-extract` can panic on malformed files,
/// so parsing runs on a blocking thread and a panic is reported as a load
/// failure of that source.
async fn pdf_pages(source: &str, bytes: Vec<u8>) -> Result<Vec<Page>> {
    let texts = tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text_from_mem_by_pages(&bytes)
    })
    .await
    .map_err(|_| RagError::source_fetch(source, "PDF parser crashed on this file"))?
    .map_err(|e| RagError::source_fetch(source, format!("invalid PDF: {}", e)))?;

    Ok(texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| Page {
            number: Some(i as u32),
            text,
        })
        .collect())
}

/// Visible text of an HTML document plus its `<title>`.
///
/// Block elements become paragraphs separated by a blank line, `<br>`
/// becomes a newline, runs of whitespace collapse to one space.
pub fn html_to_text(html: &str) -> (Option<String>, String) {
    let document = Html::parse_document(html);

    let title = Selector::parse("title").ok().and_then(|sel| {
        document
            .select(&sel)
            .next()
            .map(|t| collapse_spaces(&t.text().collect::<String>()))
            .filter(|t| !t.is_empty())
    });

    let mut raw = String::new();
    walk(document.root_element(), &mut raw);
    (title, normalize(&raw))
}

fn walk(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let tag = el.name();
                if SKIPPED_TAGS.contains(&tag) {
                    continue;
                }
                if tag == "br" {
                    out.push('\n');
                    continue;
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    let block = BLOCK_TAGS.contains(&tag);
                    if block {
                        out.push_str("\n\n");
                    }
                    walk(child_el, out);
                    if block {
                        out.push_str("\n\n");
                    } else if matches!(tag, "td" | "th") {
                        out.push(' ');
                    }
                }
            }
            _ => {}
        }
    }
}

fn collapse_spaces(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse whitespace per line; one blank line between paragraphs.
fn normalize(raw: &str) -> String {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current: Vec<String> = Vec::new();

    for line in raw.split('\n') {
        let line = collapse_spaces(line);
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n"));
    }
    paragraphs.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf_fixture::pdf_with_pages;

    #[tokio::test]
    async fn test_load_pdf_numbers_pages_from_zero() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("paper.pdf");
        std::fs::write(
            &path,
            pdf_with_pages(&["first page words", "second page words", "third page words"]),
        )
        .unwrap();

        let doc = load_pdf(&path).await.unwrap();
        assert_eq!(doc.source, path.display().to_string());
        assert_eq!(doc.pages.len(), 3);
        assert_eq!(doc.pages[0].number, Some(0));
        assert_eq!(doc.pages[2].number, Some(2));
        assert!(doc.pages[2].text.contains("third page words"));
    }

    #[tokio::test]
    async fn test_missing_file_is_source_fetch() {
        let err = load_pdf(Path::new("/nonexistent/paper.pdf")).await.unwrap_err();
        assert!(matches!(err, RagError::SourceFetch { .. }));
    }

    #[tokio::test]
    async fn test_corrupt_pdf_is_source_fetch() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf").unwrap();
        let err = load_pdf(&path).await.unwrap_err();
        assert!(matches!(err, RagError::SourceFetch { .. }));
    }

    #[tokio::test]
    async fn test_non_http_url_is_validation_error() {
        let config = LoaderConfig::default();
        for url in ["ftp://example.com/file", "file:///etc/passwd", "not a url"] {
            let err = load_url(url, &config).await.unwrap_err();
            assert!(matches!(err, RagError::Validation(_)), "{}", url);
        }
    }

    #[tokio::test]
    async fn test_unreachable_url_is_source_fetch() {
        // Port 9 (discard) on localhost is reliably closed in test environments
        let err = load_url("http://127.0.0.1:9/page", &LoaderConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::SourceFetch { .. }));
    }

    #[test]
    fn test_html_to_text_drops_scripts_and_keeps_title() {
        let html = r#"<html><head><title> Rust  Ownership </title>
            <style>body { color: red; }</style></head>
            <body><h1>Ownership</h1><script>var x = 1;</script>
            <p>Each value has   an owner.</p><p>Borrowing<br>is checked.</p>
            <noscript>enable js</noscript></body></html>"#;
        let (title, text) = html_to_text(html);
        assert_eq!(title.as_deref(), Some("Rust Ownership"));
        assert_eq!(text, "Ownership\n\nEach value has an owner.\n\nBorrowing\nis checked.");
    }

    #[tokio::test]
    async fn test_decode_text_honors_charset() {
        let latin1 = b"caf\xe9 cr\xe8me".to_vec();
        let header = reqwest::header::HeaderValue::from_static("text/plain; charset=iso-8859-1");
        let text = decode_text("http://x.example", latin1, Some(header)).await.unwrap();
        assert_eq!(text, "caf\u{e9} cr\u{e8}me");

        let utf8 = "caf\u{e9}".as_bytes().to_vec();
        assert_eq!(decode_text("http://x.example", utf8, None).await.unwrap(), "caf\u{e9}");
    }

    #[test]
    fn test_html_without_title() {
        let (title, text) = html_to_text("<p>plain</p>");
        assert!(title.is_none());
        assert_eq!(text, "plain");
    }
}
