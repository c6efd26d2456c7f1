//! HTML text and metadata extraction with `scraper`.

use std::sync::LazyLock;

use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

use super::{ExtractError, ExtractedMetadata, Extraction, TextExtractor};

/// Subtrees whose text never reaches the body
const SKIPPED_TAGS: &[&str] = &["script", "style", "nav", "footer", "noscript", "head"];

// Hardcoded selectors are parsed once; a parse failure is a programming error.
static CONTENT_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("h1, h2, h3, h4, h5, h6, p")
        .expect("BUG: hardcoded CSS selector 'h1..h6, p' is invalid")
});

static HEADING_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("h1, h2, h3, h4, h5, h6")
        .expect("BUG: hardcoded CSS selector 'h1..h6' is invalid")
});

static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("BUG: hardcoded CSS selector 'title' is invalid"));

static BODY_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("BUG: hardcoded CSS selector 'body' is invalid"));

static HTML_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("html").expect("BUG: hardcoded CSS selector 'html' is invalid"));

static TIME_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("time[datetime]").expect("BUG: hardcoded CSS selector 'time[datetime]' is invalid")
});

static CANONICAL_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("link[rel='canonical']")
        .expect("BUG: hardcoded CSS selector 'link[rel=canonical]' is invalid")
});

/// Extracts headings and paragraphs from HTML documents
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlExtractor;

/// True when any ancestor tag name is one of `SKIPPED_TAGS`
fn inside_skipped<'a>(mut ancestor_tags: impl Iterator<Item = Option<&'a str>>) -> bool {
    ancestor_tags.any(|tag| tag.is_some_and(|name| SKIPPED_TAGS.contains(&name)))
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text nodes are concatenated as-is so inline markup adds no spacing
fn element_text(element: ElementRef<'_>) -> String {
    normalize(&element.text().collect::<String>())
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .map(element_text)
        .find(|text| !text.is_empty())
}

/// `content` of the first `<meta>` whose `attr` equals `value`
fn meta_content(document: &Html, attr: &str, value: &str) -> Option<String> {
    let selector = Selector::parse(&format!("meta[{attr}='{value}']")).ok()?;
    document
        .select(&selector)
        .filter_map(|e| e.value().attr("content"))
        .map(normalize)
        .find(|content| !content.is_empty())
}

fn body_text(document: &Html) -> String {
    let blocks: Vec<String> = document
        .select(&CONTENT_SELECTOR)
        .filter(|element| {
            !inside_skipped(
                element
                    .ancestors()
                    .map(|a| a.value().as_element().map(|e| e.name())),
            )
        })
        .map(element_text)
        .filter(|text| !text.is_empty())
        .collect();
    if !blocks.is_empty() {
        return blocks.join("\n\n");
    }

    // No headings or paragraphs: take every visible text node of the body
    let Some(body) = document.select(&BODY_SELECTOR).next() else {
        return String::new();
    };
    let mut parts = Vec::new();
    for node in body.descendants() {
        if let Node::Text(text) = node.value() {
            let trimmed = text.trim();
            let skipped =
                inside_skipped(node.ancestors().map(|a| a.value().as_element().map(|e| e.name())));
            if !trimmed.is_empty() && !skipped {
                parts.push(trimmed.to_string());
            }
        }
    }
    normalize(&parts.join(" "))
}

fn extract_metadata(document: &Html) -> ExtractedMetadata {
    let keywords = meta_content(document, "name", "keywords")
        .map(|raw| {
            raw.split(',')
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let published_at = meta_content(document, "property", "article:published_time")
        .or_else(|| meta_content(document, "name", "date"))
        .or_else(|| {
            document
                .select(&TIME_SELECTOR)
                .filter_map(|e| e.value().attr("datetime"))
                .map(str::trim)
                .find(|v| !v.is_empty())
                .map(str::to_string)
        });

    ExtractedMetadata {
        description: meta_content(document, "name", "description")
            .or_else(|| meta_content(document, "property", "og:description")),
        keywords,
        author: meta_content(document, "name", "author"),
        site_name: meta_content(document, "property", "og:site_name"),
        language: document
            .select(&HTML_SELECTOR)
            .next()
            .and_then(|e| e.value().attr("lang"))
            .map(|lang| lang.trim().to_string())
            .filter(|lang| !lang.is_empty()),
        published_at,
        canonical_url: document
            .select(&CANONICAL_SELECTOR)
            .next()
            .and_then(|e| e.value().attr("href"))
            .map(str::to_string),
        ..ExtractedMetadata::default()
    }
}

impl TextExtractor for HtmlExtractor {
    fn extract(&self, raw: &[u8]) -> Result<Extraction, ExtractError> {
        let source = String::from_utf8_lossy(raw);
        let document = Html::parse_document(&source);

        let title = first_text(&document, &TITLE_SELECTOR)
            .or_else(|| meta_content(&document, "property", "og:title"))
            .or_else(|| first_text(&document, &HEADING_SELECTOR))
            .unwrap_or_default();

        Ok(Extraction {
            title,
            body_text: body_text(&document),
            metadata: extract_metadata(&document),
            error: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <title> UAE fintech   licensing </title>
  <meta name="description" content="Regulators update rules">
  <meta name="keywords" content="Fintech, Regulation, ">
  <meta property="og:site_name" content="Gulf Wire">
  <meta property="article:published_time" content="2024-03-01T09:00:00Z">
  <link rel="canonical" href="https://gulfwire.example/fintech">
  <script>var tracking = "ignored";</script>
</head>
<body>
  <nav><p>Home | About</p></nav>
  <h1>New licensing regime</h1>
  <p>The central bank published new rules.</p>
  <div><script>console.log("no")</script><p>Applications open in <b>May</b>.</p></div>
  <footer><p>Copyright</p></footer>
</body>
</html>"#;

    #[test]
    fn test_extracts_title_body_and_metadata() {
        let extraction = HtmlExtractor.extract(PAGE.as_bytes()).expect("extract");
        assert_eq!(extraction.title, "UAE fintech licensing");
        assert_eq!(
            extraction.body_text,
            "New licensing regime\n\nThe central bank published new rules.\n\nApplications open in May."
        );
        assert!(!extraction.body_text.contains("Home"));
        assert!(!extraction.body_text.contains("Copyright"));

        let meta = extraction.metadata;
        assert_eq!(meta.description.as_deref(), Some("Regulators update rules"));
        assert_eq!(meta.keywords, vec!["Fintech", "Regulation"]);
        assert_eq!(meta.site_name.as_deref(), Some("Gulf Wire"));
        assert_eq!(meta.language.as_deref(), Some("en"));
        assert_eq!(meta.published_at.as_deref(), Some("2024-03-01T09:00:00Z"));
        assert_eq!(meta.canonical_url.as_deref(), Some("https://gulfwire.example/fintech"));
    }

    #[test]
    fn test_inline_markup_keeps_punctuation_attached() {
        let page = "<html><body><p>Shares of <a href=\"/acme\">Acme</a>, up <em>4%</em>, led <b>gains</b>.</p></body></html>";
        let extraction = HtmlExtractor.extract(page.as_bytes()).expect("extract");
        assert_eq!(extraction.body_text, "Shares of Acme, up 4%, led gains.");
    }

    #[test]
    fn test_title_falls_back_to_og_then_heading() {
        let og = r#"<html><head><meta property="og:title" content="From OG"></head><body><h2>Head</h2></body></html>"#;
        assert_eq!(HtmlExtractor.extract(og.as_bytes()).expect("extract").title, "From OG");

        let heading = "<html><body><h2>Only heading</h2></body></html>";
        assert_eq!(
            HtmlExtractor.extract(heading.as_bytes()).expect("extract").title,
            "Only heading"
        );
    }

    #[test]
    fn test_body_fallback_without_paragraphs() {
        let page = "<html><body><div>Loose <span>text</span></div><script>x()</script></body></html>";
        let extraction = HtmlExtractor.extract(page.as_bytes()).expect("extract");
        assert_eq!(extraction.body_text, "Loose text");
        assert_eq!(extraction.title, "");
    }

    #[test]
    fn test_time_element_publish_date() {
        let page = r#"<html><body><p>x</p><time datetime="2024-05-02">May 2</time></body></html>"#;
        let extraction = HtmlExtractor.extract(page.as_bytes()).expect("extract");
        assert_eq!(extraction.metadata.published_at.as_deref(), Some("2024-05-02"));
    }
}
