use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::debug;
use url::Url;

/// One entry of a site's navigation sidebar. Two links are the same page
/// only when both the URL and the title match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Link {
    pub url: String,
    pub title: String,
}

/// Extracts internal links from the sidebar of a page, in document order.
///
/// A link is kept when its href resolves against `base_url` to the same
/// host and the resolved URL is prefixed by the base URL. Fragments are
/// stripped, archive downloads (anything with "zip" in the URL) are
/// skipped, and duplicates by `(url, title)` keep their first occurrence.
/// A page without a sidebar yields an empty list.
pub fn extract_internal_links(base_url: &Url, html: &str) -> Vec<Link> {
    let document = Html::parse_document(html);
    let sidebar_selector = Selector::parse("div.sidebar").unwrap();
    let anchor_selector = Selector::parse("a[href]").unwrap();

    let mut links = Vec::new();
    let mut seen = HashSet::new();

    let Some(sidebar) = document.select(&sidebar_selector).next() else {
        debug!("No sidebar found for {}", base_url);
        return links;
    };

    for anchor in sidebar.select(&anchor_selector) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Ok(mut resolved) = base_url.join(href) else {
            continue;
        };
        if resolved.host_str() != base_url.host_str() {
            continue;
        }
        resolved.set_fragment(None);

        let url = resolved.to_string();
        if !url.starts_with(base_url.as_str()) || url.contains("zip") {
            continue;
        }

        let text = anchor.text().collect::<String>().trim().to_string();
        let title = if text.is_empty() { url.clone() } else { text };

        let link = Link { url, title };
        if seen.insert(link.clone()) {
            links.push(link);
        }
    }

    debug!("Collected {} unique sidebar links", links.len());
    links
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://third-bit.com/sdxpy/").unwrap()
    }

    #[test]
    fn keeps_internal_sidebar_links_in_order() {
        let html = r#"
            <html><body>
            <div class="sidebar">
              <a href="intro/">Introduction</a>
              <a href="parse/">Parsing</a>
            </div>
            <a href="outside/">Outside the sidebar</a>
            </body></html>"#;

        let links = extract_internal_links(&base(), html);
        assert_eq!(
            links,
            vec![
                Link {
                    url: "https://third-bit.com/sdxpy/intro/".to_string(),
                    title: "Introduction".to_string(),
                },
                Link {
                    url: "https://third-bit.com/sdxpy/parse/".to_string(),
                    title: "Parsing".to_string(),
                },
            ]
        );
    }

    #[test]
    fn skips_zip_offsite_and_non_prefixed_links() {
        let html = r#"
            <div class="sidebar">
              <a href="intro/">Introduction</a>
              <a href="sdxpy-examples.zip">Examples</a>
              <a href="https://example.com/other/">Elsewhere</a>
              <a href="/other-book/">Other book</a>
            </div>"#;

        let links = extract_internal_links(&base(), html);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].title, "Introduction");
    }

    #[test]
    fn strips_fragments_and_deduplicates() {
        let html = r#"
            <div class="sidebar">
              <a href="intro/">Introduction</a>
              <a href="/sdxpy/intro/#head">Introduction</a>
              <a href="intro/">Introduction</a>
            </div>"#;

        let links = extract_internal_links(&base(), html);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "https://third-bit.com/sdxpy/intro/");
    }

    #[test]
    fn same_url_with_different_title_is_a_distinct_link() {
        let html = r#"
            <div class="sidebar">
              <a href="intro/">Introduction</a>
              <a href="intro/">1. Introduction</a>
            </div>"#;

        let links = extract_internal_links(&base(), html);
        assert_eq!(links.len(), 2);
    }

    #[test]
    fn empty_anchor_text_falls_back_to_url() {
        let html = r#"<div class="sidebar"><a href="data/"> </a></div>"#;

        let links = extract_internal_links(&base(), html);
        assert_eq!(links[0].title, "https://third-bit.com/sdxpy/data/");
    }

    #[test]
    fn missing_sidebar_yields_empty_list() {
        let html = "<html><body><a href=\"intro/\">Introduction</a></body></html>";
        assert!(extract_internal_links(&base(), html).is_empty());
    }
}
