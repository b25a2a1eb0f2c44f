use anyhow::{Context, Result};
use colored::*;
use std::path::Path;
use tracing::{error, info, warn};
use url::Url;

use crate::assembler::BookAssembler;
use crate::extractor::{self, Link};
use crate::fetch;
use crate::renderer::Renderer;

/// The sites this tool exists for, with their output filenames.
pub const TARGET_SITES: [(&str, &str); 2] = [
    ("https://third-bit.com/sdxpy/", "sdxpy.pdf"),
    ("https://third-bit.com/sdxjs/", "sdxjs.pdf"),
];

/// Builds one book per target site, strictly in sequence. A failure in
/// one site is logged at this boundary and never stops the next site.
pub async fn run(renderer: &Renderer) {
    for (base_url, output_name) in TARGET_SITES {
        info!("Processing website: {}", base_url.green());
        if let Err(e) = process_site(renderer, base_url, output_name).await {
            error!(
                "An error occurred while processing {}: {:#}",
                base_url.green(),
                e
            );
        }
        info!("Finished processing {}", base_url.green());
    }
}

async fn process_site(renderer: &Renderer, base_url: &str, output_name: &str) -> Result<()> {
    let base = Url::parse(base_url).with_context(|| format!("Invalid base URL {}", base_url))?;

    let root_html = match fetch::fetch_html(base_url).await {
        Ok(html) => html,
        Err(e) => {
            warn!(
                "Failed to fetch root HTML from {}: {:#}, skipping site",
                base_url.green(),
                e
            );
            return Ok(());
        }
    };

    let links = extractor::extract_internal_links(&base, &root_html);
    let pages = build_page_list(&base, links);
    info!("Found {} pages to process", pages.len());

    let mut assembler = BookAssembler::new();
    let total = pages.len();

    for (i, link) in pages.iter().enumerate() {
        info!("Processing page {}/{}: {}", i + 1, total, link.url.green());

        let pdf_bytes = match renderer.render(&link.url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to render PDF for {}: {:#}", link.url.green(), e);
                continue;
            }
        };

        match assembler.append_chapter(&link.title, &pdf_bytes) {
            Ok(()) => info!("Added page: {}", link.title),
            Err(e) => warn!("Failed to append '{}': {:#}", link.title, e),
        }
    }

    let output_path = Path::new(output_name);
    if assembler.finish(output_path).await? {
        info!(
            "Successfully created: {}",
            output_path.display().to_string().blue()
        );
    } else {
        warn!(
            "No pages were rendered for {}, skipping {}",
            base_url.green(),
            output_name
        );
    }

    Ok(())
}

/// The full crawl order: the home page first, then the sidebar links with
/// any literal duplicate of the base URL dropped.
fn build_page_list(base_url: &Url, links: Vec<Link>) -> Vec<Link> {
    let base = base_url.to_string();
    let mut pages = vec![Link {
        url: base.clone(),
        title: "Home".to_string(),
    }];
    pages.extend(links.into_iter().filter(|link| link.url != base));
    pages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn home_comes_first_and_zip_links_are_excluded() {
        let base = Url::parse("https://third-bit.com/sdxpy/").unwrap();
        let html = r#"
            <div class="sidebar">
              <a href="https://third-bit.com/sdxpy/">Software Design by Example</a>
              <a href="oop/">A: Objects</a>
              <a href="parse/">B: Parsing</a>
              <a href="sdxpy-all.zip">C: Everything</a>
            </div>"#;

        let links = extractor::extract_internal_links(&base, html);
        let pages = build_page_list(&base, links);

        let titles: Vec<&str> = pages.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["Home", "A: Objects", "B: Parsing"]);
        assert_eq!(pages[0].url, base.as_str());
    }

    #[test]
    fn home_is_prepended_even_when_nothing_was_extracted() {
        let base = Url::parse("https://third-bit.com/sdxjs/").unwrap();
        let pages = build_page_list(&base, Vec::new());

        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].title, "Home");
    }
}
