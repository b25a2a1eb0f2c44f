use anyhow::{anyhow, bail, Context, Result};
use chromiumoxide::cdp::browser_protocol::network::{Headers, SetExtraHttpHeadersParams};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use colored::*;
use futures_util::StreamExt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::fs;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

const SIDEBAR_OVERRIDE_CSS: &str =
    ".sidebar { display: none !important; visibility: hidden !important; }";

/// How long a navigated page gets to settle before printing.
const RENDER_SETTLE: Duration = Duration::from_millis(500);

/// The one style-override file shared by every render call. It hides the
/// sidebar so the navigation does not repeat on every chapter. Created
/// before any site is processed and removed on drop, on every exit path.
pub struct StyleOverride {
    file: NamedTempFile,
}

impl StyleOverride {
    pub fn create() -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("sdxbook-")
            .suffix(".css")
            .tempfile()
            .context("Failed to create style override file")?;
        file.write_all(SIDEBAR_OVERRIDE_CSS.as_bytes())
            .context("Failed to write style override file")?;

        info!(
            "Created style override: {}",
            file.path().display().to_string().blue()
        );
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

impl Drop for StyleOverride {
    fn drop(&mut self) {
        debug!("Removing style override: {}", self.file.path().display());
    }
}

#[derive(Debug, Clone)]
pub struct PdfOptions {
    pub scale: f64,
    pub margin_top: f64,
    pub margin_right: f64,
    pub margin_bottom: f64,
    pub margin_left: f64,
    pub print_background: bool,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            scale: 0.75,
            margin_top: 0.0,
            margin_right: 0.0,
            margin_bottom: 0.0,
            margin_left: 0.0,
            print_background: true,
        }
    }
}

/// Renders single pages to PDF byte blobs with headless Chrome.
pub struct Renderer {
    browser: Browser,
    handler: JoinHandle<()>,
    style_path: PathBuf,
    pdf_options: PdfOptions,
}

impl Renderer {
    /// Launches the browser. This doubles as the startup check for the
    /// rendering dependency: a failure here aborts the run before any
    /// site is processed.
    pub async fn launch(style: &StyleOverride) -> Result<Self> {
        let config = BrowserConfig::builder()
            .window_size(1920, 1080)
            .arg("--allow-file-access-from-files")
            .build()
            .map_err(|e| anyhow!("Failed to create browser config: {}", e))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| anyhow!("Failed to launch browser (is Chrome installed?): {}", e))?;

        let handle = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if let Err(err) = h {
                    // Only log if it's not a common websocket deserialization error
                    let err_str = err.to_string();
                    if !err_str.contains("data did not match any variant")
                        && !err_str.contains("untagged enum Message")
                    {
                        error!("Browser handler error: {}", err);
                    } else {
                        debug!("Chrome protocol message ignored: {}", err);
                    }
                }
            }
        });

        Ok(Self {
            browser,
            handler: handle,
            style_path: style.path().to_path_buf(),
            pdf_options: PdfOptions::default(),
        })
    }

    /// Renders one URL to PDF bytes. Any failure means the caller skips
    /// the page; the crawl itself continues.
    pub async fn render(&self, url: &str) -> Result<Vec<u8>> {
        validate_page_url(url)?;

        info!("Rendering PDF for {}", url.green());

        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| anyhow!("Failed to create new page: {}", e))?;

        let result = self.render_page(&page, url).await;
        page.close().await.ok();
        result
    }

    async fn render_page(&self, page: &Page, url: &str) -> Result<Vec<u8>> {
        // The sites gate embedded assets on the referer.
        let headers = Headers::new(serde_json::json!({ "Referer": url }));
        page.execute(SetExtraHttpHeadersParams::new(headers))
            .await
            .map_err(|e| anyhow!("Failed to set referer for {}: {}", url, e))?;

        page.goto(url)
            .await
            .map_err(|e| anyhow!("Failed to navigate to {}: {}", url, e))?;

        page.wait_for_navigation()
            .await
            .map_err(|e| anyhow!("Failed to wait for navigation: {}", e))?;

        self.apply_style_override(page).await?;

        tokio::time::sleep(RENDER_SETTLE).await;

        let params = PrintToPdfParams {
            scale: Some(self.pdf_options.scale),
            margin_top: Some(self.pdf_options.margin_top),
            margin_right: Some(self.pdf_options.margin_right),
            margin_bottom: Some(self.pdf_options.margin_bottom),
            margin_left: Some(self.pdf_options.margin_left),
            print_background: Some(self.pdf_options.print_background),
            ..Default::default()
        };

        page.pdf(params)
            .await
            .map_err(|e| anyhow!("Failed to generate PDF for {}: {}", url, e))
    }

    /// Re-reads the shared override file and injects it as a style
    /// element, forcing UTF-8 when the document carries no charset.
    async fn apply_style_override(&self, page: &Page) -> Result<()> {
        let css = fs::read_to_string(&self.style_path).await.with_context(|| {
            format!(
                "Failed to read style override {}",
                self.style_path.display()
            )
        })?;

        let js = format!(
            r#"(() => {{
                if (!document.querySelector('meta[charset]')) {{
                    const meta = document.createElement('meta');
                    meta.setAttribute('charset', 'utf-8');
                    document.head.prepend(meta);
                }}
                const style = document.createElement('style');
                style.textContent = {css};
                document.head.appendChild(style);
            }})()"#,
            css = serde_json::to_string(&css).context("Failed to encode style override")?,
        );

        page.evaluate(js)
            .await
            .map_err(|e| anyhow!("Failed to inject style override: {}", e))?;

        Ok(())
    }

    pub async fn close(mut self) {
        self.browser.close().await.ok();
        self.handler.abort();
    }
}

/// An empty page URL is an input error: rendering is never attempted.
fn validate_page_url(url: &str) -> Result<()> {
    if url.trim().is_empty() {
        bail!("Page URL is empty");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_page_url_is_rejected_before_rendering() {
        assert!(validate_page_url("").is_err());
        assert!(validate_page_url("   ").is_err());
    }

    #[test]
    fn normal_page_url_passes_validation() {
        assert!(validate_page_url("https://third-bit.com/sdxpy/").is_ok());
    }

    #[test]
    fn style_override_exists_while_held_and_is_removed_on_drop() {
        let style = StyleOverride::create().unwrap();
        let path = style.path().to_path_buf();

        assert!(path.exists());
        let css = std::fs::read_to_string(&path).unwrap();
        assert!(css.contains(".sidebar"));
        assert!(css.contains("display: none"));

        drop(style);
        assert!(!path.exists());
    }
}
