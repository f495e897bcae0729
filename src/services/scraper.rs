// src/services/scraper.rs

//! Product scraper service.
//!
//! Fetches a listing page and extracts products using the site's CSS
//! selectors. HTML parsing runs on the blocking pool.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Product, ProductSelectors, ScraperConfig, SiteConfig};
use crate::services::ProductSource;
use crate::utils::{http, last_path_segment, parse_price, resolve_url};

/// Service for scraping products from a static listing page.
pub struct ProductScraper {
    client: Client,
}

impl ProductScraper {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Create a scraper with a client built from configuration.
    pub fn from_config(config: &ScraperConfig) -> Result<Self> {
        Ok(Self::new(http::create_scraper_client(config)?))
    }

    /// Fetch the raw listing page.
    async fn fetch_page(&self, site: &SiteConfig) -> Result<String> {
        log::info!("Fetching {}", site.url);
        let response = self
            .client
            .get(&site.url)
            .timeout(Duration::from_millis(site.wait_timeout))
            .send()
            .await
            .map_err(|e| AppError::acquisition(&site.name, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::acquisition(
                &site.name,
                format!("HTTP {} from {}", status, site.url),
            ));
        }

        response
            .text()
            .await
            .map_err(|e| AppError::acquisition(&site.name, e))
    }

    /// Extract every product from a listing page.
    ///
    /// Fails if `wait_for_selector` matches nothing. Cards missing a link,
    /// sku, title, or price are skipped.
    pub fn extract_products(site: &SiteConfig, html: &str) -> Result<Vec<Product>> {
        let document = Html::parse_document(html);

        let ready_sel = parse_selector(&site.wait_for_selector)?;
        if document.select(&ready_sel).next().is_none() {
            return Err(AppError::acquisition(
                &site.name,
                format!("expected content '{}' not found", site.wait_for_selector),
            ));
        }

        let selectors = CompiledSelectors::compile(&site.selectors)?;
        let base_url = Url::parse(&site.url)?;

        let mut products = Vec::new();
        let mut skipped = 0;
        for card in document.select(&selectors.container) {
            match selectors.extract(&card, &base_url) {
                Some(product) => products.push(product),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            log::warn!("Skipped {} product cards with missing fields", skipped);
        }
        log::debug!("Extracted {} products from {}", products.len(), site.url);
        Ok(products)
    }
}

#[async_trait]
impl ProductSource for ProductScraper {
    async fn scrape(&self, site: &SiteConfig) -> Result<Vec<Product>> {
        let html = self.fetch_page(site).await?;

        let owned = site.clone();
        let products =
            tokio::task::spawn_blocking(move || Self::extract_products(&owned, &html))
                .await
                .map_err(|e| AppError::acquisition(&site.name, format!("parser task failed: {e}")))??;

        log::info!("Successfully scraped {} products", products.len());
        Ok(products)
    }
}

/// Selectors parsed once per page.
struct CompiledSelectors<'a> {
    container: Selector,
    url: Selector,
    title: Selector,
    prices: Vec<Selector>,
    original_price: Option<Selector>,
    image: Option<Selector>,
    discount: Option<Selector>,
    sku_attribute: &'a str,
}

impl<'a> CompiledSelectors<'a> {
    fn compile(selectors: &'a ProductSelectors) -> Result<Self> {
        let optional = |s: &Option<String>| s.as_deref().map(parse_selector).transpose();

        let mut prices = vec![parse_selector(&selectors.price)?];
        for fallback in &selectors.price_fallbacks {
            prices.push(parse_selector(fallback)?);
        }

        Ok(Self {
            container: parse_selector(&selectors.product_container)?,
            url: parse_selector(&selectors.url)?,
            title: parse_selector(&selectors.title)?,
            prices,
            original_price: optional(&selectors.original_price)?,
            image: optional(&selectors.image)?,
            discount: optional(&selectors.discount)?,
            sku_attribute: &selectors.sku_attribute,
        })
    }

    fn extract(&self, card: &ElementRef, base_url: &Url) -> Option<Product> {
        let link_elem = card.select(&self.url).next()?;
        let href = link_elem.value().attr("href")?;
        let url = resolve_url(base_url, href);

        let sku = link_elem
            .value()
            .attr(self.sku_attribute)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| last_path_segment(&url));
        let Some(sku) = sku else {
            log::warn!("No sku found for product at {}", url);
            return None;
        };

        let title = card.select(&self.title).next().map(element_text)?;
        if title.is_empty() {
            return None;
        }

        let price = self.prices.iter().find_map(|sel| {
            card.select(sel)
                .next()
                .and_then(|el| parse_price(&element_text(el)))
        });
        let Some(price) = price else {
            log::warn!("Could not extract price for {}", title);
            return None;
        };

        let original_price = self
            .original_price
            .as_ref()
            .and_then(|sel| card.select(sel).next())
            .and_then(|el| parse_price(&element_text(el)));

        let image = self
            .image
            .as_ref()
            .and_then(|sel| card.select(sel).next())
            .and_then(|el| el.value().attr("src").or_else(|| el.value().attr("data-src")))
            .map(|src| resolve_url(base_url, src))
            .unwrap_or_default();

        let discount = self
            .discount
            .as_ref()
            .and_then(|sel| card.select(sel).next())
            .map(element_text)
            .filter(|text| !text.is_empty());

        Some(Product {
            sku,
            title,
            price,
            original_price,
            url,
            image,
            discount,
        })
    }
}

fn element_text(element: ElementRef) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}
