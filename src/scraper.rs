//! Product page extraction.
//!
//! Turns an arbitrary marketplace product URL into structured
//! title/image/price data despite inconsistent, site-specific markup.
//! Generic metadata (Open Graph, Twitter cards, schema.org) is tried
//! first; the per-marketplace selector registry covers the rest.

use reqwest::StatusCode;
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderName, HeaderValue, REFERER, USER_AGENT,
};
use scraper::{Html, Selector};
use thiserror::Error;

use crate::config::ScraperConfig;
use crate::sites::SiteRegistry;
use crate::utils::error::AppError;

const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

// Sentinels for pages that yield no usable title or image. A partial
// scrape is still a valid result.
const UNKNOWN_PRODUCT: &str = "Produto Desconhecido";
const PLACEHOLDER_IMAGE: &str = "https://placehold.co/600x400?text=Sem+Imagem";

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("request failed: {0}")]
    Fetch(#[source] reqwest::Error),

    #[error("site returned status {0}")]
    BadStatus(u16),

    #[error("failed to parse page: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedProduct {
    pub name: String,
    pub image_url: String,
    /// 0.0 when no price could be located; the caller decides what that
    /// means (the monitor skips the write, it is not an error here).
    pub price: f64,
}

pub struct PageExtractor {
    client: reqwest::Client,
    registry: SiteRegistry,
    og_title: Selector,
    og_image: Selector,
    twitter_image: Selector,
    title: Selector,
    meta_price: Selector,
}

impl PageExtractor {
    pub fn new(config: &ScraperConfig, registry: SiteRegistry) -> crate::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, header_value(&config.user_agent)?);
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers.insert(ACCEPT_LANGUAGE, header_value(&config.accept_language)?);
        headers.insert(REFERER, header_value(&config.referer)?);
        headers.insert(
            HeaderName::from_static("upgrade-insecure-requests"),
            HeaderValue::from_static("1"),
        );

        // The target marketplaces routinely serve misconfigured certificate
        // chains; permissive TLS is a deliberate trade-off.
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout))
            .danger_accept_invalid_certs(true)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            registry,
            og_title: selector(r#"meta[property="og:title"]"#)?,
            og_image: selector(r#"meta[property="og:image"]"#)?,
            twitter_image: selector(r#"meta[name="twitter:image"]"#)?,
            title: selector("title")?,
            meta_price: selector(r#"meta[itemprop="price"]"#)?,
        })
    }

    /// Fetch one product page and derive (title, image, price).
    pub async fn extract(&self, url: &str) -> Result<ScrapedProduct, ScrapeError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(ScrapeError::Fetch)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ScrapeError::BadStatus(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ScrapeError::Parse(e.to_string()))?;

        Ok(self.parse_page(url, &body))
    }

    /// Derive structured data from an already-fetched body. Total: every
    /// missing field resolves to a sentinel or 0.0 rather than an error.
    pub fn parse_page(&self, url: &str, body: &str) -> ScrapedProduct {
        let document = Html::parse_document(body);

        let name = self
            .meta_content(&document, &self.og_title)
            .or_else(|| {
                document
                    .select(&self.title)
                    .next()
                    .map(|el| el.text().collect::<String>().trim().to_string())
                    .filter(|t| !t.is_empty())
            })
            .unwrap_or_else(|| UNKNOWN_PRODUCT.to_string());

        let image_url = self
            .meta_content(&document, &self.og_image)
            .or_else(|| self.meta_content(&document, &self.twitter_image))
            .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string());

        let mut price = self
            .meta_content(&document, &self.meta_price)
            .and_then(|raw| raw.parse::<f64>().ok())
            .unwrap_or(0.0);

        if price == 0.0 {
            let host = url::Url::parse(url)
                .ok()
                .and_then(|u| u.host_str().map(str::to_string))
                .unwrap_or_default();
            price = self.registry.price_for(&host, &document);
        }

        ScrapedProduct {
            name,
            image_url,
            price,
        }
    }

    fn meta_content(&self, document: &Html, sel: &Selector) -> Option<String> {
        document
            .select(sel)
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

fn header_value(raw: &str) -> crate::Result<HeaderValue> {
    HeaderValue::from_str(raw)
        .map_err(|_| AppError::Validation(format!("header value not ASCII: {raw:?}")))
}

fn selector(raw: &str) -> crate::Result<Selector> {
    Selector::parse(raw).map_err(|e| AppError::Internal(format!("invalid selector {raw}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_extractor() -> PageExtractor {
        let config = ScraperConfig {
            request_timeout: 15,
            user_agent: "TestAgent/1.0".to_string(),
            accept_language: "pt-BR,pt;q=0.9,en-US;q=0.8,en;q=0.7".to_string(),
            referer: "https://www.google.com/".to_string(),
        };
        PageExtractor::new(&config, SiteRegistry::brazilian_marketplaces()).unwrap()
    }

    #[test]
    fn test_og_title_wins_over_document_title() {
        let html = r#"<html><head>
            <meta property="og:title" content="Mouse Gamer X"/>
            <title>Loja | Mouse</title>
        </head><body></body></html>"#;
        let result = test_extractor().parse_page("https://shop.example.com/p/1", html);
        assert_eq!(result.name, "Mouse Gamer X");
    }

    #[test]
    fn test_document_title_fallback_is_trimmed() {
        let html = "<html><head><title>  Monitor 27\"  </title></head><body></body></html>";
        let result = test_extractor().parse_page("https://shop.example.com/p/1", html);
        assert_eq!(result.name, "Monitor 27\"");
    }

    #[test]
    fn test_missing_title_yields_sentinel() {
        let html = "<html><head></head><body><p>nothing here</p></body></html>";
        let result = test_extractor().parse_page("https://shop.example.com/p/1", html);
        assert_eq!(result.name, UNKNOWN_PRODUCT);
    }

    #[test]
    fn test_twitter_image_fallback() {
        // Page with only a twitter:image tag: the returned image must be
        // the twitter tag's value.
        let html = r#"<html><head>
            <meta name="twitter:image" content="https://cdn.example.com/tw.jpg"/>
        </head><body></body></html>"#;
        let result = test_extractor().parse_page("https://shop.example.com/p/1", html);
        assert_eq!(result.image_url, "https://cdn.example.com/tw.jpg");
    }

    #[test]
    fn test_og_image_preferred() {
        let html = r#"<html><head>
            <meta property="og:image" content="https://cdn.example.com/og.jpg"/>
            <meta name="twitter:image" content="https://cdn.example.com/tw.jpg"/>
        </head><body></body></html>"#;
        let result = test_extractor().parse_page("https://shop.example.com/p/1", html);
        assert_eq!(result.image_url, "https://cdn.example.com/og.jpg");
    }

    #[test]
    fn test_missing_image_yields_placeholder() {
        let html = "<html><head><title>x</title></head><body></body></html>";
        let result = test_extractor().parse_page("https://shop.example.com/p/1", html);
        assert_eq!(result.image_url, PLACEHOLDER_IMAGE);
    }

    #[test]
    fn test_schema_org_price_is_direct() {
        let html = r#"<html><head>
            <meta itemprop="price" content="1549.90"/>
        </head><body></body></html>"#;
        let result = test_extractor().parse_page("https://shop.example.com/p/1", html);
        assert_eq!(result.price, 1549.90);
    }

    #[test]
    fn test_site_rule_price_when_meta_absent() {
        let html = r#"<html><body>
            <span class="andes-money-amount__fraction">2.199</span>
        </body></html>"#;
        let result = test_extractor().parse_page(
            "https://produto.mercadolivre.com.br/MLB-123",
            html,
        );
        assert_eq!(result.price, 2199.0);
    }

    #[test]
    fn test_unresolved_price_is_partial_result_not_error() {
        let html = r#"<html><head><title>Produto Raro</title></head>
            <body><p>consulte o preço</p></body></html>"#;
        let result = test_extractor().parse_page("https://shop.example.com/p/1", html);
        assert_eq!(result.name, "Produto Raro");
        assert_eq!(result.price, 0.0);
    }

    #[test]
    fn test_unparseable_url_still_extracts_metadata() {
        let html = r#"<html><head>
            <meta property="og:title" content="SSD 1TB"/>
        </head><body></body></html>"#;
        let result = test_extractor().parse_page("not a url", html);
        assert_eq!(result.name, "SSD 1TB");
        assert_eq!(result.price, 0.0);
    }
}
