//! Localized price normalization and the per-marketplace selector registry.
//!
//! Marketplaces in the target ecosystem render prices as free text in
//! Brazilian locale ("R$ 1.234,56") under site-specific markup. The
//! registry maps a host pattern to an ordered list of CSS selectors to
//! probe; every hit goes through [`normalize_price`].

use scraper::{Html, Selector};
use tracing::debug;

/// Convert a localized price fragment into a number. Never fails:
/// unparseable input yields 0.0.
///
/// The source locale uses `.` as the thousands separator and `,` as the
/// decimal separator. Strip the former, convert the latter, then drop
/// whatever is left over (currency sign, whitespace, stray markup text).
pub fn normalize_price(raw: &str) -> f64 {
    let cleaned: String = raw
        .replace('.', "")
        .replace(',', ".")
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    cleaned.parse().unwrap_or(0.0)
}

/// One marketplace's extraction rule: a case-insensitive substring to
/// match against the URL host, and CSS selectors probed in priority order
/// (primary first, then fallbacks).
#[derive(Debug, Clone)]
pub struct SiteRule {
    pub host: &'static str,
    pub selectors: &'static [&'static str],
}

/// Ordered rule table. New sites are added by appending a rule; no
/// branching logic is involved in dispatch.
#[derive(Debug, Clone)]
pub struct SiteRegistry {
    rules: Vec<SiteRule>,
}

impl Default for SiteRegistry {
    fn default() -> Self {
        Self::brazilian_marketplaces()
    }
}

impl SiteRegistry {
    pub fn new(rules: Vec<SiteRule>) -> Self {
        Self { rules }
    }

    /// The marketplaces the service ships rules for.
    pub fn brazilian_marketplaces() -> Self {
        Self::new(vec![
            SiteRule {
                host: "mercadolivre.com.br",
                selectors: &[".andes-money-amount__fraction", ".price-tag-fraction"],
            },
            SiteRule {
                host: "amazon.com.br",
                selectors: &[".a-price-whole", "#priceblock_ourprice"],
            },
            SiteRule {
                host: "kabum.com.br",
                selectors: &[".finalPrice", ".priceCard"],
            },
        ])
    }

    /// Resolve a price from the document using the first rule whose host
    /// pattern matches. Returns 0.0 when no rule matches or every probe
    /// comes up empty; the caller treats that as "no price", not an error.
    pub fn price_for(&self, host: &str, document: &Html) -> f64 {
        let host = host.to_lowercase();
        for rule in self.rules.iter().filter(|r| host.contains(r.host)) {
            for raw_selector in rule.selectors {
                let Ok(selector) = Selector::parse(raw_selector) else {
                    debug!(selector = raw_selector, "skipping unparseable selector");
                    continue;
                };
                if let Some(element) = document.select(&selector).next() {
                    let text = element.text().collect::<Vec<_>>().join(" ");
                    let price = normalize_price(&text);
                    if price > 0.0 {
                        return price;
                    }
                }
            }
        }
        0.0
    }
}
