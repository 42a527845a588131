//! Site Adapter — pure I/O + HTML parsing. No persistence, no per-job state.
//! One adapter instance per (base URL, HTTP client).

pub mod cities;
pub mod http;
pub mod selectors;

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html};
use std::sync::OnceLock;
use url::Url;

use crate::domain::{Business, Coordinates};
use crate::error::{AppError, Result};
use http::{create_client, rotate_user_agent, ClientType};

#[derive(Debug, Clone)]
pub struct City {
    pub name: String,
    pub url: String,
    pub business_count: i64,
}

/// What the scheduler needs from a site: discover cities, list business
/// URLs on a listing page, extract one business's detail record. Modeled as
/// a trait so the supervisor can be tested against a fake implementation.
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    async fn cities(&self) -> Result<Vec<City>>;
    async fn listings(&self, city_url: &str, page: i64) -> Result<(Vec<String>, bool)>;
    async fn details(&self, url: &str) -> Result<Option<Business>>;
}

/// Adapter for the Yellow-Pages-style schema this spec targets.
pub struct YelloAdapter {
    client: rquest::Client,
    base_url: String,
    domain: String,
    canonical_domain: String,
}

impl YelloAdapter {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        let client = create_client(ClientType::HeavyEmulation)
            .map_err(|e| AppError::network(e.to_string()))?;
        let domain = base_url
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/')
            .to_string();
        let canonical_domain = crate::domain::canonicalize(&base_url);
        Ok(Self {
            client,
            base_url,
            domain,
            canonical_domain,
        })
    }

    async fn get_html(&self, url: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", rotate_user_agent())
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            )
            .header("Accept-Language", "en-US,en;q=0.5")
            .send()
            .await
            .map_err(|e| AppError::network(e.to_string()))?;

        if !response.status().is_success() {
            tracing::debug!(url, status = %response.status(), "non-success response");
            return Ok(None);
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::network(e.to_string()))?;
        Ok(Some(body))
    }

    async fn cities_from_browse_page(&self) -> Result<Vec<City>> {
        let browse_url = format!("{}/browse-business-cities", self.base_url.trim_end_matches('/'));
        let Some(html) = self.get_html(&browse_url).await? else {
            return Ok(Vec::new());
        };
        let doc = Html::parse_document(&html);
        let base = Url::parse(&self.base_url).map_err(|e| AppError::InvalidUrl(e.to_string()))?;

        let mut cities = Vec::new();
        let city_count_re = count_regex();
        for el in doc.select(&selectors::city_links()[0]) {
            let Some(href) = el.value().attr("href") else {
                continue;
            };
            let text = el.text().collect::<String>().trim().to_string();
            if text.is_empty() {
                continue;
            }
            let Some(caps) = city_count_re.captures(&text) else {
                continue;
            };
            let name = caps[1].trim().to_string();
            let business_count = caps
                .get(2)
                .map(|m| m.as_str().replace(',', "").parse().unwrap_or(0))
                .unwrap_or(0);
            if let Ok(url) = base.join(href) {
                cities.push(City {
                    name,
                    url: url.to_string(),
                    business_count,
                });
            }
        }
        Ok(cities)
    }

    async fn cities_from_homepage(&self) -> Result<Vec<City>> {
        let Some(html) = self.get_html(&self.base_url).await? else {
            return Ok(Vec::new());
        };
        let doc = Html::parse_document(&html);
        let base = Url::parse(&self.base_url).map_err(|e| AppError::InvalidUrl(e.to_string()))?;

        for selector in selectors::city_links() {
            let mut cities = Vec::new();
            for el in doc.select(selector).take(50) {
                let (href, name) = if el.value().name() == "option" {
                    let name = el.text().collect::<String>().trim().to_string();
                    if name.is_empty()
                        || matches!(name.to_lowercase().as_str(), "all" | "select" | "choose")
                    {
                        continue;
                    }
                    (format!("/location/{}", cities::city_slug(&name)), name)
                } else {
                    let Some(href) = el.value().attr("href") else {
                        continue;
                    };
                    let name = el.text().collect::<String>().trim().to_string();
                    (href.to_string(), name)
                };
                if name.is_empty() || !href.contains("/location/") {
                    continue;
                }
                if let Ok(url) = base.join(&href) {
                    cities.push(City {
                        name,
                        url: url.to_string(),
                        business_count: 0,
                    });
                }
            }
            if !cities.is_empty() {
                return Ok(cities);
            }
        }
        Ok(Vec::new())
    }

    fn cities_from_fallback_list(&self) -> Vec<City> {
        cities::fallback_cities(&self.canonical_domain)
            .iter()
            .map(|name| City {
                name: name.to_string(),
                url: format!(
                    "{}/location/{}",
                    self.base_url.trim_end_matches('/'),
                    cities::city_slug(name)
                ),
                business_count: 0,
            })
            .collect()
    }
}

#[async_trait]
impl SiteAdapter for YelloAdapter {
    async fn cities(&self) -> Result<Vec<City>> {
        let from_browse = self.cities_from_browse_page().await?;
        if !from_browse.is_empty() {
            return Ok(from_browse);
        }
        let from_homepage = self.cities_from_homepage().await?;
        if !from_homepage.is_empty() {
            return Ok(from_homepage);
        }
        Ok(self.cities_from_fallback_list())
    }

    async fn listings(&self, city_url: &str, page: i64) -> Result<(Vec<String>, bool)> {
        let url = if page > 1 {
            format!("{}/{}", city_url.trim_end_matches('/'), page)
        } else {
            city_url.to_string()
        };

        let Some(html) = self.get_html(&url).await? else {
            return Ok((Vec::new(), false));
        };
        let doc = Html::parse_document(&html);
        let base = Url::parse(&self.base_url).map_err(|e| AppError::InvalidUrl(e.to_string()))?;

        let mut urls = Vec::new();
        for selector in selectors::business_links() {
            for el in doc.select(selector) {
                if let Some(href) = el.value().attr("href") {
                    if let Ok(u) = base.join(href) {
                        urls.push(u.to_string());
                    }
                }
            }
            if !urls.is_empty() {
                break;
            }
        }
        urls.dedup();

        let has_next = doc.select(&selectors::next_page_link()[0]).next().is_some();
        Ok((urls, has_next))
    }

    async fn details(&self, url: &str) -> Result<Option<Business>> {
        let Some(html) = self.get_html(url).await? else {
            return Ok(None);
        };
        let doc = Html::parse_document(&html);

        let title = selectors::first_nonempty_text(&doc, std::slice::from_ref(selectors::title()));
        let breadcrumb: Vec<String> = doc
            .select(selectors::breadcrumb())
            .map(|el| el.text().collect::<String>().trim().to_string())
            .collect();
        let country = breadcrumb.first().cloned();
        let city = breadcrumb.get(1).cloned();
        let category = breadcrumb.get(2).cloned();

        let name = selectors::first_nonempty_text(&doc, selectors::company_name()).or_else(|| {
            title
                .as_ref()
                .map(|t| t.split(" - ").next().unwrap_or(t).to_string())
        });

        let coordinates = extract_coordinates(&doc);

        let address = selectors::first_nonempty_text(&doc, selectors::address())
            .filter(|a| a.len() > 5 && !matches!(a.to_lowercase().as_str(), "view map" | "get directions"));

        let description = selectors::first_nonempty_text(&doc, selectors::description());

        let tags: Vec<String> = doc
            .select(&selectors::tag_links()[0])
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        let (reviews_count, rating) = extract_reviews(&doc);

        let website = doc
            .select(&selectors::website_link()[0])
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string());

        let working_hours = extract_working_hours(&doc);

        let phone = extract_contact_info(&doc, "tel:", "Phone");
        let mobile = extract_contact_info(&doc, "tel:", "Mobile phone");
        let fax = extract_text_by_label(&doc, "Fax");
        let established_year = extract_text_by_label(&doc, "Established")
            .and_then(|text| established_year_regex().captures(&text))
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok());
        let employees = extract_text_by_label(&doc, "Employees");

        Ok(Some(Business {
            id: None,
            domain: self.domain.clone(),
            page_url: url.to_string(),
            name,
            title,
            country,
            city,
            category,
            address,
            phone,
            mobile,
            fax,
            website,
            coordinates,
            working_hours,
            description,
            tags: (!tags.is_empty()).then_some(tags),
            reviews_count,
            rating,
            established_year,
            employees,
            scraped_at: Some(chrono::Utc::now()),
            exported_at: None,
            export_mode: None,
        }))
    }
}

fn count_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([^0-9]+)\s*(\d[\d,]*)?$").expect("valid regex"))
}

fn coordinates_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"daddr=([0-9.-]+),([0-9.-]+)").expect("valid regex"))
}

fn extract_coordinates(doc: &Html) -> Option<Coordinates> {
    let href = selectors::directions_link()
        .iter()
        .find_map(|sel| doc.select(sel).next())
        .and_then(|el| el.value().attr("href"))?;
    let caps = coordinates_regex().captures(href)?;
    Some(Coordinates {
        latitude: caps[1].parse().ok()?,
        longitude: caps[2].parse().ok()?,
    })
}

fn extract_reviews(doc: &Html) -> (Option<i64>, Option<f64>) {
    let Some(container) = doc.select(&selectors::reviews_container()[0]).next() else {
        return (None, None);
    };
    let rating = doc
        .select(&selectors::rating_value()[0])
        .next()
        .and_then(|el| el.text().collect::<String>().trim().parse::<f64>().ok());

    static REVIEWS_RE: OnceLock<Regex> = OnceLock::new();
    let re = REVIEWS_RE.get_or_init(|| Regex::new(r"(\d+)\s+Reviews?").expect("valid regex"));
    let text = container.text().collect::<String>();
    let reviews_count = re
        .captures(&text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok());

    (reviews_count, rating)
}

fn established_year_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{4})").expect("valid regex"))
}

/// Finds `div.label` whose text matches `label` exactly and returns its
/// next *element* sibling — the paired `div.text`. Mirrors
/// `find_next_sibling` on a BeautifulSoup tag: text nodes in between are
/// skipped, only the first element sibling counts.
fn find_label_sibling<'a>(doc: &'a Html, label: &str) -> Option<ElementRef<'a>> {
    for label_el in doc.select(selectors::label_div()) {
        let text = label_el.text().collect::<String>().trim().to_string();
        if text != label {
            continue;
        }
        if let Some(sibling) = label_el.next_siblings().find_map(ElementRef::wrap) {
            return Some(sibling);
        }
    }
    None
}

fn first_anchor_with_prefix<'a>(
    mut anchors: impl Iterator<Item = ElementRef<'a>>,
    href_prefix: &str,
) -> Option<String> {
    anchors
        .find_map(|a| a.value().attr("href").map(str::to_string))
        .filter(|href| href.starts_with(href_prefix))
        .map(|href| href.trim_start_matches(href_prefix).to_string())
}

/// Looks up a labeled contact link (e.g. `tel:` for Phone/Mobile phone):
/// first within the label's own sibling block, falling back to the first
/// matching anchor anywhere in the document if the label isn't found.
fn extract_contact_info(doc: &Html, href_prefix: &str, label: &str) -> Option<String> {
    if let Some(sibling) = find_label_sibling(doc, label) {
        if let Some(value) = first_anchor_with_prefix(sibling.select(selectors::any_anchor()), href_prefix) {
            return Some(value);
        }
        // Anchor might sit on the sibling's own href rather than a nested one.
        if let Some(href) = sibling.value().attr("href") {
            if let Some(value) = href.strip_prefix(href_prefix) {
                return Some(value.to_string());
            }
        }
    }
    first_anchor_with_prefix(doc.select(selectors::any_anchor()), href_prefix)
}

/// The label's sibling text verbatim — used for fields with no href, like
/// Fax, Established, and Employees.
fn extract_text_by_label(doc: &Html, label: &str) -> Option<String> {
    let text = find_label_sibling(doc, label)?
        .text()
        .collect::<String>()
        .trim()
        .to_string();
    (!text.is_empty()).then_some(text)
}

fn extract_working_hours(doc: &Html) -> Option<std::collections::HashMap<String, String>> {
    let list = doc.select(&selectors::working_hours_list()[0]).next()?;
    let li_selector = scraper::Selector::parse("li").ok()?;
    let mut hours = std::collections::HashMap::new();
    for li in list.select(&li_selector) {
        let text = li.text().collect::<String>();
        if let Some((day, range)) = text.split_once(':') {
            let day = day.trim();
            let range = range.trim();
            if !day.is_empty() && !range.is_empty() {
                hours.insert(day.to_string(), range.to_string());
            }
        }
    }
    (!hours.is_empty()).then_some(hours)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn listings_extracts_business_urls_and_has_next() {
        let mut server = mockito::Server::new_async().await;
        let html = r#"
            <html><body>
                <div class="company"><h3><a href="/company/1234/acme">Acme</a></h3></div>
                <div class="company"><h3><a href="/company/5678/globex">Globex</a></h3></div>
                <a class="pages_arrow" rel="next" href="/location/dubai/2">Next</a>
            </body></html>
        "#;
        let _mock = server.mock("GET", "/location/dubai").with_status(200).with_body(html).create_async().await;

        let adapter = YelloAdapter::new(server.url()).unwrap();
        let (urls, has_next) = adapter
            .listings(&format!("{}/location/dubai", server.url()), 1)
            .await
            .unwrap();

        assert_eq!(urls.len(), 2);
        assert!(has_next);
    }

    #[tokio::test]
    async fn listings_page_two_appends_segment() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/location/dubai/2")
            .with_status(200)
            .with_body("<html><body></body></html>")
            .create_async()
            .await;

        let adapter = YelloAdapter::new(server.url()).unwrap();
        let (urls, has_next) = adapter
            .listings(&format!("{}/location/dubai", server.url()), 2)
            .await
            .unwrap();

        assert!(urls.is_empty());
        assert!(!has_next);
    }

    #[tokio::test]
    async fn details_extracts_name_and_coordinates() {
        let mut server = mockito::Server::new_async().await;
        let html = r#"
            <html><body>
                <h1>Acme Corp - Dubai</h1>
                <ul itemtype="http://schema.org/BreadcrumbList">
                    <li><span itemprop="name">UAE</span></li>
                    <li><span itemprop="name">Dubai</span></li>
                    <li><span itemprop="name">Hardware</span></li>
                </ul>
                <div class="text" id="company_name">Acme Corp</div>
                <a href="https://maps.google.com/?daddr=25.2048,55.2708">Get Directions</a>
                <div id="company_address">123 Sheikh Zayed Road, Dubai</div>
            </body></html>
        "#;
        let _mock = server.mock("GET", "/company/1").with_status(200).with_body(html).create_async().await;

        let adapter = YelloAdapter::new(server.url()).unwrap();
        let business = adapter
            .details(&format!("{}/company/1", server.url()))
            .await
            .unwrap()
            .expect("business parsed");

        assert_eq!(business.name.as_deref(), Some("Acme Corp"));
        assert_eq!(business.city.as_deref(), Some("Dubai"));
        assert_eq!(
            business.coordinates,
            Some(Coordinates { latitude: 25.2048, longitude: 55.2708 })
        );
        assert!(business.address.unwrap().contains("Sheikh Zayed"));
    }

    #[tokio::test]
    async fn details_returns_none_on_404() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server.mock("GET", "/company/missing").with_status(404).create_async().await;

        let adapter = YelloAdapter::new(server.url()).unwrap();
        let business = adapter
            .details(&format!("{}/company/missing", server.url()))
            .await
            .unwrap();
        assert!(business.is_none());
    }
}
