//! Declared selector cascades, per the Design Notes ("Selector cascade →
//! declared fallback list"). Each field carries an ordered list of selectors
//! tried in sequence; the first that yields a non-empty result wins.

use scraper::Selector;
use std::sync::OnceLock;

macro_rules! cascade {
    ($name:ident, [$($sel:expr),+ $(,)?]) => {
        pub fn $name() -> &'static [Selector] {
            static CELL: OnceLock<Vec<Selector>> = OnceLock::new();
            CELL.get_or_init(|| vec![$(Selector::parse($sel).expect("valid selector")),+])
        }
    };
}

cascade!(city_links, [
    r#"a[href*="/location/"]"#,
    r#"a[href*="/city/"]"#,
    r#"select[name="location"] option"#,
    ".location-link",
]);

cascade!(business_links, [
    r#"div.company h3 a[href^="/company/"]"#,
    r#"a[href^="/company/"]"#,
]);

cascade!(next_page_link, [r#"a.pages_arrow[rel="next"]"#]);

cascade!(company_name, ["div.text#company_name", ".company_header h3"]);

cascade!(address, [
    "#company_address",
    "div.text.location #company_address",
    "div.info div.text.location #company_address",
    ".address",
    ".location_links",
    r#"div[id*="address"]"#,
    "div.text.location div",
]);

cascade!(directions_link, [
    r#"a[href*="maps.google.com"][href*="daddr="]"#,
    r#".location_links a[href*="maps.google.com"]"#,
]);

cascade!(description, ["div.text.desc", ".company_description"]);

cascade!(website_link, [r#"div.weblinks a[href*="/redir/"]"#]);

cascade!(working_hours_list, ["#open_hours ul"]);

cascade!(tag_links, [r#"div.tags a[href^="/category/"]"#]);

cascade!(reviews_container, [".company_reviews"]);
cascade!(rating_value, [".rate"]);

pub fn breadcrumb() -> &'static Selector {
    static CELL: OnceLock<Selector> = OnceLock::new();
    CELL.get_or_init(|| {
        Selector::parse(r#"ul[itemtype*="BreadcrumbList"] li span[itemprop="name"]"#)
            .expect("valid selector")
    })
}

pub fn title() -> &'static Selector {
    static CELL: OnceLock<Selector> = OnceLock::new();
    CELL.get_or_init(|| Selector::parse("h1").expect("valid selector"))
}

/// A labeled field's caption, e.g. `<div class="label">Phone</div>` — the
/// contact-info block pairs one of these with a sibling `div.text`.
pub fn label_div() -> &'static Selector {
    static CELL: OnceLock<Selector> = OnceLock::new();
    CELL.get_or_init(|| Selector::parse("div.label").expect("valid selector"))
}

pub fn any_anchor() -> &'static Selector {
    static CELL: OnceLock<Selector> = OnceLock::new();
    CELL.get_or_init(|| Selector::parse("a").expect("valid selector"))
}

/// Try each selector in order, returning the first non-empty set of
/// matched-element text.
pub fn first_nonempty_text<'a>(
    doc: &'a scraper::Html,
    cascade: &'a [Selector],
) -> Option<String> {
    for selector in cascade {
        if let Some(el) = doc.select(selector).next() {
            let text = el.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}
