//! Classification fields scraped from a contract detail page.
//!
//! The detail page renders each field as a read-only `<input>` whose `title`
//! attribute names the field. Extraction never fails: a missing element, a
//! missing `value`, or an unusable selector all yield an empty string.

use scraper::{Html, Selector};
use tracing::warn;

use contractsync_shared::DetailFields;

/// One of the four fields read from a detail page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailField {
    AgencyName,
    OfficeName,
    Naics,
    Psc,
}

impl DetailField {
    pub const ALL: [DetailField; 4] = [
        DetailField::AgencyName,
        DetailField::OfficeName,
        DetailField::Naics,
        DetailField::Psc,
    ];

    /// Exact `title` attribute of the input holding this field.
    pub fn title(self) -> &'static str {
        match self {
            Self::AgencyName => "Contracting Office Agency Name",
            Self::OfficeName => "Contracting Office Name",
            Self::Naics => "Principal North American Industry Classification System Code",
            Self::Psc => "Product Or Service Code",
        }
    }
}

/// Value of the first `<input>` whose title matches `field` exactly.
pub fn extract_field(doc: &Html, field: DetailField) -> String {
    let selector = match Selector::parse("input[title]") {
        Ok(selector) => selector,
        Err(e) => {
            warn!(field = field.title(), error = %e, "invalid input selector");
            return String::new();
        }
    };

    doc.select(&selector)
        .find(|el| el.value().attr("title") == Some(field.title()))
        .and_then(|el| el.value().attr("value"))
        .map(str::to_string)
        .unwrap_or_default()
}

/// Parse a detail page once and pull all four fields.
pub fn extract_detail_fields(html: &str) -> DetailFields {
    let doc = Html::parse_document(html);

    DetailFields {
        buying_org_2: extract_field(&doc, DetailField::AgencyName),
        buying_org_3: extract_field(&doc, DetailField::OfficeName),
        naics: extract_field(&doc, DetailField::Naics),
        psc: extract_field(&doc, DetailField::Psc),
    }
}
