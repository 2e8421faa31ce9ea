//! Core domain types for contractsync.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Field schema
// ---------------------------------------------------------------------------

/// Fields kept from each API contract item, in record-store column order.
pub const RAW_FIELDS: [&str; 9] = [
    "piid",
    "agency",
    "vendor",
    "value",
    "description",
    "fpds_status",
    "fpds_link",
    "deleted_date",
    "savings",
];

/// Raw fields a record must carry to survive cleaning.
pub const REQUIRED_FIELDS: [&str; 5] = ["piid", "agency", "value", "deleted_date", "savings"];

// ---------------------------------------------------------------------------
// RawContract
// ---------------------------------------------------------------------------

/// One contract as ingested from an API page, before cleaning.
///
/// Every field is optional: the API may omit any of them. Field order is the
/// record-store column order ([`RAW_FIELDS`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawContract {
    pub piid: Option<String>,
    pub agency: Option<String>,
    pub vendor: Option<String>,
    pub value: Option<f64>,
    pub description: Option<String>,
    pub fpds_status: Option<String>,
    pub fpds_link: Option<String>,
    pub deleted_date: Option<String>,
    pub savings: Option<f64>,
}

impl RawContract {
    /// Reduce an API item to the declared field set.
    ///
    /// Missing or null fields become `None` and unknown fields are dropped.
    /// Numeric fields also accept numeric strings; text fields also accept
    /// numbers and booleans.
    pub fn sanitize(item: &Value) -> Self {
        let text = |key: &str| item.get(key).and_then(value_as_text);
        let number = |key: &str| item.get(key).and_then(value_as_number);

        Self {
            piid: text("piid"),
            agency: text("agency"),
            vendor: text("vendor"),
            value: number("value"),
            description: text("description"),
            fpds_status: text("fpds_status"),
            fpds_link: text("fpds_link"),
            deleted_date: text("deleted_date"),
            savings: number("savings"),
        }
    }
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn value_as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// EnrichedRecord
// ---------------------------------------------------------------------------

/// The four classification fields scraped from a contract's detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailFields {
    /// Contracting office agency name.
    pub buying_org_2: String,
    /// Contracting office name.
    pub buying_org_3: String,
    /// Principal NAICS code.
    pub naics: String,
    /// Product or service code.
    pub psc: String,
}

impl DetailFields {
    pub fn is_empty(&self) -> bool {
        self.buying_org_2.is_empty()
            && self.buying_org_3.is_empty()
            && self.naics.is_empty()
            && self.psc.is_empty()
    }
}

/// A cleaned contract plus its detail-page classification.
///
/// Field order is the export column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnrichedRecord {
    #[serde(rename = "PIID")]
    pub piid: String,
    #[serde(rename = "Buying Org 1")]
    pub buying_org_1: String,
    #[serde(rename = "Buying Org 2")]
    pub buying_org_2: String,
    #[serde(rename = "Buying Org 3")]
    pub buying_org_3: String,
    #[serde(rename = "NAICS")]
    pub naics: String,
    #[serde(rename = "PSC")]
    pub psc: String,
    #[serde(rename = "Incumbent")]
    pub incumbent: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Total Contract Value (TCV)", serialize_with = "money")]
    pub total_contract_value: f64,
    #[serde(rename = "Savings", serialize_with = "money")]
    pub savings: f64,
    #[serde(rename = "Deleted On")]
    pub deleted_on: Option<NaiveDate>,
    #[serde(rename = "FPDS Link")]
    pub fpds_link: String,
}

impl EnrichedRecord {
    /// Overwrite the classification columns.
    pub fn apply(&mut self, fields: &DetailFields) {
        self.buying_org_2 = fields.buying_org_2.clone();
        self.buying_org_3 = fields.buying_org_3.clone();
        self.naics = fields.naics.clone();
        self.psc = fields.psc.clone();
    }

    /// Current classification columns.
    pub fn detail_fields(&self) -> DetailFields {
        DetailFields {
            buying_org_2: self.buying_org_2.clone(),
            buying_org_3: self.buying_org_3.clone(),
            naics: self.naics.clone(),
            psc: self.psc.clone(),
        }
    }
}

fn money<S: Serializer>(amount: &f64, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{amount:.2}"))
}

// ---------------------------------------------------------------------------
// Page responses
// ---------------------------------------------------------------------------

/// Decoded response body: structured JSON, or the raw text when decoding fails.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
}

impl Payload {
    /// Decode a body as JSON, falling back to the raw text.
    pub fn decode(body: &str) -> Self {
        match serde_json::from_str(body) {
            Ok(value) => Self::Json(value),
            Err(e) => {
                tracing::warn!(error = %e, "response body is not JSON, keeping raw text");
                Self::Text(body.to_string())
            }
        }
    }

    /// The payload as a JSON object, if it is one.
    pub fn structured(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Json(Value::Object(map)) => Some(map),
            _ => None,
        }
    }
}

/// Envelope for a single API response. Never persisted.
#[derive(Debug, Clone)]
pub struct PageResponse {
    /// Whether the status was 2xx.
    pub ok: bool,
    /// HTTP status code.
    pub status: u16,
    /// Decoded body.
    pub payload: Payload,
    /// Response headers (lossy UTF-8 values).
    pub headers: BTreeMap<String, String>,
}

impl PageResponse {
    /// Consume the envelope, keeping the JSON object body of a successful response.
    pub fn into_data(self) -> Option<Map<String, Value>> {
        match (self.ok, self.payload) {
            (true, Payload::Json(Value::Object(map))) => Some(map),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sanitize_keeps_declared_fields_only() {
        let item = json!({
            "piid": "47QSWA19D008F",
            "agency": "General Services Administration",
            "vendor": "ACME",
            "value": 1250000,
            "description": "Janitorial",
            "fpds_status": "TERMINATED",
            "fpds_link": "https://www.fpds.gov/ezsearch/x",
            "deleted_date": "2/14/2025",
            "savings": 310000.5,
            "internal_id": 991,
        });
        let contract = RawContract::sanitize(&item);
        assert_eq!(contract.piid.as_deref(), Some("47QSWA19D008F"));
        assert_eq!(contract.value, Some(1_250_000.0));
        assert_eq!(contract.savings, Some(310_000.5));
        assert_eq!(contract.deleted_date.as_deref(), Some("2/14/2025"));
    }

    #[test]
    fn sanitize_marks_missing_fields_none() {
        let item = json!({ "piid": "A1", "vendor": null, "savings": "12.5" });
        let contract = RawContract::sanitize(&item);
        assert_eq!(contract.piid.as_deref(), Some("A1"));
        assert_eq!(contract.vendor, None);
        assert_eq!(contract.agency, None);
        assert_eq!(contract.savings, Some(12.5));
    }

    #[test]
    fn sanitize_stringifies_numeric_identifiers() {
        let contract = RawContract::sanitize(&json!({ "piid": 12345 }));
        assert_eq!(contract.piid.as_deref(), Some("12345"));
    }

    #[test]
    fn payload_falls_back_to_text() {
        let payload = Payload::decode("<html>gateway timeout</html>");
        assert_eq!(payload, Payload::Text("<html>gateway timeout</html>".into()));
        assert!(payload.structured().is_none());

        let payload = Payload::decode("[1, 2]");
        assert!(matches!(payload, Payload::Json(_)));
        assert!(payload.structured().is_none());

        let payload = Payload::decode(r#"{"meta": {"total_results": 3}}"#);
        assert!(payload.structured().is_some());
    }

    #[test]
    fn unsuccessful_response_has_no_data() {
        let response = PageResponse {
            ok: false,
            status: 500,
            payload: Payload::decode(r#"{"error": "boom"}"#),
            headers: BTreeMap::new(),
        };
        assert!(response.into_data().is_none());
    }

    #[test]
    fn apply_overwrites_classification_only() {
        let mut record = EnrichedRecord {
            piid: "A1".into(),
            savings: 10.0,
            ..Default::default()
        };
        let fields = DetailFields {
            buying_org_2: "DEPT OF DEFENSE".into(),
            buying_org_3: "W6QK ACC-APG".into(),
            naics: "541512".into(),
            psc: "DA01".into(),
        };
        record.apply(&fields);
        assert_eq!(record.detail_fields(), fields);
        assert_eq!(record.piid, "A1");
        assert_eq!(record.savings, 10.0);
    }
}
