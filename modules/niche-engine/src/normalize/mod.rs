//! Record → sheet-cell normalization.
//!
//! A provider record is an untyped JSON object whose field names drift
//! between scraper versions. Each output column therefore lists several
//! candidate fields in `FIELD_TABLE`; the first one present wins. Unknown
//! columns map to an empty string.

pub mod hours;

use serde_json::Value;

use crate::traits::ExternalRecord;

/// Separator for multi-value cells.
pub const LIST_SEPARATOR: &str = ", ";

/// Separator between opening-hours entries.
pub const HOURS_SEPARATOR: &str = " | ";

/// Record fields holding the provider's stable place identifier, in order of preference.
const NATURAL_KEY_FIELDS: &[&str] = &["placeId", "place_id", "cid", "fid"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Scalar rendered as-is.
    Text,
    /// Digits only.
    Phone,
    /// Every value of a list, in order.
    Joined,
    /// First non-empty value of a list.
    First,
    /// Opening-hours entries.
    Hours,
}

#[derive(Debug)]
pub struct FieldRule {
    /// Column headers (lower-case) this rule serves.
    pub columns: &'static [&'static str],
    /// Record fields to try, in order. Dotted names address nested objects.
    pub candidates: &'static [&'static str],
    pub kind: FieldKind,
}

pub static FIELD_TABLE: &[FieldRule] = &[
    FieldRule {
        columns: &["unique id", "place id", "placeid"],
        candidates: NATURAL_KEY_FIELDS,
        kind: FieldKind::Text,
    },
    FieldRule {
        columns: &["business name", "name", "title", "company"],
        candidates: &["title", "name", "businessName"],
        kind: FieldKind::Text,
    },
    FieldRule {
        columns: &["category", "primary category"],
        candidates: &["categoryName", "category"],
        kind: FieldKind::Text,
    },
    FieldRule {
        columns: &["categories"],
        candidates: &["categories", "categoryName"],
        kind: FieldKind::Joined,
    },
    FieldRule {
        columns: &["phone", "phone number"],
        candidates: &["phoneUnformatted", "phone", "phoneNumber"],
        kind: FieldKind::Phone,
    },
    FieldRule {
        columns: &["website", "website url", "site"],
        candidates: &["website", "webUrl", "domain"],
        kind: FieldKind::Text,
    },
    FieldRule {
        columns: &["email"],
        candidates: &["emails", "email"],
        kind: FieldKind::First,
    },
    FieldRule {
        columns: &["emails"],
        candidates: &["emails", "email"],
        kind: FieldKind::Joined,
    },
    FieldRule {
        columns: &["address", "full address"],
        candidates: &["address", "fullAddress"],
        kind: FieldKind::Text,
    },
    FieldRule {
        columns: &["street", "street address"],
        candidates: &["street"],
        kind: FieldKind::Text,
    },
    FieldRule {
        columns: &["neighborhood"],
        candidates: &["neighborhood"],
        kind: FieldKind::Text,
    },
    FieldRule {
        columns: &["city"],
        candidates: &["city"],
        kind: FieldKind::Text,
    },
    FieldRule {
        columns: &["state", "region"],
        candidates: &["state"],
        kind: FieldKind::Text,
    },
    FieldRule {
        columns: &["postal code", "zip", "zip code", "postcode"],
        candidates: &["postalCode", "zip"],
        kind: FieldKind::Text,
    },
    FieldRule {
        columns: &["country", "country code"],
        candidates: &["countryCode", "country"],
        kind: FieldKind::Text,
    },
    FieldRule {
        columns: &["latitude", "lat"],
        candidates: &["location.lat", "latitude"],
        kind: FieldKind::Text,
    },
    FieldRule {
        columns: &["longitude", "lng", "long"],
        candidates: &["location.lng", "longitude"],
        kind: FieldKind::Text,
    },
    FieldRule {
        columns: &["rating", "total score"],
        candidates: &["totalScore", "rating"],
        kind: FieldKind::Text,
    },
    FieldRule {
        columns: &["reviews", "review count", "reviews count"],
        candidates: &["reviewsCount", "reviews"],
        kind: FieldKind::Text,
    },
    FieldRule {
        columns: &["google maps url", "maps url", "url"],
        candidates: &["url", "googleMapsUrl"],
        kind: FieldKind::Text,
    },
    FieldRule {
        columns: &["hours", "opening hours", "business hours"],
        candidates: &["openingHours", "hours"],
        kind: FieldKind::Hours,
    },
    FieldRule {
        columns: &["niche", "search term", "keyword"],
        candidates: &["searchString"],
        kind: FieldKind::Text,
    },
    FieldRule {
        columns: &["description"],
        candidates: &["description"],
        kind: FieldKind::Text,
    },
    FieldRule {
        columns: &["facebook"],
        candidates: &["facebooks", "facebook"],
        kind: FieldKind::First,
    },
    FieldRule {
        columns: &["instagram"],
        candidates: &["instagrams", "instagram"],
        kind: FieldKind::First,
    },
    FieldRule {
        columns: &["linkedin"],
        candidates: &["linkedIns", "linkedin"],
        kind: FieldKind::First,
    },
    FieldRule {
        columns: &["twitter", "x", "x (twitter)"],
        candidates: &["twitters", "twitter"],
        kind: FieldKind::First,
    },
    FieldRule {
        columns: &["youtube"],
        candidates: &["youtubes", "youtube"],
        kind: FieldKind::First,
    },
    FieldRule {
        columns: &["tiktok"],
        candidates: &["tiktoks", "tiktok"],
        kind: FieldKind::First,
    },
    FieldRule {
        columns: &["pinterest"],
        candidates: &["pinterests", "pinterest"],
        kind: FieldKind::First,
    },
];

/// Rule serving `column`, matched case-insensitively.
pub fn rule_for(column: &str) -> Option<&'static FieldRule> {
    let wanted = column.trim().to_lowercase();
    FIELD_TABLE
        .iter()
        .find(|rule| rule.columns.contains(&wanted.as_str()))
}

/// The provider's stable identifier for the entity behind `record`.
pub fn natural_key(record: &ExternalRecord) -> Option<String> {
    NATURAL_KEY_FIELDS
        .iter()
        .filter_map(|field| lookup(record, field))
        .map(scalar_text)
        .find(|key| !key.is_empty())
}

/// Cell value for one output column. Unmapped columns yield `""`.
pub fn value_for_column(record: &ExternalRecord, column: &str) -> String {
    let Some(rule) = rule_for(column) else {
        return String::new();
    };
    rule.candidates
        .iter()
        .filter_map(|field| lookup(record, field))
        .map(|value| render(value, rule.kind))
        .find(|rendered| !rendered.is_empty())
        .unwrap_or_default()
}

/// One output row in `headers` order. The column named `unique_id_header`
/// always carries the natural key, whatever its name.
pub fn row_for_headers(
    record: &ExternalRecord,
    headers: &[String],
    unique_id_header: &str,
) -> Vec<String> {
    headers
        .iter()
        .map(|header| {
            if header.trim().eq_ignore_ascii_case(unique_id_header.trim()) {
                natural_key(record).unwrap_or_default()
            } else {
                value_for_column(record, header)
            }
        })
        .collect()
}

/// Strip everything but ASCII digits.
pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn lookup<'a>(record: &'a ExternalRecord, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = record.get(parts.next()?)?;
    for part in parts {
        current = current.get(part)?;
    }
    (!current.is_null()).then_some(current)
}

fn render(value: &Value, kind: FieldKind) -> String {
    match kind {
        FieldKind::Text | FieldKind::Joined => scalar_text(value),
        FieldKind::Phone => normalize_phone(&scalar_text(value)),
        FieldKind::First => match value {
            Value::Array(items) => items
                .iter()
                .map(scalar_text)
                .find(|item| !item.is_empty())
                .unwrap_or_default(),
            other => scalar_text(other),
        },
        FieldKind::Hours => render_hours(value),
    }
}

fn render_hours(value: &Value) -> String {
    match value {
        Value::Array(entries) => entries
            .iter()
            .map(|entry| match entry {
                Value::Object(obj) => {
                    let day = obj.get("day").map(scalar_text).unwrap_or_default();
                    let hours = obj.get("hours").map(scalar_text).unwrap_or_default();
                    hours::normalize_day_hours(&day, &hours)
                }
                other => hours::normalize_entry(&scalar_text(other)),
            })
            .filter(|entry| !entry.is_empty())
            .collect::<Vec<_>>()
            .join(HOURS_SEPARATOR),
        Value::String(s) => s
            .split(['\n', ';'])
            .map(hours::normalize_entry)
            .filter(|entry| !entry.is_empty())
            .collect::<Vec<_>>()
            .join(HOURS_SEPARATOR),
        other => scalar_text(other),
    }
}

fn join(items: impl Iterator<Item = String>) -> String {
    items
        .filter(|item| !item.is_empty())
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

/// Display text for a JSON scalar. Objects take their `url`, `value` or
/// `name` field, which is how providers wrap links and labels.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => join(items.iter().map(scalar_text)),
        Value::Object(obj) => ["url", "value", "name"]
            .iter()
            .find_map(|key| obj.get(*key).filter(|v| !v.is_object()))
            .map(scalar_text)
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> ExternalRecord {
        match value {
            Value::Object(map) => map,
            _ => panic!("record fixture must be an object"),
        }
    }

    #[test]
    fn phone_keeps_digits_only() {
        let r = record(json!({"phone": "+1 (512) 555-0100"}));
        assert_eq!(value_for_column(&r, "Phone"), "15125550100");
    }

    #[test]
    fn first_candidate_present_wins() {
        let r = record(json!({"phone": "(512) 555-0199", "phoneUnformatted": "+15125550100"}));
        assert_eq!(value_for_column(&r, "phone number"), "15125550100");

        let r = record(json!({"phoneUnformatted": null, "phone": "512-555-0199"}));
        assert_eq!(value_for_column(&r, "Phone"), "5125550199");
    }

    #[test]
    fn lists_join_in_order_and_socials_take_first() {
        let r = record(json!({
            "categories": ["Plumber", "", "Water heater installer"],
            "emails": ["a@x.com", "b@x.com"],
            "facebooks": ["", "https://facebook.com/acme", "https://facebook.com/other"],
        }));
        assert_eq!(value_for_column(&r, "Categories"), "Plumber, Water heater installer");
        assert_eq!(value_for_column(&r, "Emails"), "a@x.com, b@x.com");
        assert_eq!(value_for_column(&r, "Email"), "a@x.com");
        assert_eq!(value_for_column(&r, "Facebook"), "https://facebook.com/acme");
    }

    #[test]
    fn nested_fields_and_numbers() {
        let r = record(json!({"location": {"lat": 30.25, "lng": -97.75}, "totalScore": 4.5, "reviewsCount": 12}));
        assert_eq!(value_for_column(&r, "Latitude"), "30.25");
        assert_eq!(value_for_column(&r, "lng"), "-97.75");
        assert_eq!(value_for_column(&r, "Rating"), "4.5");
        assert_eq!(value_for_column(&r, "Reviews"), "12");
    }

    #[test]
    fn opening_hours_objects_and_strings() {
        let r = record(json!({"openingHours": [
            {"day": "Mon", "hours": "9 to 5 PM"},
            {"day": "Tuesday", "hours": "Closed"},
        ]}));
        assert_eq!(
            value_for_column(&r, "Opening Hours"),
            "Monday - 9 AM to 5 PM | Tuesday - Closed"
        );

        let r = record(json!({"hours": "Mon - 9 to 5 PM\nTue - Closed"}));
        assert_eq!(
            value_for_column(&r, "Hours"),
            "Monday - 9 AM to 5 PM | Tuesday - Closed"
        );
    }

    #[test]
    fn unknown_column_is_empty() {
        let r = record(json!({"title": "Acme"}));
        assert_eq!(value_for_column(&r, "Favourite Colour"), "");
        assert_eq!(value_for_column(&r, "  business NAME "), "Acme");
    }

    #[test]
    fn natural_key_falls_back_through_aliases() {
        assert_eq!(natural_key(&record(json!({"placeId": "ChIJ1"}))).as_deref(), Some("ChIJ1"));
        assert_eq!(natural_key(&record(json!({"placeId": "", "cid": 42}))).as_deref(), Some("42"));
        assert_eq!(natural_key(&record(json!({"title": "x"}))), None);
    }

    #[test]
    fn row_follows_header_order_and_custom_unique_id_header() {
        let r = record(json!({"placeId": "p1", "title": "Acme", "city": "Austin"}));
        let headers = vec!["Key".to_string(), "City".to_string(), "Name".to_string(), "Notes".to_string()];
        assert_eq!(row_for_headers(&r, &headers, "key"), vec!["p1", "Austin", "Acme", ""]);
    }
}
