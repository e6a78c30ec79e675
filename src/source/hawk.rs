use serde_json::Value;

use super::{RawUnit, SourceAdapter};
use crate::flatten::Context;
use crate::key::{field_text, hawk_key};
use crate::record::SourceKind;

/// datacenterhawk documents:
///
/// ```text
/// { "markets": { "<market key>": { "name": .., "link": ..,
///                                  "facilities": { "<facility key>": { .. } } } } }
/// ```
pub struct HawkAdapter;

impl SourceAdapter for HawkAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Hawk
    }

    fn url_field(&self) -> &'static str {
        "url"
    }

    fn records<'a>(&self, document: &'a Value) -> Vec<RawUnit<'a>> {
        let mut units = Vec::new();
        let Some(markets) = document.get("markets").and_then(Value::as_object) else {
            return units;
        };

        for (market_key, market_data) in markets {
            // A market without a name is known by its key.
            let market_name = market_data
                .get("name")
                .cloned()
                .unwrap_or_else(|| Value::String(market_key.clone()));
            let Some(facilities) = market_data.get("facilities").and_then(Value::as_object) else {
                continue;
            };

            for (facility_key, facility) in facilities {
                let mut context = Context::new();
                context.insert("market".to_string(), market_name.clone());
                units.push(RawUnit {
                    context,
                    record_key: facility_key,
                    record: facility,
                });
            }
        }
        units
    }

    fn derive_key(&self, unit: &RawUnit<'_>) -> String {
        hawk_key(&field_text(unit.context.get("market")), unit.record_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> Value {
        json!({
            "markets": {
                "nova": {
                    "name": "Northern Virginia",
                    "link": "https://hawk/nova",
                    "facilities": {
                        "facility_1": {"name": "IAD1", "url": "https://hawk/iad1"},
                        "facility_2": {"name": "IAD2"}
                    }
                },
                "Phoenix": {
                    "facilities": {"facility_1": {"name": "PHX1"}}
                },
                "empty": {"name": "Empty"}
            }
        })
    }

    #[test]
    fn test_keys_use_market_name_or_key() {
        let doc = document();
        let keys: Vec<String> = HawkAdapter
            .records(&doc)
            .iter()
            .map(|u| HawkAdapter.derive_key(u))
            .collect();
        assert_eq!(
            keys,
            vec![
                "Northern Virginia_facility_1",
                "Northern Virginia_facility_2",
                "Phoenix_facility_1"
            ]
        );
    }

    #[test]
    fn test_flatten_puts_market_first() {
        let doc = document();
        let units = HawkAdapter.records(&doc);
        let input = HawkAdapter.flatten(&units[0]).unwrap();
        assert_eq!(
            input.to_compact_json(),
            r#"{"market":"Northern Virginia","name":"IAD1","url":"https://hawk/iad1"}"#
        );
        assert_eq!(HawkAdapter.raw_url(&units[0]), "https://hawk/iad1");
        assert_eq!(HawkAdapter.raw_url(&units[1]), "");
    }

    #[test]
    fn test_document_without_markets_is_empty() {
        assert!(HawkAdapter.records(&json!({"other": {}})).is_empty());
    }
}
