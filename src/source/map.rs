use serde_json::Value;

use super::{RawUnit, SourceAdapter};
use crate::error::Result;
use crate::flatten::{flatten, html_fields_to_text, Context, FlattenedInput};
use crate::key::{field_text, map_key};
use crate::record::SourceKind;

/// datacentermap documents:
///
/// ```text
/// { "<state>": { "details": [ { "name": "<city>", "url": ..,
///                               "addresses": [ { "url": .., "name": .., .. } ] } ] } }
/// ```
pub struct MapAdapter;

/// Address fields scraped as raw HTML.
const HTML_FIELDS: [&str; 2] = ["overviewHTML", "specsHtml"];

impl SourceAdapter for MapAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Map
    }

    fn url_field(&self) -> &'static str {
        "url"
    }

    fn records<'a>(&self, document: &'a Value) -> Vec<RawUnit<'a>> {
        let mut units = Vec::new();
        let Some(states) = document.as_object() else {
            return units;
        };

        for (state, state_data) in states {
            let details = state_data
                .get("details")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();

            for detail in details {
                let city = detail.get("name").cloned().unwrap_or_else(|| Value::from(""));
                let detail_url = detail.get("url").cloned().unwrap_or_else(|| Value::from(""));
                let addresses = detail
                    .get("addresses")
                    .and_then(Value::as_array)
                    .map(Vec::as_slice)
                    .unwrap_or_default();

                for address in addresses {
                    let mut context = Context::new();
                    context.insert("state".to_string(), Value::String(state.clone()));
                    context.insert("city".to_string(), city.clone());
                    context.insert("detail_url".to_string(), detail_url.clone());
                    units.push(RawUnit {
                        context,
                        record_key: "",
                        record: address,
                    });
                }
            }
        }
        units
    }

    fn flatten(&self, unit: &RawUnit<'_>) -> Result<FlattenedInput> {
        let mut input = flatten(self.kind(), &unit.context, unit.record)?;
        html_fields_to_text(&mut input, &HTML_FIELDS);
        Ok(input)
    }

    fn derive_key(&self, unit: &RawUnit<'_>) -> String {
        map_key(
            &field_text(unit.context.get("state")),
            &field_text(unit.context.get("city")),
            &field_text(unit.record.get("url")),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_santa_clara_scenario() {
        let doc = json!({"CA": {"details": [{"name": "SantaClara", "addresses": [{"url": "u1", "name": "F1"}]}]}});
        let units = MapAdapter.records(&doc);
        assert_eq!(units.len(), 1);
        assert_eq!(MapAdapter.derive_key(&units[0]), "CA_SantaClara_u1");
        assert_eq!(MapAdapter.raw_url(&units[0]), "u1");

        let input = MapAdapter.flatten(&units[0]).unwrap();
        assert_eq!(
            input.to_compact_json(),
            r#"{"state":"CA","city":"SantaClara","detail_url":"","url":"u1","name":"F1"}"#
        );
    }

    #[test]
    fn test_traversal_order_and_counts() {
        let doc = json!({
            "Virginia": {"count": "2", "details": [
                {"name": "Ashburn", "url": "d/ash", "addresses": [{"url": "a1"}, {"url": "a2"}]},
                {"name": "Reston", "addresses": [{"url": "r1"}]}
            ]},
            "Texas": {"details": [{"name": "Dallas", "addresses": []}]},
            "Oregon": {"count": "0"}
        });
        let keys: Vec<String> = MapAdapter
            .records(&doc)
            .iter()
            .map(|u| MapAdapter.derive_key(u))
            .collect();
        assert_eq!(keys, vec!["Virginia_Ashburn_a1", "Virginia_Ashburn_a2", "Virginia_Reston_r1"]);
    }

    #[test]
    fn test_missing_components_keep_empty_segments() {
        let doc = json!({"CA": {"details": [{"addresses": [{"name": "no url"}]}]}});
        let units = MapAdapter.records(&doc);
        assert_eq!(MapAdapter.derive_key(&units[0]), "CA__");
        assert_eq!(MapAdapter.raw_url(&units[0]), "");
    }

    #[test]
    fn test_scraped_html_is_sent_as_text() {
        let doc = json!({"CA": {"details": [{"name": "SJ", "addresses": [{
            "url": "u1",
            "overviewHTML": "<h2>Overview</h2><p>Carrier-neutral <em>colocation</em>.</p>",
            "specsHtml": "<table><tr><td>Power</td><td>12 MW</td></tr></table>"
        }]}]}});
        let units = MapAdapter.records(&doc);
        let input = MapAdapter.flatten(&units[0]).unwrap();
        assert_eq!(input.get("overviewHTML"), Some(&json!("Overview Carrier-neutral colocation .")));
        assert_eq!(input.get("specsHtml"), Some(&json!("Power 12 MW")));
    }

    #[test]
    fn test_non_object_address_still_yields_key() {
        let doc = json!({"CA": {"details": [{"name": "SJ", "addresses": ["oops"]}]}});
        let units = MapAdapter.records(&doc);
        assert_eq!(MapAdapter.derive_key(&units[0]), "CA_SJ_");
        assert!(MapAdapter.flatten(&units[0]).is_err());
    }
}
