use serde_json::Value;

use super::{RawUnit, SourceAdapter};
use crate::error::Result;
use crate::flatten::{add_combined_description, flatten, Context, FlattenedInput};
use crate::key::centers_key;
use crate::record::SourceKind;

/// datacenters.com documents:
///
/// ```text
/// { "<facility id>": { "Name": .., "Address": .., "Description1": ..,
///                      "Description2": .., "TableInfo": { .. }, "Url": .. } }
/// ```
pub struct CentersAdapter;

impl SourceAdapter for CentersAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Centers
    }

    fn url_field(&self) -> &'static str {
        "Url"
    }

    fn records<'a>(&self, document: &'a Value) -> Vec<RawUnit<'a>> {
        let Some(facilities) = document.as_object() else {
            return Vec::new();
        };

        facilities
            .iter()
            .map(|(facility_id, facility)| RawUnit {
                context: Context::new(),
                record_key: facility_id,
                record: facility,
            })
            .collect()
    }

    fn derive_key(&self, unit: &RawUnit<'_>) -> String {
        centers_key(unit.record_key)
    }

    fn flatten(&self, unit: &RawUnit<'_>) -> Result<FlattenedInput> {
        let mut input = flatten(self.kind(), &unit.context, unit.record)?;
        add_combined_description(&mut input);
        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fac_9_scenario() {
        let doc = json!({"fac_9": {"Description1": "A", "Description2": "B", "Url": "u9"}});
        let units = CentersAdapter.records(&doc);
        assert_eq!(units.len(), 1);
        assert_eq!(CentersAdapter.derive_key(&units[0]), "fac_9");
        assert_eq!(CentersAdapter.raw_url(&units[0]), "u9");

        let input = CentersAdapter.flatten(&units[0]).unwrap();
        assert_eq!(input.get("combinedDescription"), Some(&json!("A\nB")));
        assert_eq!(input.keys().last(), Some("combinedDescription"));
    }

    #[test]
    fn test_insertion_order_is_kept() {
        let doc = json!({"z_last": {}, "a_first": {}, "m_mid": {}});
        let keys: Vec<String> = CentersAdapter
            .records(&doc)
            .iter()
            .map(|u| CentersAdapter.derive_key(u))
            .collect();
        assert_eq!(keys, vec!["z_last", "a_first", "m_mid"]);
    }

    #[test]
    fn test_missing_descriptions() {
        let doc = json!({"fac_1": {"Description2": "only second"}});
        let units = CentersAdapter.records(&doc);
        let input = CentersAdapter.flatten(&units[0]).unwrap();
        assert_eq!(input.get("combinedDescription"), Some(&json!("\nonly second")));
    }
}
