//! Source adapters.
//!
//! Each adapter knows one raw document shape: how to walk it, how to derive
//! a record's unique key, how to flatten it for the oracle and which raw
//! field carries the record's own URL.

mod centers;
mod hawk;
mod map;

pub use self::centers::CentersAdapter;
pub use self::hawk::HawkAdapter;
pub use self::map::MapAdapter;

use serde_json::Value;

use crate::error::Result;
use crate::flatten::{flatten, Context, FlattenedInput};
use crate::key::field_text;
use crate::record::SourceKind;

/// One facility as found in the raw document, with the ancestor fields it
/// inherits.
#[derive(Debug)]
pub struct RawUnit<'a> {
    pub context: Context,
    /// Key of the record in its parent object; empty for array items.
    pub record_key: &'a str,
    pub record: &'a Value,
}

pub trait SourceAdapter: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Raw field holding the record's own URL, used when the oracle leaves
    /// `URL` empty.
    fn url_field(&self) -> &'static str;

    /// Every facility in document order. Containers of the wrong type are
    /// skipped rather than treated as errors.
    fn records<'a>(&self, document: &'a Value) -> Vec<RawUnit<'a>>;

    fn derive_key(&self, unit: &RawUnit<'_>) -> String;

    fn flatten(&self, unit: &RawUnit<'_>) -> Result<FlattenedInput> {
        flatten(self.kind(), &unit.context, unit.record)
    }

    fn raw_url(&self, unit: &RawUnit<'_>) -> String {
        field_text(unit.record.get(self.url_field()))
    }
}

pub fn adapter_for(kind: SourceKind) -> Box<dyn SourceAdapter> {
    match kind {
        SourceKind::Map => Box::new(MapAdapter),
        SourceKind::Hawk => Box::new(HawkAdapter),
        SourceKind::Centers => Box::new(CentersAdapter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapters_match_kind() {
        for kind in SourceKind::ALL {
            assert_eq!(adapter_for(kind).kind(), kind);
        }
    }

    #[test]
    fn test_url_fields_differ_per_source() {
        assert_eq!(adapter_for(SourceKind::Map).url_field(), "url");
        assert_eq!(adapter_for(SourceKind::Hawk).url_field(), "url");
        assert_eq!(adapter_for(SourceKind::Centers).url_field(), "Url");
    }

    #[test]
    fn test_adapter_is_object_safe() {
        fn _assert_adapter(_: &dyn SourceAdapter) {}
    }
}
