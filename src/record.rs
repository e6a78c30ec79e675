//! Canonical output schema shared by all three sources.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::OracleError;

/// The fourteen fields the oracle is asked to fill, in output order.
pub const CANONICAL_FIELDS: [&str; 14] = [
    "Name",
    "Provider",
    "StreetAddress",
    "City",
    "ZipCode",
    "State",
    "Country",
    "Whitespace",
    "Area",
    "YearBuilt",
    "Power",
    "Scale",
    "Certifications",
    "URL",
];

/// Column header of the CSV output form.
pub const CSV_HEADER: [&str; 16] = [
    "unique_key",
    "source",
    "Name",
    "Provider",
    "StreetAddress",
    "City",
    "ZipCode",
    "State",
    "Country",
    "Whitespace",
    "Area",
    "YearBuilt",
    "Power",
    "Scale",
    "Certifications",
    "URL",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum SourceKind {
    /// datacentermap: state -> details[] (cities) -> addresses[]
    #[serde(rename = "datacentermap")]
    #[value(name = "map")]
    Map,
    /// datacenterhawk: markets -> market -> facilities -> facility
    #[serde(rename = "datacenterhawk")]
    #[value(name = "hawk")]
    Hawk,
    /// datacenters.com: facility id -> facility
    #[serde(rename = "datacenters.com")]
    #[value(name = "centers")]
    Centers,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::Map, SourceKind::Hawk, SourceKind::Centers];

    /// Label written into the `source` column.
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::Map => "datacentermap",
            SourceKind::Hawk => "datacenterhawk",
            SourceKind::Centers => "datacenters.com",
        }
    }

    /// Filename-safe dataset name.
    pub fn dataset(&self) -> &'static str {
        match self {
            SourceKind::Map => "datacentermap",
            SourceKind::Hawk => "datacenterhawk",
            SourceKind::Centers => "datacenters",
        }
    }

    pub fn default_input(&self) -> &'static str {
        match self {
            SourceKind::Map => "map_final.json",
            SourceKind::Hawk => "hawk_final.json",
            SourceKind::Centers => "centers_final.json",
        }
    }

    pub fn default_output(&self) -> &'static str {
        match self {
            SourceKind::Map => "map_extracted.json",
            SourceKind::Hawk => "hawk_extracted.json",
            SourceKind::Centers => "centers_extracted.json",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Field mapping returned by the extraction oracle.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalFields {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Provider")]
    pub provider: String,
    #[serde(rename = "StreetAddress")]
    pub street_address: String,
    #[serde(rename = "City")]
    pub city: String,
    #[serde(rename = "ZipCode")]
    pub zip_code: String,
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "Whitespace")]
    pub whitespace: String,
    #[serde(rename = "Area")]
    pub area: String,
    #[serde(rename = "YearBuilt")]
    pub year_built: String,
    #[serde(rename = "Power")]
    pub power: String,
    #[serde(rename = "Scale")]
    pub scale: String,
    #[serde(rename = "Certifications")]
    pub certifications: String,
    #[serde(rename = "URL")]
    pub url: String,
}

impl CanonicalFields {
    /// All fourteen fields set to the empty-string sentinel.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.values().iter().all(|v| v.is_empty())
    }

    /// Field values in `CANONICAL_FIELDS` order.
    pub fn values(&self) -> [&str; 14] {
        [
            &self.name,
            &self.provider,
            &self.street_address,
            &self.city,
            &self.zip_code,
            &self.state,
            &self.country,
            &self.whitespace,
            &self.area,
            &self.year_built,
            &self.power,
            &self.scale,
            &self.certifications,
            &self.url,
        ]
    }

    /// Builds the mapping from a parsed oracle response.
    ///
    /// Every canonical key must be present. Strings are taken as-is, numbers
    /// and booleans as their JSON text, `null` as empty. Nested arrays or
    /// objects are a shape violation. Extra keys are ignored.
    pub fn from_oracle_value(value: &Value) -> Result<Self, OracleError> {
        let object = value.as_object().ok_or_else(|| {
            OracleError::InvalidShape(format!("expected a JSON object, found {}", json_kind(value)))
        })?;

        let mut values: [String; 14] = Default::default();
        for (slot, field) in values.iter_mut().zip(CANONICAL_FIELDS) {
            let raw = object.get(field).ok_or(OracleError::MissingField(field))?;
            *slot = match raw {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => {
                    return Err(OracleError::InvalidShape(format!(
                        "field {:?} is {}, expected a string",
                        field,
                        json_kind(other)
                    )))
                }
            };
        }

        let [name, provider, street_address, city, zip_code, state, country, whitespace, area, year_built, power, scale, certifications, url] =
            values;
        Ok(Self {
            name,
            provider,
            street_address,
            city,
            zip_code,
            state,
            country,
            whitespace,
            area,
            year_built,
            power,
            scale,
            certifications,
            url,
        })
    }
}

/// The persisted unit: sixteen string columns, empty string for unknown.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub unique_key: String,
    pub source: SourceKind,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Provider")]
    pub provider: String,
    #[serde(rename = "StreetAddress")]
    pub street_address: String,
    #[serde(rename = "City")]
    pub city: String,
    #[serde(rename = "ZipCode")]
    pub zip_code: String,
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "Whitespace")]
    pub whitespace: String,
    #[serde(rename = "Area")]
    pub area: String,
    #[serde(rename = "YearBuilt")]
    pub year_built: String,
    #[serde(rename = "Power")]
    pub power: String,
    #[serde(rename = "Scale")]
    pub scale: String,
    #[serde(rename = "Certifications")]
    pub certifications: String,
    #[serde(rename = "URL")]
    pub url: String,
}

impl CanonicalRecord {
    /// Combines oracle output with the record identity. `URL` falls back to
    /// the raw record's own URL when the oracle left it empty.
    pub fn assemble(
        unique_key: String,
        source: SourceKind,
        fields: CanonicalFields,
        raw_url: &str,
    ) -> Self {
        let url = if fields.url.is_empty() {
            raw_url.to_string()
        } else {
            fields.url
        };

        Self {
            unique_key,
            source,
            name: fields.name,
            provider: fields.provider,
            street_address: fields.street_address,
            city: fields.city,
            zip_code: fields.zip_code,
            state: fields.state,
            country: fields.country,
            whitespace: fields.whitespace,
            area: fields.area,
            year_built: fields.year_built,
            power: fields.power,
            scale: fields.scale,
            certifications: fields.certifications,
            url,
        }
    }

    /// The fourteen oracle-derived columns, `URL` included.
    pub fn fields(&self) -> CanonicalFields {
        CanonicalFields {
            name: self.name.clone(),
            provider: self.provider.clone(),
            street_address: self.street_address.clone(),
            city: self.city.clone(),
            zip_code: self.zip_code.clone(),
            state: self.state.clone(),
            country: self.country.clone(),
            whitespace: self.whitespace.clone(),
            area: self.area.clone(),
            year_built: self.year_built.clone(),
            power: self.power.clone(),
            scale: self.scale.clone(),
            certifications: self.certifications.clone(),
            url: self.url.clone(),
        }
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_response() -> Value {
        json!({
            "Name": "F1",
            "Provider": "Equinix",
            "StreetAddress": "1 Main St",
            "City": "Santa Clara",
            "ZipCode": "95054",
            "State": "CA",
            "Country": "US",
            "Whitespace": "",
            "Area": "120000",
            "YearBuilt": "2012",
            "Power": "",
            "Scale": "Enterprise",
            "Certifications": "",
            "URL": ""
        })
    }

    #[test]
    fn test_fields_from_complete_response() {
        let fields = CanonicalFields::from_oracle_value(&full_response()).unwrap();
        assert_eq!(fields.name, "F1");
        assert_eq!(fields.zip_code, "95054");
        assert_eq!(fields.url, "");
    }

    #[test]
    fn test_missing_field_is_rejected() {
        let mut response = full_response();
        response.as_object_mut().unwrap().remove("YearBuilt");
        match CanonicalFields::from_oracle_value(&response) {
            Err(OracleError::MissingField(field)) => assert_eq!(field, "YearBuilt"),
            other => panic!("expected MissingField, got {:?}", other),
        }
    }

    #[test]
    fn test_scalar_values_are_stringified() {
        let mut response = full_response();
        response["YearBuilt"] = json!(2012);
        response["Power"] = Value::Null;
        response["Extra"] = json!("ignored");
        let fields = CanonicalFields::from_oracle_value(&response).unwrap();
        assert_eq!(fields.year_built, "2012");
        assert_eq!(fields.power, "");
    }

    #[test]
    fn test_nested_value_is_shape_error() {
        let mut response = full_response();
        response["Certifications"] = json!(["SOC 2", "ISO 27001"]);
        assert!(matches!(
            CanonicalFields::from_oracle_value(&response),
            Err(OracleError::InvalidShape(_))
        ));
        assert!(matches!(
            CanonicalFields::from_oracle_value(&json!(["not", "an", "object"])),
            Err(OracleError::InvalidShape(_))
        ));
    }

    #[test]
    fn test_assemble_url_fallback() {
        let record = CanonicalRecord::assemble(
            "CA_SantaClara_u1".to_string(),
            SourceKind::Map,
            CanonicalFields::empty(),
            "u1",
        );
        assert_eq!(record.url, "u1");

        let mut fields = CanonicalFields::empty();
        fields.url = "https://example.com/f1".to_string();
        let record = CanonicalRecord::assemble("k".to_string(), SourceKind::Map, fields, "u1");
        assert_eq!(record.url, "https://example.com/f1");
    }

    #[test]
    fn test_record_serializes_every_column_in_order() {
        let record = CanonicalRecord::assemble(
            "fac_9".to_string(),
            SourceKind::Centers,
            CanonicalFields::empty(),
            "",
        );
        let value = serde_json::to_value(&record).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, CSV_HEADER);
        assert_eq!(value["source"], "datacenters.com");
    }
}
