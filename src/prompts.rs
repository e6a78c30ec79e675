// prompts.rs

pub const EXTRACTION_SYSTEM_PROMPT: &str =
    "You are a helpful AI that extracts structured information from JSON.";

/// Prompt asking the model to map one facility's JSON onto the fourteen
/// canonical fields.
pub fn facility_extraction_prompt(facility_json: &str) -> String {
    format!(
        r#"
You are an AI assistant that extracts specific standardized information from a facility's JSON data.
Below is the facility data delimited by triple backticks:
```
{facility}
```
Extract and return the following fields as a valid JSON object (use empty string if not found):
- Name
- Street Address
- City
- State
- Zip Code
- Provider
- Country(US, UK, etc.)
- Whitespace(Total building area in Sq. Ft.)
- Area(Building area in Sq. Ft.)
- Year Built(YYYY)
- Power(in KW)
- Scale(Hyperscale, Enterprise, etc.)
- Certifications
- URL

Output format (strict JSON):
{{
  "Name": "",
  "Provider": "",
  "StreetAddress": "",
  "City": "",
  "ZipCode": "",
  "State": "",
  "Country": "",
  "Whitespace": "",
  "Area": "",
  "YearBuilt": "",
  "Power": "",
  "Scale": "",
  "Certifications": "",
  "URL": ""
}}
Do not include any extra keys.
"#,
        facility = facility_json
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::CANONICAL_FIELDS;

    #[test]
    fn test_prompt_embeds_payload_and_every_field() {
        let prompt = facility_extraction_prompt(r#"{"name":"F1"}"#);
        assert!(prompt.contains("```\n{\"name\":\"F1\"}\n```"));
        for field in CANONICAL_FIELDS {
            assert!(prompt.contains(&format!("\"{}\": \"\"", field)), "missing {}", field);
        }
    }
}
