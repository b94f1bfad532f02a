//! Intake payload describing the equipment problem to analyze.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

/// Structured intake fields.
///
/// Every named field is optional; the analysis provider substitutes defaults
/// for missing ones. Keys this type does not know land in `extra` and are
/// carried through storage untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticInput {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub equipment_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub make: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub mileage_hours: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub error_codes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub symptoms: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub problem_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub when_started: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub frequency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub urgency_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub shop_quote_amount: Option<String>,

    /// Fields not modelled above.
    #[serde(flatten)]
    pub extra: BTreeMap<String, JsonValue>,
}

/// Accept strings, numbers and booleans; blank strings and `null` become `None`.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<JsonValue>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(JsonValue::Null) => None,
        Some(JsonValue::String(s)) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Some(JsonValue::Number(n)) => Some(n.to_string()),
        Some(JsonValue::Bool(b)) => Some(b.to_string()),
        Some(other) => Some(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_and_blanks_are_normalised() {
        let input: DiagnosticInput = serde_json::from_value(json!({
            "equipment_type": "Excavator",
            "year": 2019,
            "mileage_hours": "  ",
            "symptoms": null,
        }))
        .unwrap();

        assert_eq!(input.equipment_type.as_deref(), Some("Excavator"));
        assert_eq!(input.year.as_deref(), Some("2019"));
        assert_eq!(input.mileage_hours, None);
        assert_eq!(input.symptoms, None);
    }

    #[test]
    fn unknown_keys_are_kept_in_extra() {
        let input: DiagnosticInput = serde_json::from_value(json!({
            "make": "CAT",
            "vin": "1FTFW1E50JFA00000",
        }))
        .unwrap();

        assert_eq!(input.make.as_deref(), Some("CAT"));
        assert_eq!(input.extra.get("vin"), Some(&json!("1FTFW1E50JFA00000")));

        let back = serde_json::to_value(&input).unwrap();
        assert_eq!(back["vin"], "1FTFW1E50JFA00000");
        assert!(back.get("model").is_none());
    }
}
