//! Prompt construction for diagnostic analysis.

use std::fmt::Write as _;

use diagpro_core::DiagnosticInput;

/// Sections the provider is asked to produce, in order.
pub const REPORT_SECTIONS: [&str; 7] = [
    "Initial Assessment",
    "Diagnostic Tests to Perform",
    "Most Likely Causes",
    "Repair Recommendations",
    "Cost Estimates",
    "Safety Considerations",
    "Preventive Maintenance",
];

pub(crate) fn or_default<'a>(value: Option<&'a str>, default: &'a str) -> &'a str {
    value.unwrap_or(default)
}

/// Render the provider prompt for `input`.
pub fn build_prompt(input: &DiagnosticInput) -> String {
    let mut out = String::from(
        "You are an expert equipment diagnostic specialist. Analyze the following \
         equipment diagnostic data and provide a comprehensive report:\n\n",
    );

    let lines = [
        ("Equipment Type", or_default(input.equipment_type.as_deref(), "Unknown")),
        ("Make", or_default(input.make.as_deref(), "Not specified")),
        ("Model", or_default(input.model.as_deref(), "Not specified")),
        ("Year", or_default(input.year.as_deref(), "Not specified")),
        ("Mileage/Hours", or_default(input.mileage_hours.as_deref(), "Not specified")),
        ("Error Codes", or_default(input.error_codes.as_deref(), "None reported")),
        ("Symptoms", or_default(input.symptoms.as_deref(), "None described")),
        (
            "Problem Description",
            or_default(input.problem_description.as_deref(), "None provided"),
        ),
        ("When Started", or_default(input.when_started.as_deref(), "Not specified")),
        ("Frequency", or_default(input.frequency.as_deref(), "Not specified")),
        ("Urgency Level", or_default(input.urgency_level.as_deref(), "Normal")),
        ("Shop Quote", or_default(input.shop_quote_amount.as_deref(), "Not provided")),
    ];
    for (label, value) in lines {
        let _ = writeln!(out, "{label}: {value}");
    }

    for (key, value) in &input.extra {
        let rendered = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let _ = writeln!(out, "{key}: {rendered}");
    }

    out.push_str("\nProvide a detailed diagnostic report with:\n");
    for (i, section) in REPORT_SECTIONS.iter().enumerate() {
        let _ = writeln!(out, "{}. {section}", i + 1);
    }
    out.push_str("\nFormat as a professional diagnostic report.\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_get_defaults() {
        let prompt = build_prompt(&DiagnosticInput::default());
        assert!(prompt.contains("Equipment Type: Unknown"));
        assert!(prompt.contains("Error Codes: None reported"));
        assert!(prompt.contains("Urgency Level: Normal"));
        assert!(prompt.contains("7. Preventive Maintenance"));
    }

    #[test]
    fn known_and_extra_fields_are_rendered() {
        let mut input = DiagnosticInput {
            make: Some("Caterpillar".into()),
            error_codes: Some("P0420".into()),
            ..Default::default()
        };
        input.extra.insert("vin".into(), serde_json::json!("ABC123"));

        let prompt = build_prompt(&input);
        assert!(prompt.contains("Make: Caterpillar"));
        assert!(prompt.contains("Error Codes: P0420"));
        assert!(prompt.contains("vin: ABC123"));
    }
}
