//! Deterministic locally-synthesised report used when the provider fails.

use std::fmt::Write as _;

use diagpro_core::DiagnosticInput;

use crate::prompt::or_default;

/// Summarise the known intake fields and recommend professional follow-up.
///
/// Same input, same text: no timestamps, no error details.
pub fn fallback_report(input: &DiagnosticInput) -> String {
    let equipment = or_default(input.equipment_type.as_deref(), "Equipment");
    let mut out = String::new();

    let _ = writeln!(out, "DIAGNOSTIC REPORT - {equipment}");
    out.push('\n');
    out.push_str("PRELIMINARY ASSESSMENT\n\n");

    out.push_str("Equipment Details:\n");
    let _ = writeln!(
        out,
        "- Type: {}",
        or_default(input.equipment_type.as_deref(), "Unknown")
    );
    let _ = writeln!(
        out,
        "- Make/Model: {} {}",
        or_default(input.make.as_deref(), "N/A"),
        or_default(input.model.as_deref(), "N/A")
    );
    let _ = writeln!(out, "- Year: {}", or_default(input.year.as_deref(), "N/A"));
    let _ = writeln!(
        out,
        "- Mileage/Hours: {}",
        or_default(input.mileage_hours.as_deref(), "N/A")
    );
    out.push('\n');

    out.push_str("Reported Issues:\n");
    let issues = [
        ("Error Codes", input.error_codes.as_deref(), "None reported"),
        ("Symptoms", input.symptoms.as_deref(), "None described"),
        ("Problem Description", input.problem_description.as_deref(), "None provided"),
        ("When Started", input.when_started.as_deref(), "Not specified"),
        ("Frequency", input.frequency.as_deref(), "Not specified"),
        ("Urgency Level", input.urgency_level.as_deref(), "Normal"),
    ];
    for (label, value, default) in issues {
        let _ = writeln!(out, "- {label}: {}", or_default(value, default));
    }
    out.push('\n');

    out.push_str(
        "DIAGNOSTIC RECOMMENDATIONS\n\n\
         1. Initial Assessment\n\
         Based on the reported symptoms and error codes, this requires professional diagnostic attention.\n\n\
         2. Diagnostic Tests Recommended\n\
         - Visual inspection of affected components\n\
         - Computer diagnostic scan for error codes\n\
         - Performance testing under various conditions\n\n\
         3. Most Likely Causes\n\
         - Component wear and tear\n\
         - Electrical system issues\n\
         - Software/calibration problems\n\n\
         4. Repair Recommendations\n\
         Contact a certified technician for detailed diagnosis and repair estimate.\n\n\
         5. Cost Estimates\n\
         Repair costs will depend on the technician's findings.\n\n\
         6. Safety Considerations\n\
         If symptoms worsen, discontinue use and seek immediate professional attention.\n\n\
         7. Preventive Maintenance\n\
         Follow the manufacturer's recommended maintenance schedule.\n\n\
         Note: This is a preliminary assessment. Professional diagnosis recommended.\n",
    );
    out
}
