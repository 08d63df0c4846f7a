use serde_json::Value;

use super::format_scalar;

/// Headline values, most specific first. Pointers are relative to the
/// `result` envelope.
const PRIORITY: [&str; 5] = [
    "/plan/monthly_installment",
    "/sweet_spot",
    "/eligible",
    "/monthly_installment",
    "/monthly_emi",
];

/// Print just the key answer value from the output.
pub fn print_minimal(value: &Value) {
    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    let headline = PRIORITY
        .iter()
        .filter_map(|ptr| result.pointer(ptr))
        .find(|v| !v.is_null() && !v.is_object());
    if let Some(val) = headline {
        println!("{}", format_scalar(val));
        return;
    }

    if let Some((key, val)) = result.as_object().and_then(|m| m.iter().next()) {
        println!("{}: {}", key, format_scalar(val));
        return;
    }

    println!("{}", format_scalar(result));
}
