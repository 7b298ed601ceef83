//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Formats a decimal percentage with one fractional digit.
///
/// Usage in templates: `{{ overview.success_rate|percent }}`
#[askama::filter_fn]
pub fn percent(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    let raw = value.to_string();
    Ok(raw.parse::<rust_decimal::Decimal>().map_or_else(
        |_| format!("{raw}%"),
        |d| format!("{}%", d.round_dp(1)),
    ))
}
