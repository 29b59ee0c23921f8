//! Free-text input validation for amounts and payment dates.

use chrono::NaiveDate;
use debttrack_storage::Money;

/// Accepted payment-date formats, tried in order; the first match wins.
pub const PAYMENT_DATE_FORMATS: [&str; 4] = ["%d.%m.%Y", "%d.%m.%y", "%d-%m-%Y", "%d-%m-%y"];

/// Parse a monetary amount, accepting only strictly positive values.
pub fn parse_positive_amount(text: &str) -> Option<Money> {
    Money::parse(text).filter(|amount| amount.is_positive())
}

/// Parse a payment date against the accepted formats.
///
/// chrono's `%Y` happily consumes two-digit years, which would shadow the
/// `%y` formats, so the year segment's width picks which half of the format
/// list applies.
pub fn parse_payment_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    let full_year = text
        .rsplit(['.', '-'])
        .next()
        .is_some_and(|year| year.len() == 4);

    PAYMENT_DATE_FORMATS
        .iter()
        .filter(|fmt| fmt.ends_with("%Y") == full_year)
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

/// Display form for payment dates.
pub fn format_payment_date(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}
