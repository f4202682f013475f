//! Input normalization helpers.

/// Title-case a city name: trimmed, first letter of every word upper-case.
///
/// A "word" starts after any non-alphabetic character, so apostrophes and
/// hyphens begin a new word.
///
/// ```
/// use skywatch_core::util::normalize_city;
///
/// assert_eq!(normalize_city("  new york "), "New York");
/// assert_eq!(normalize_city("WINSTON-SALEM"), "Winston-Salem");
/// ```
pub fn normalize_city(city: &str) -> String {
    let mut out = String::with_capacity(city.len());
    let mut at_word_start = true;
    for c in city.trim().chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

/// Upper-case and trim a country code; blank input becomes `None`.
pub fn normalize_country(country: Option<&str>) -> Option<String> {
    country
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_ascii_uppercase)
}

/// The provider's `q` parameter: `City,CC` or just `City`.
pub fn location_query(city: &str, country: Option<&str>) -> String {
    match country {
        Some(country) => format!("{},{}", city, country),
        None => city.to_string(),
    }
}
