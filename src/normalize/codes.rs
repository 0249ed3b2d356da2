//! Region and industry code canonicalization

/// Canonical whole-country region code.
pub const WHOLE_COUNTRY_CODE: &str = "SSS";

/// Spellings of the whole-country region, compared case-insensitively.
const WHOLE_COUNTRY_ALIASES: &[&str] = &["SSS", "KOKO MAA", "WHOLE COUNTRY"];

/// Region-type markers stripped when followed by digits ("MK01" is maakunta 01).
const REGION_PREFIXES: &[&str] = &["MK"];

/// Industry classification prefixes, e.g. "TOL2008_C" is "C".
const INDUSTRY_PREFIXES: &[&str] = &["TOL_", "TOL2008_"];

/// Canonicalize a region code.
///
/// ```
/// use statfin_ingest::normalize::normalize_region_code;
///
/// assert_eq!(normalize_region_code("KOKO MAA"), "SSS");
/// assert_eq!(normalize_region_code("MK01"), "01");
/// assert_eq!(normalize_region_code("091"), "091");
/// ```
pub fn normalize_region_code(code: &str) -> String {
    let trimmed = code.trim();
    let upper = trimmed.to_uppercase();

    if WHOLE_COUNTRY_ALIASES.contains(&upper.as_str()) {
        return WHOLE_COUNTRY_CODE.to_string();
    }

    for prefix in REGION_PREFIXES {
        if let Some(rest) = upper.strip_prefix(prefix) {
            if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
                return rest.to_string();
            }
        }
    }

    trimmed.to_string()
}

/// Canonicalize an industry code: uppercase, classification prefix removed.
pub fn normalize_industry_code(code: &str) -> String {
    let upper = code.trim().to_uppercase();
    INDUSTRY_PREFIXES
        .iter()
        .find_map(|prefix| upper.strip_prefix(prefix))
        .map(str::to_string)
        .unwrap_or(upper)
}
