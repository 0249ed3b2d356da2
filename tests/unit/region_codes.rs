//! Unit tests for region and industry code canonicalization

use statfin_ingest::normalize::{normalize_industry_code, normalize_region_code, WHOLE_COUNTRY_CODE};

#[test]
fn test_whole_country_spellings() {
    for code in ["SSS", "sss", "KOKO MAA", "koko maa", " Whole country "] {
        assert_eq!(normalize_region_code(code), WHOLE_COUNTRY_CODE, "{code}");
    }
}

#[test]
fn test_region_prefix() {
    assert_eq!(normalize_region_code("MK01"), "01");
    assert_eq!(normalize_region_code("mk21"), "21");
    // prefix without digits is not a region code prefix
    assert_eq!(normalize_region_code("MKX"), "MKX");
    assert_eq!(normalize_region_code("MK"), "MK");
}

#[test]
fn test_other_codes_pass_through_trimmed() {
    assert_eq!(normalize_region_code(" KU091 "), "KU091");
    assert_eq!(normalize_region_code("091"), "091");
}

#[test]
fn test_industry_codes() {
    assert_eq!(normalize_industry_code("TOL_C"), "C");
    assert_eq!(normalize_industry_code("tol2008_47"), "47");
    assert_eq!(normalize_industry_code(" c "), "C");
    assert_eq!(normalize_industry_code("SSS"), "SSS");
}
