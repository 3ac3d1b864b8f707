//! SQL text helpers for probes that interpolate server-provided values

/// Quote an identifier, doubling embedded double quotes
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote a string literal, doubling embedded single quotes
///
/// Assumes `standard_conforming_strings = on` (the default since 9.1).
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Whether `lsn` has the `XXXXXXXX/XXXXXXXX` textual form of a `pg_lsn`
pub fn is_lsn(lsn: &str) -> bool {
    let Some((high, low)) = lsn.split_once('/') else {
        return false;
    };

    let hex = |part: &str| !part.is_empty() && part.len() <= 8 && part.chars().all(|c| c.is_ascii_hexdigit());
    hex(high) && hex(low)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting() {
        assert_eq!(quote_ident("public"), "\"public\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(quote_literal("it's"), "'it''s'");
    }

    #[test]
    fn lsn_format() {
        assert!(is_lsn("0/16B3748"));
        assert!(is_lsn("1A/FFFFFFFF"));
        assert!(!is_lsn("0/16B3748'); DROP TABLE x; --"));
        assert!(!is_lsn("/1"));
        assert!(!is_lsn("16B3748"));
    }
}
