//! Base-detecting numeric literal parsing (spec.md §4.2): decimal, `0x`
//! hex, and `0b` binary integers; range overflow and malformed-prefix
//! literals are reported as distinct errors.

pub fn parse_int_literal(text: &str) -> Result<i64, String> {
    if let Some(digits) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return parse_radix(text, digits, 16);
    }
    if let Some(digits) = text.strip_prefix("0b").or_else(|| text.strip_prefix("0B")) {
        return parse_radix(text, digits, 2);
    }
    i64::from_str_radix(text, 10).map_err(|_| format!("integer '{}' is out of range", text))
}

fn parse_radix(text: &str, digits: &str, radix: u32) -> Result<i64, String> {
    if digits.is_empty() {
        return Err(format!("could not parse '{}' as integer", text));
    }
    i64::from_str_radix(digits, radix).map_err(|_| format!("integer '{}' is out of range", text))
}

pub fn parse_float_literal(text: &str) -> Result<f64, String> {
    text.parse::<f64>()
        .map_err(|_| format!("could not parse '{}' as float", text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal() {
        assert_eq!(parse_int_literal("42"), Ok(42));
    }

    #[test]
    fn parses_hex_and_binary() {
        assert_eq!(parse_int_literal("0xFF"), Ok(255));
        assert_eq!(parse_int_literal("0b1010"), Ok(10));
    }

    #[test]
    fn reports_overflow() {
        assert!(parse_int_literal("99999999999999999999").is_err());
    }

    #[test]
    fn reports_empty_hex_prefix_as_malformed() {
        let err = parse_int_literal("0x").unwrap_err();
        assert!(err.contains("could not parse"));
    }

    #[test]
    fn parses_float() {
        assert_eq!(parse_float_literal("3.14"), Ok(3.14));
    }
}
