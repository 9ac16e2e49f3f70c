//! Integer literal grammar: `0b[01]+` | `0x[0-9a-fA-F]+` | `0[0-7]+` | `[-]?[0-9]+` | `'.'`.

/// Parses one token as an integer literal. Returns `None` if the token doesn't match any of
/// the recognized literal forms (the caller then falls back to treating it as a symbolic
/// reference).
pub fn parse_int(token: &str) -> Option<i128> {
    if let Some(rest) = token.strip_prefix("0b") {
        return i128::from_str_radix(rest, 2).ok();
    }
    if let Some(rest) = token.strip_prefix("0x") {
        return i128::from_str_radix(rest, 16).ok();
    }
    if token.starts_with('0') && token != "0" && token.chars().skip(1).all(|c| c.is_ascii_digit()) {
        return i128::from_str_radix(&token[1..], 8).ok();
    }
    let chars: Vec<char> = token.chars().collect();
    if chars.len() == 3 && chars[0] == '\'' && chars[2] == '\'' {
        return Some(chars[1] as i128);
    }
    token.parse::<i128>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_binary_hex_octal_decimal_and_char_literals() {
        assert_eq!(parse_int("0b101"), Some(5));
        assert_eq!(parse_int("0x1F"), Some(31));
        assert_eq!(parse_int("017"), Some(15));
        assert_eq!(parse_int("-42"), Some(-42));
        assert_eq!(parse_int("'a'"), Some(97));
        assert_eq!(parse_int("0"), Some(0));
    }

    #[test]
    fn non_numeric_tokens_fall_through_as_symbolic() {
        assert_eq!(parse_int("skip"), None);
    }
}
