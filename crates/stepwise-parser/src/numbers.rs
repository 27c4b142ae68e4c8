//! Lenient number reading for attribute values: the leading numeric prefix
//! counts and trailing text is ignored, so `"2 times"` reads as 2.

/// Reads a leading integer, after optional whitespace and sign.
pub(crate) fn parse_int_prefix(value: &str) -> Option<i64> {
    let value = value.trim_start();
    let sign_len = usize::from(value.starts_with(['+', '-']));
    let digits_len = value[sign_len..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits_len == 0 {
        return None;
    }
    value[..sign_len + digits_len].parse().ok()
}

/// Reads the longest leading decimal number, after optional whitespace.
pub(crate) fn parse_float_prefix(value: &str) -> Option<f64> {
    let value = value.trim_start();
    let candidate_len = value
        .bytes()
        .take_while(|byte| {
            byte.is_ascii_digit() || matches!(byte, b'+' | b'-' | b'.' | b'e' | b'E')
        })
        .count();
    (1..=candidate_len)
        .rev()
        .find_map(|len| value[..len].parse::<f64>().ok())
        .filter(|number| number.is_finite())
}
