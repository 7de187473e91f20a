/// Parse a raw cost price.
///
/// Whitespace is trimmed and every `$` is removed before parsing. Anything that
/// does not come out as a finite, strictly positive number yields `None`, and
/// the caller drops the row.
pub fn parse_cost(raw: &str) -> Option<f64> {
    let stripped = raw.trim().replace('$', "");
    match stripped.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => Some(v),
        _ => None,
    }
}
