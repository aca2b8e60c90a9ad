use toml::{Table, Value};

/// Build the environment layer from variables.
///
/// With a prefix, only `{PREFIX}_*` variables are taken and the prefix is
/// stripped: `MYAPP_LOGTAGS` becomes `logtags`. Without a prefix every
/// variable is taken as is. Keys are lowercased, the store being
/// case-insensitive.
///
/// Values are parsed heuristically: bool > integer > float > string.
///
/// Takes an iterator so tests can pass synthetic data instead of `std::env::vars()`.
pub fn env_to_table(prefix: Option<&str>, vars: impl IntoIterator<Item = (String, String)>) -> Table {
    let needle = prefix.map(|p| format!("{}_", p.to_uppercase()));
    let mut table = Table::new();

    for (key, value) in vars {
        let rest = match &needle {
            Some(needle) => match key.strip_prefix(needle.as_str()) {
                Some(rest) => rest,
                None => continue,
            },
            None => key.as_str(),
        };
        if rest.is_empty() {
            continue;
        }
        table.insert(rest.to_lowercase(), parse_env_value(&value));
    }

    table
}

fn parse_env_value(s: &str) -> Value {
    if s.eq_ignore_ascii_case("true") {
        return Value::Boolean(true);
    }
    if s.eq_ignore_ascii_case("false") {
        return Value::Boolean(false);
    }
    if let Ok(i) = s.parse::<i64>() {
        return Value::Integer(i);
    }
    // "NaN" and "inf" parse as floats; require a dot.
    if s.contains('.')
        && let Ok(f) = s.parse::<f64>()
    {
        return Value::Float(f);
    }
    Value::String(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn prefixed_key_stripped_and_lowercased() {
        let table = env_to_table(Some("MYAPP"), vars(&[("MYAPP_LOGTAGS", "net,db")]));
        assert_eq!(table["logtags"].as_str(), Some("net,db"));
    }

    #[test]
    fn prefix_is_case_insensitive_on_our_side() {
        let table = env_to_table(Some("myapp"), vars(&[("MYAPP_PORT", "80")]));
        assert_eq!(table["port"].as_integer(), Some(80));
    }

    #[test]
    fn other_prefixes_ignored() {
        let table = env_to_table(Some("MYAPP"), vars(&[("OTHER_HOST", "x"), ("MYAPP_", "y")]));
        assert!(table.is_empty());
    }

    #[test]
    fn no_prefix_takes_everything() {
        let table = env_to_table(None, vars(&[("VERBOSE", "true"), ("Count", "3")]));
        assert_eq!(table["verbose"].as_bool(), Some(true));
        assert_eq!(table["count"].as_integer(), Some(3));
    }

    #[test]
    fn value_heuristics() {
        let table = env_to_table(
            Some("A"),
            vars(&[
                ("A_FLAG", "FALSE"),
                ("A_NEG", "-5"),
                ("A_RATE", "1.5"),
                ("A_NAN", "NaN"),
                ("A_NAME", "hello world"),
            ]),
        );
        assert_eq!(table["flag"].as_bool(), Some(false));
        assert_eq!(table["neg"].as_integer(), Some(-5));
        assert_eq!(table["rate"].as_float(), Some(1.5));
        assert_eq!(table["nan"].as_str(), Some("NaN"));
        assert_eq!(table["name"].as_str(), Some("hello world"));
    }
}
