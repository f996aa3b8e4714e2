use crate::models::QueryJoin;

/// Navigation property for a lookup attribute, derived by stripping a
/// trailing case-insensitive `id` (`primarycontactid` → `primarycontact`).
///
/// Best effort: custom lookups whose navigation property is not the
/// attribute name minus `id` produce an expand Dataverse will reject or
/// ignore. Joins can carry an explicit `navigationProperty` for those.
pub fn navigation_property(from_field: &str) -> &str {
    let len = from_field.len();
    if len > 2
        && from_field.is_char_boundary(len - 2)
        && from_field[len - 2..].eq_ignore_ascii_case("id")
    {
        &from_field[..len - 2]
    } else {
        from_field
    }
}

/// The explicit navigation property when the join names one, otherwise the
/// derived one.
pub fn navigation_property_for(join: &QueryJoin) -> &str {
    join.navigation_property
        .as_deref()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| navigation_property(&join.from_field))
}

/// Escapes an OData string literal body: single quotes are doubled.
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// `'value'` with the body escaped.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", escape_literal(value))
}

/// Percent-encodes the characters that would otherwise end or corrupt a
/// query-string parameter. Everything else is left for the HTTP client.
pub fn encode_param(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '%' => encoded.push_str("%25"),
            '&' => encoded.push_str("%26"),
            '#' => encoded.push_str("%23"),
            '+' => encoded.push_str("%2B"),
            other => encoded.push(other),
        }
    }
    encoded
}
