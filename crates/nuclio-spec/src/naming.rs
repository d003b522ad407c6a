//! Translation between internal field names (`snake_case`) and the names used
//! on the wire (`camelCase`).

/// Separator between the words of an internal field name.
pub const WORD_SEPARATOR: char = '_';

/// Translates an internal field name into its wire name.
///
/// The first word is kept as-is, every following word gets its first character
/// uppercased and the remainder lowercased.
///
/// ```
/// use nuclio_spec::naming::to_wire_name;
///
/// assert_eq!(to_wire_name("max_replicas"), "maxReplicas");
/// assert_eq!(to_wire_name("x"), "x");
/// assert_eq!(to_wire_name(""), "");
/// ```
pub fn to_wire_name(internal_name: &str) -> String {
    let mut words = internal_name.split(WORD_SEPARATOR);
    let mut wire_name = words.next().unwrap_or_default().to_owned();

    for word in words {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            wire_name.extend(first.to_uppercase());
            wire_name.extend(chars.flat_map(char::to_lowercase));
        }
    }

    wire_name
}
