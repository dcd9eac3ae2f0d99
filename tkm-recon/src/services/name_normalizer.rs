//! Name canonicalization for equality comparison
//!
//! The only equality used for names: roster names and document names are both
//! normalized before comparison. Case and whitespace are ignored and the
//! digit `0` compares equal to the letter `O`.

/// Canonical form of a name
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .flat_map(char::to_uppercase)
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == '0' { 'O' } else { c })
        .collect()
}

/// CJK ideograph (unified, extension A, compatibility)
pub fn is_ideograph(c: char) -> bool {
    matches!(c as u32, 0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0xF900..=0xFAFF)
}
