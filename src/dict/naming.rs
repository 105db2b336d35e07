//! Mapping arbitrary names onto XML-safe ids.
//!
//! Output alphabet: ASCII letters, digits and `_`. Latin-1 letters with
//! diacritics fold to their base letter; everything else becomes `_`. The
//! first character is never a digit. The mapping is lossy, so callers must
//! check for collisions.

/// Mangle a source name into an id.
pub fn mangle_id(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let mapped = map_char(c);
        if out.is_empty() && mapped.is_ascii_digit() {
            out.push('_');
        } else {
            out.push(mapped);
        }
    }
    if out.is_empty() {
        out.push('_');
    }
    out
}

fn map_char(c: char) -> char {
    if c.is_ascii_alphanumeric() || c == '_' {
        return c;
    }
    match c {
        'À'..='Å' => 'A',
        'Ç' => 'C',
        'È'..='Ë' => 'E',
        'Ì'..='Ï' => 'I',
        'Ð' => 'D',
        'Ñ' => 'N',
        'Ò'..='Ö' | 'Ø' => 'O',
        'Ù'..='Ü' => 'U',
        'Ý' => 'Y',
        'à'..='å' => 'a',
        'ç' => 'c',
        'è'..='ë' => 'e',
        'ì'..='ï' => 'i',
        'ð' => 'd',
        'ñ' => 'n',
        'ò'..='ö' | 'ø' => 'o',
        'ù'..='ü' => 'u',
        'ý' | 'ÿ' => 'y',
        _ => '_',
    }
}
