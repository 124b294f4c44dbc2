//! UUID utilities

use uuid::Uuid;

/// Length of the hyphenated textual form (`8-4-4-4-12`)
pub const HYPHENATED_LEN: usize = 36;

const HYPHEN_POSITIONS: [usize; 4] = [8, 13, 18, 23];

/// Parse UUID from string
pub fn parse(s: &str) -> Result<Uuid, uuid::Error> {
    Uuid::parse_str(s)
}

/// True if `s` is exactly the hyphenated `8-4-4-4-12` hexadecimal form.
///
/// `Uuid::parse_str` also accepts the simple, braced and URN forms; public
/// identifiers only ever use the hyphenated one.
pub fn is_hyphenated(s: &str) -> bool {
    if s.len() != HYPHENATED_LEN {
        return false;
    }

    s.bytes().enumerate().all(|(i, b)| {
        if HYPHEN_POSITIONS.contains(&i) {
            b == b'-'
        } else {
            b.is_ascii_hexdigit()
        }
    })
}
