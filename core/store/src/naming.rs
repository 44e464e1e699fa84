//! File names for directory entries.
//!
//! Every key maps to exactly one file name and back:
//! - references: `r` + 16 lowercase hex digits, e.g. `r000000000000002a.cdoc`
//! - names: `n` + lowercase hex of the UTF-8 bytes, e.g. `n6d616e6966657374.cdoc`
//!
//! Only lowercase characters are used so that names stay distinct on
//! case-insensitive filesystems.

use std::fmt::Write;

use coffer_common::{Key, Reference};

/// Extension shared by every persisted document.
pub const EXTENSION: &str = "cdoc";

const REFERENCE_PREFIX: char = 'r';
const NAME_PREFIX: char = 'n';

/// File name for a key.
pub fn file_name(key: &Key) -> String {
    match key {
        Key::Reference(reference) => {
            format!("{}{:016x}.{}", REFERENCE_PREFIX, reference.value(), EXTENSION)
        }
        Key::Name(name) => {
            let mut file = String::with_capacity(name.len() * 2 + 6);
            file.push(NAME_PREFIX);
            for byte in name.as_bytes() {
                let _ = write!(file, "{:02x}", byte);
            }
            file.push('.');
            file.push_str(EXTENSION);
            file
        }
    }
}

/// Key encoded by a file name, or `None` for files that are not entries.
pub fn parse_file_name(file: &str) -> Option<Key> {
    let stem = file.strip_suffix(EXTENSION)?.strip_suffix('.')?;
    let mut chars = stem.chars();
    let prefix = chars.next()?;
    let body = chars.as_str();

    match prefix {
        REFERENCE_PREFIX if body.len() == 16 && is_lower_hex(body) => {
            u64::from_str_radix(body, 16)
                .ok()
                .map(|value| Key::Reference(Reference::new(value)))
        }
        NAME_PREFIX if !body.is_empty() && body.len() % 2 == 0 && is_lower_hex(body) => {
            let bytes = (0..body.len())
                .step_by(2)
                .map(|i| u8::from_str_radix(&body[i..i + 2], 16))
                .collect::<Result<Vec<u8>, _>>()
                .ok()?;
            String::from_utf8(bytes).ok().map(Key::Name)
        }
        _ => None,
    }
}

fn is_lower_hex(s: &str) -> bool {
    s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
