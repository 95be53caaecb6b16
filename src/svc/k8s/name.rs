//! # Name module
//!
//! This module provide helpers to derive names of kubernetes resources owned
//! by another one.

use sha2::{Digest, Sha256};

// -----------------------------------------------------------------------------
// Constants

/// longest name accepted for a resource which ends up in a DNS label
pub const MAX_NAME_LENGTH: usize = 63;

const DIGEST_LENGTH: usize = 8;

// -----------------------------------------------------------------------------
// Helpers functions

/// returns the concatenation of the parent and the suffix if it fits in
/// [`MAX_NAME_LENGTH`], otherwise the parent is cut and followed by a short
/// digest of both parts and then the whole suffix.
///
/// When the suffix alone leaves no room for the digest, the name is made of
/// the digest only.
pub fn child_name(parent: &str, suffix: &str) -> String {
    if parent.len() + suffix.len() <= MAX_NAME_LENGTH {
        return format!("{parent}{suffix}");
    }

    let digest = digest(parent, suffix);
    match MAX_NAME_LENGTH.checked_sub(suffix.len() + DIGEST_LENGTH) {
        Some(room) if room > 0 => {
            let mut end = room.min(parent.len());
            while !parent.is_char_boundary(end) {
                end -= 1;
            }

            format!("{}{}{}", &parent[..end], &digest[..DIGEST_LENGTH], suffix)
        }
        _ => digest[..MAX_NAME_LENGTH].to_string(),
    }
}

fn digest(parent: &str, suffix: &str) -> String {
    let mut hasher = Sha256::new();

    hasher.update(parent.as_bytes());
    hasher.update([0u8]);
    hasher.update(suffix.as_bytes());

    format!("{:x}", hasher.finalize())
}
