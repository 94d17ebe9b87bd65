//! Identity key derivation for deduplication
//!
//! Every candidate entering the merge pool is keyed by the first non-empty
//! identity field, in priority order:
//!
//! 1. `email` (normalized lowercase)
//! 2. `platformUsername` (platform-qualified, so "ada" on GitHub and "ada"
//!    on Kaggle stay distinct people)
//! 3. `normalizedName` (lowercased, accents folded, punctuation stripped)
//!
//! The key is the single canonical dedup mechanism; nothing else in the
//! pipeline compares identities.

use std::fmt;

use crate::models::candidate::CandidateRecord;

/// Composite dedup key
///
/// The string form is stable and used directly as the persistence key, so
/// the prefix (`email:` / `user:` / `name:`) is part of the contract.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey(String);

impl IdentityKey {
    /// Derive the key for a record, or None when no identity field is filled
    ///
    /// Records without any identity must not enter the merge pool; callers
    /// treat None as a rejection, not an error.
    pub fn derive(record: &CandidateRecord) -> Option<IdentityKey> {
        if let Some(email) = non_empty(&record.email) {
            return Some(IdentityKey(format!("email:{}", email.to_lowercase())));
        }
        if let Some(username) = non_empty(&record.platform_username) {
            return Some(IdentityKey(format!(
                "user:{}:{}",
                record.source_platform.as_str(),
                username.to_lowercase()
            )));
        }
        if let Some(name) = non_empty(&record.normalized_name) {
            let normalized = normalize_name(name);
            if !normalized.is_empty() {
                return Some(IdentityKey(format!("name:{}", normalized)));
            }
        }
        // A display name without the normalized field still counts
        if let Some(name) = non_empty(&record.name) {
            let normalized = normalize_name(name);
            if !normalized.is_empty() {
                return Some(IdentityKey(format!("name:{}", normalized)));
            }
        }
        None
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Normalize a display name for identity comparison
///
/// Lowercases, folds common Latin accents to ASCII, maps remaining
/// punctuation to spaces, and collapses whitespace. "José Núñez-Smith" and
/// "Jose Nunez Smith" produce the same key.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_space = true;
    for c in name.chars() {
        match fold_accent(c) {
            Some(folded) => {
                for fc in folded.chars() {
                    push_normalized(&mut out, fc, &mut last_was_space);
                }
            }
            None => push_normalized(&mut out, c, &mut last_was_space),
        }
    }
    out.trim_end().to_string()
}

fn push_normalized(out: &mut String, c: char, last_was_space: &mut bool) {
    for lc in c.to_lowercase() {
        if lc.is_alphanumeric() {
            out.push(lc);
            *last_was_space = false;
        } else if !*last_was_space {
            out.push(' ');
            *last_was_space = true;
        }
    }
}

/// Fold common Latin-1 / Latin Extended-A accented characters to ASCII
///
/// Covers the characters that actually occur in developer profile names;
/// anything unknown passes through unchanged and keeps its unicode identity.
fn fold_accent(c: char) -> Option<&'static str> {
    let folded = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => "a",
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' | 'Ā' | 'Ă' | 'Ą' => "A",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => "e",
        'È' | 'É' | 'Ê' | 'Ë' | 'Ē' | 'Ĕ' | 'Ė' | 'Ę' | 'Ě' => "E",
        'ì' | 'í' | 'î' | 'ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' => "i",
        'Ì' | 'Í' | 'Î' | 'Ï' | 'Ĩ' | 'Ī' | 'Ĭ' | 'Į' => "I",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => "o",
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' | 'Ō' | 'Ŏ' | 'Ő' => "O",
        'ù' | 'ú' | 'û' | 'ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => "u",
        'Ù' | 'Ú' | 'Û' | 'Ü' | 'Ũ' | 'Ū' | 'Ŭ' | 'Ů' | 'Ű' | 'Ų' => "U",
        'ý' | 'ÿ' => "y",
        'Ý' | 'Ÿ' => "Y",
        'ñ' | 'ń' | 'ņ' | 'ň' => "n",
        'Ñ' | 'Ń' | 'Ņ' | 'Ň' => "N",
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => "c",
        'Ç' | 'Ć' | 'Ĉ' | 'Ċ' | 'Č' => "C",
        'ś' | 'ŝ' | 'ş' | 'š' => "s",
        'Ś' | 'Ŝ' | 'Ş' | 'Š' => "S",
        'ź' | 'ż' | 'ž' => "z",
        'Ź' | 'Ż' | 'Ž' => "Z",
        'ł' => "l",
        'Ł' => "L",
        'đ' => "d",
        'Đ' => "D",
        'ŕ' | 'ř' => "r",
        'Ŕ' | 'Ř' => "R",
        'ť' | 'ţ' => "t",
        'Ť' | 'Ţ' => "T",
        'ğ' | 'ĝ' | 'ġ' | 'ģ' => "g",
        'Ğ' | 'Ĝ' | 'Ġ' | 'Ģ' => "G",
        'ß' => "ss",
        'æ' => "ae",
        'Æ' => "AE",
        'œ' => "oe",
        'Œ' => "OE",
        _ => return None,
    };
    Some(folded)
}
