//! Composite item identifiers.
//!
//! An id is `marca-modelo-tamanho-cor`, lower-cased, with whitespace runs
//! collapsed to a single hyphen and every character outside `[a-z0-9-]`
//! removed. The same four fields always give the same id, in any partition.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
    static ref NON_ID_CHAR: Regex = Regex::new(r"[^a-z0-9-]").unwrap();
}

/// Derive the identifier for four descriptive fields.
///
/// Returns an empty string when no letter or digit survives normalization
/// (all four fields empty, or only symbols); callers treat that as "no id".
pub fn derive_id(marca: &str, modelo: &str, tamanho: &str, cor: &str) -> String {
    let joined = format!("{}-{}-{}-{}", marca, modelo, tamanho, cor).to_lowercase();
    let hyphenated = WHITESPACE_RUN.replace_all(&joined, "-");
    let id = NON_ID_CHAR.replace_all(&hyphenated, "");
    if id.chars().all(|c| c == '-') {
        return String::new();
    }
    id.into_owned()
}

/// Whether an id is missing for the purpose of lookups.
pub fn is_blank_id(id: &str) -> bool {
    id.trim().is_empty()
}
