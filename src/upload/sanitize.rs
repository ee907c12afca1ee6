//! Filename sanitization
//!
//! Client-declared filenames are untrusted. These helpers reduce them to a
//! flat ASCII name that can be joined onto the scratch directory without
//! escaping it.

use unicode_normalization::UnicodeNormalization;

/// Base name used when sanitization leaves nothing behind
pub const FALLBACK_STEM: &str = "upload";

const RESERVED_DEVICE_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Split a filename into `(base, extension)`.
///
/// The extension starts at the last `.` of the final path component and keeps
/// the dot. Leading dots do not start an extension, so `.bashrc` has none.
pub fn split_extension(name: &str) -> (&str, &str) {
    let sep_index = name.rfind(['/', '\\']).map(|i| i + 1).unwrap_or(0);
    let Some(dot_index) = name.rfind('.') else {
        return (name, "");
    };
    if dot_index < sep_index {
        return (name, "");
    }

    let component = &name.as_bytes()[sep_index..dot_index];
    if component.iter().any(|b| *b != b'.') {
        (&name[..dot_index], &name[dot_index..])
    } else {
        (name, "")
    }
}

/// Lowercased extension (with the dot) of the name as the client sent it
pub fn original_extension(name: &str) -> String {
    split_extension(name).1.to_ascii_lowercase()
}

/// Reduce an arbitrary string to a safe, flat file name.
///
/// Compatibility-decomposed first so accented letters keep their base
/// letter. Path separators become underscores, anything outside `[A-Za-z0-9_.-]` is
/// dropped and leading/trailing dots and underscores are trimmed. The result
/// may be empty.
pub fn secure_filename(name: &str) -> String {
    let ascii: String = name.nfkd().filter(char::is_ascii).collect();
    let flattened = ascii.replace(['/', '\\'], " ");
    let joined = flattened.split_whitespace().collect::<Vec<_>>().join("_");

    let filtered: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    let trimmed = filtered.trim_matches(|c| c == '.' || c == '_');

    let stem = trimmed.split('.').next().unwrap_or_default();
    if !trimmed.is_empty() && RESERVED_DEVICE_NAMES.contains(&stem.to_ascii_uppercase().as_str()) {
        return format!("_{}", trimmed);
    }

    trimmed.to_string()
}

/// Sanitize a base name, substituting [`FALLBACK_STEM`] when nothing is left
pub fn sanitize_stem(base: &str) -> String {
    let stem = secure_filename(base);
    if stem.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        stem
    }
}
