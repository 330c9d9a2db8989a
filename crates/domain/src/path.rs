//! Rules for turning cart references into filesystem and object-store paths.

/// Returns true if `elem` can be used as a single path element.
///
/// Rejects anything containing `/`, `\` or `..`, and the empty string.
pub fn is_safe_path_element(elem: &str) -> bool {
    !elem.is_empty() && !elem.contains('/') && !elem.contains('\\') && !elem.contains("..")
}

/// Returns the file name of an asset reference: its last `/`-separated segment.
///
/// `https://api.example.com/output/abc123/model.stl` yields `model.stl`. The
/// result is not validated; pass it through [`is_safe_path_element`].
pub fn file_name_from_reference(reference: &str) -> &str {
    reference.rsplit('/').next().unwrap_or(reference)
}
