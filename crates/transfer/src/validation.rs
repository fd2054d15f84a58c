use std::path::{Component, Path};

/// Byte budget of a sanitized name. A 33-byte unique prefix plus this
/// stays within the common 255-byte file-name limit.
const MAX_NAME_BYTES: usize = 200;

/// Reduces a display name to a single safe path component.
///
/// The display name comes from the origin platform and is untrusted, so:
/// - directory parts are dropped (only the last normal component survives)
/// - parent-directory, root and prefix components never survive
/// - control characters and path separators become `_`
/// - empty results fall back to `"file"`
pub fn sanitize_file_name(display_name: &str) -> String {
    // Normalise Windows separators so `Path` splits them everywhere.
    let unified = display_name.replace('\\', "/");
    let last = Path::new(&unified)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir
            | Component::CurDir
            | Component::RootDir
            | Component::Prefix(_) => None,
        })
        .next_back()
        .unwrap_or_default();

    let mut cleaned = String::new();
    for c in last
        .chars()
        .map(|c| if c.is_control() || c == ':' { '_' } else { c })
    {
        if cleaned.len() + c.len_utf8() > MAX_NAME_BYTES {
            break;
        }
        cleaned.push(c);
    }

    let trimmed = cleaned.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_plain_names() {
        assert_eq!(sanitize_file_name("movie.mp4"), "movie.mp4");
        assert_eq!(sanitize_file_name("my report (final).pdf"), "my report (final).pdf");
    }

    #[test]
    fn strips_parent_dir_traversal() {
        assert_eq!(sanitize_file_name("../../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("sub/../../escape"), "escape");
    }

    #[test]
    fn strips_absolute_paths() {
        assert_eq!(sanitize_file_name("/tmp/malicious"), "malicious");
        assert_eq!(sanitize_file_name("C:\\Windows\\evil.dll"), "evil.dll");
    }

    #[test]
    fn replaces_control_characters() {
        assert_eq!(sanitize_file_name("a\nb\tc"), "a_b_c");
    }

    #[test]
    fn empty_and_dot_names_fall_back() {
        assert_eq!(sanitize_file_name(""), "file");
        assert_eq!(sanitize_file_name(".."), "file");
        assert_eq!(sanitize_file_name("   "), "file");
    }

    #[test]
    fn truncates_long_names() {
        let long = "x".repeat(500);
        assert_eq!(sanitize_file_name(&long).len(), MAX_NAME_BYTES);
    }

    #[test]
    fn truncates_multibyte_names_on_char_boundary() {
        let long = format!("{}.pdf", "д".repeat(110));
        let cleaned = sanitize_file_name(&long);
        assert!(cleaned.len() <= MAX_NAME_BYTES);
        assert_eq!(cleaned, "д".repeat(MAX_NAME_BYTES / 2));
    }
}
