/// Final component of a slash-separated repository path
pub fn file_name(path: &str) -> &str {
    path.rsplit_once('/').map_or(path, |(_, name)| name)
}

/// Short identifier embedded in a note file name.
///
/// Notes are named `<slug>-<16 hex chars>.<ext>`, so the identifier is the
/// last 16 characters of the stem. Older notes put it first; when the
/// trailing run contains a '-' the leading 16 characters are used instead.
pub fn unique_id(path: &str) -> &str {
    let name = file_name(path);
    let stem = match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    };
    let chars: Vec<(usize, char)> = stem.char_indices().collect();
    if chars.len() <= 16 {
        return stem;
    }
    let tail_start = chars[chars.len() - 16].0;
    let tail = &stem[tail_start..];
    if tail.contains('-') {
        &stem[..chars[16].0]
    } else {
        tail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("releasenotes/notes/a.yaml"), "a.yaml");
        assert_eq!(file_name("a.yaml"), "a.yaml");
    }

    #[test]
    fn test_unique_id_trailing() {
        assert_eq!(
            unique_id("releasenotes/notes/fix-bug-0123456789abcdef.yaml"),
            "0123456789abcdef"
        );
    }

    #[test]
    fn test_unique_id_legacy_leading() {
        assert_eq!(
            unique_id("releasenotes/notes/0123456789abcdef-fix-the-bug.yaml"),
            "0123456789abcdef"
        );
    }

    #[test]
    fn test_short_stem_is_whole_stem() {
        assert_eq!(unique_id("notes/short.yaml"), "short");
    }
}
