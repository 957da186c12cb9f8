//! Linux-safe filename sanitization.

const NAME_MAX: usize = 255;

fn is_separator_like(c: char) -> bool {
    c == '\0' || c == '/' || c == '\\' || c == ' ' || c == '\t' || c.is_control()
}

/// Sanitizes a candidate filename for safe use on Linux.
///
/// Separator-like characters become a single `_`, surrounding dots and
/// underscores are trimmed, and the result is cut to `NAME_MAX` bytes on a
/// char boundary.
pub fn sanitize_filename_for_linux(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if is_separator_like(c) {
            if !out.ends_with('_') {
                out.push('_');
            }
        } else {
            out.push(c);
        }
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == '_');
    let mut take = trimmed.len().min(NAME_MAX);
    while !trimmed.is_char_boundary(take) {
        take -= 1;
    }
    trimmed[..take].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separators_collapse_to_one_underscore() {
        assert_eq!(sanitize_filename_for_linux("a/b\\c.txt"), "a_b_c.txt");
        assert_eq!(sanitize_filename_for_linux("file \t\x00name.txt"), "file_name.txt");
    }

    #[test]
    fn trims_dots_and_spaces() {
        assert_eq!(sanitize_filename_for_linux("  ..  file.txt  ..  "), "file.txt");
    }

    #[test]
    fn long_names_are_cut_on_char_boundary() {
        let name = "é".repeat(200);
        let out = sanitize_filename_for_linux(&name);
        assert!(out.len() <= NAME_MAX);
        assert_eq!(out.len() % 2, 0);
    }
}
