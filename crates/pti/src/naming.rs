//! Deriving on-disk names from client-supplied filenames.
//!
//! Client filenames are untrusted. Only the final path component survives,
//! and a collision is resolved by numbering: `cat.png`, `cat_1.png`,
//! `cat_2.png`, and so on.

/// Name used when the client filename reduces to nothing usable.
pub const FALLBACK_NAME: &str = "upload";

/// Reduce an untrusted filename to a single plain path component.
///
/// Both `/` and `\` count as separators regardless of platform and NUL
/// bytes are dropped. Leading dots are stripped, so a stored name is never
/// hidden and never looks like an in-progress write. A name with nothing
/// left becomes [`FALLBACK_NAME`].
pub fn sanitize_file_name(original: &str) -> String {
    let last = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .replace('\0', "");
    let trimmed = last.trim().trim_start_matches('.').trim_start();

    match trimmed {
        "" => FALLBACK_NAME.to_string(),
        name => name.to_string(),
    }
}

/// Split a file name into stem and extension (without the dot).
///
/// The extension is whatever follows the last dot; a leading dot does not
/// start an extension, so `.hidden` has none.
pub fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(0) | None => (name, None),
        Some(idx) => (&name[..idx], Some(&name[idx + 1..])),
    }
}

/// Candidate number `n` for `name`: `n == 0` is the name itself, anything
/// else inserts `_n` before the extension.
pub fn numbered_name(name: &str, n: u32) -> String {
    if n == 0 {
        return name.to_string();
    }
    match split_extension(name) {
        (stem, Some(ext)) => format!("{stem}_{n}.{ext}"),
        (stem, None) => format!("{stem}_{n}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_plain_names() {
        assert_eq!(sanitize_file_name("cat.png"), "cat.png");
        assert_eq!(sanitize_file_name("my cat.JPG"), "my cat.JPG");
    }

    #[test]
    fn strips_directories() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("/abs/path/dog.gif"), "dog.gif");
        assert_eq!(sanitize_file_name(r"C:\Users\me\pic.png"), "pic.png");
    }

    #[test]
    fn falls_back_for_empty_or_dots() {
        assert_eq!(sanitize_file_name(""), FALLBACK_NAME);
        assert_eq!(sanitize_file_name(".."), FALLBACK_NAME);
        assert_eq!(sanitize_file_name("dir/"), FALLBACK_NAME);
        assert_eq!(sanitize_file_name("  "), FALLBACK_NAME);
    }

    #[test]
    fn strips_leading_dots() {
        assert_eq!(sanitize_file_name(".upload-cat.png"), "upload-cat.png");
        assert_eq!(sanitize_file_name("..hidden.gif"), "hidden.gif");
        assert_eq!(sanitize_file_name("dir/. spaced.png"), "spaced.png");
        assert_eq!(sanitize_file_name("..."), FALLBACK_NAME);
    }

    #[test]
    fn drops_nul_bytes() {
        assert_eq!(sanitize_file_name("a\0b.png"), "ab.png");
    }

    #[test]
    fn splits_on_last_dot() {
        assert_eq!(split_extension("cat.png"), ("cat", Some("png")));
        assert_eq!(split_extension("a.tar.gz"), ("a.tar", Some("gz")));
        assert_eq!(split_extension("noext"), ("noext", None));
        assert_eq!(split_extension(".hidden"), (".hidden", None));
        assert_eq!(split_extension("trailing."), ("trailing", Some("")));
    }

    #[test]
    fn numbers_before_extension() {
        assert_eq!(numbered_name("cat.png", 0), "cat.png");
        assert_eq!(numbered_name("cat.png", 1), "cat_1.png");
        assert_eq!(numbered_name("a.tar.gz", 2), "a.tar_2.gz");
        assert_eq!(numbered_name("README", 3), "README_3");
    }
}
