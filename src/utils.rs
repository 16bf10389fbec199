use std::path::{Component, Path};

/// Normalizes a configured template path into the slash separated prefix used to select a
/// sub-tree. `.` segments are dropped and `..` pops the previous segment; the source root
/// itself becomes the empty string.
pub fn normalize_prefix(source: &str) -> String {
    let mut segments: Vec<String> = Vec::new();

    for component in Path::new(source).components() {
        match component {
            // Skip the current-dir marker "."
            Component::CurDir => {}

            // For "..", pop the last component if possible
            Component::ParentDir => {
                segments.pop();
            }

            Component::Normal(segment) => segments.push(segment.to_string_lossy().into_owned()),

            // Roots and prefixes cannot escape the template source
            Component::RootDir | Component::Prefix(_) => {}
        }
    }

    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_prefix_cases() {
        assert_eq!(normalize_prefix("templates/cli"), "templates/cli");
        assert_eq!(normalize_prefix("./templates/./cli/"), "templates/cli");
        assert_eq!(normalize_prefix("templates/../cli"), "cli");
        assert_eq!(normalize_prefix("/abs/path"), "abs/path");
        assert_eq!(normalize_prefix("."), "");
        assert_eq!(normalize_prefix("../.."), "");
    }
}
