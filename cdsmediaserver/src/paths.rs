//! Virtual path helpers.
//!
//! A virtual path ending with `/` is a container; anything else is a leaf.
//! Leaves may carry sub-item segments separated by `///`
//! (see [`crate::virtual_items`]).

use cdssource::Item;

/// Separator between an item path and its sub-item segments.
pub const SUB_ITEM_SEPARATOR: &str = "///";

pub fn is_container(path: &str) -> bool {
    path.ends_with('/')
}

/// Positions of the `///` separators of `path`, ignoring the ones that
/// belong to a URL scheme (`file:///`).
pub(crate) fn separators(path: &str) -> Vec<usize> {
    let mut found = Vec::new();
    let mut from = 0;
    while let Some(rel) = path[from..].find(SUB_ITEM_SEPARATOR) {
        let pos = from + rel;
        from = pos + SUB_ITEM_SEPARATOR.len();
        if pos > 0 && path.as_bytes()[pos - 1] == b':' {
            continue;
        }
        found.push(pos);
    }
    found
}

/// Parent of a plain path: `/a/b/` -> `/a/`, `/a/c` -> `/a/`, `/` -> ``.
fn plain_parent(path: &str) -> String {
    if path.len() <= 1 {
        return String::new();
    }
    match path[..path.len() - 1].rfind('/') {
        Some(pos) => path[..=pos].to_string(),
        None => String::new(),
    }
}

/// Parent path of any virtual path, sub-item paths included.
///
/// The parent of a sub-item is the path with its last segment removed,
/// so `/a/movie///s#Seek///p&position=0#Play from 0:00:00` has parent
/// `/a/movie///s#Seek`, whose parent is `/a/movie`.
pub fn parent_path(path: &str) -> String {
    match separators(path).last() {
        Some(&pos) if pos > 0 => path[..pos].to_string(),
        _ => plain_parent(path),
    }
}

/// Display name of a path: its last segment without the trailing `/`.
pub fn display_name(path: &str) -> &str {
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    match trimmed.rfind('/') {
        Some(pos) => &trimmed[pos + 1..],
        None => trimmed,
    }
}

/// Checks that a child reported by a source for `container` is folded
/// into the virtual path space consistently: it must live under the
/// container, must not contain empty segments (which would collide with
/// the sub-item separator) and must carry a trailing `/` exactly when it
/// is a directory.
pub fn is_valid_child(container: &str, item: &Item) -> bool {
    let Some(rest) = item.path.strip_prefix(container) else {
        return false;
    };
    !rest.is_empty()
        && rest != "/"
        && !rest.starts_with('/')
        && !rest.contains("//")
        && item.is_dir == rest.ends_with('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdssource::ItemKind;

    #[test]
    fn test_parent_of_plain_paths() {
        assert_eq!(parent_path("/"), "");
        assert_eq!(parent_path("/Movies/"), "/");
        assert_eq!(parent_path("/Movies/Inception"), "/Movies/");
        assert_eq!(parent_path("/Movies/Series/S01/"), "/Movies/Series/");
    }

    #[test]
    fn test_parent_of_sub_items() {
        let seek = "/Movies/Inception///s#Seek";
        assert_eq!(parent_path(seek), "/Movies/Inception");
        assert_eq!(
            parent_path(&format!("{seek}///p&position=0#Play from 0:00:00")),
            seek
        );
        // a '/' inside a label does not confuse the parent computation
        assert_eq!(
            parent_path("/Movies/Inception///p&position=60000#Resume (0:01:00/2:30:00)"),
            "/Movies/Inception"
        );
    }

    #[test]
    fn test_url_schemes_are_not_separators() {
        assert!(separators("file:///tmp/a").is_empty());
        assert_eq!(separators("/a///p#Play"), vec![2]);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("/Movies/"), "Movies");
        assert_eq!(display_name("/Movies/Inception"), "Inception");
        assert_eq!(display_name("/"), "");
    }

    #[test]
    fn test_child_validation() {
        let ok_dir = Item::directory("/Movies/Series/", "Series");
        let ok_file = Item::file(ItemKind::Movie, "/Movies/Up", "Up", "m");
        let nested_mount = Item::directory("/Library/Music/", "Music");
        assert!(is_valid_child("/Movies/", &ok_dir));
        assert!(is_valid_child("/Movies/", &ok_file));
        assert!(is_valid_child("/", &nested_mount));

        let outside = Item::file(ItemKind::Movie, "/Other/Up", "Up", "m");
        let separator = Item::file(ItemKind::Movie, "/Movies/Up///p#x", "Up", "m");
        let dir_without_slash = Item::directory("/Movies/Series", "Series");
        let file_with_slash = Item::file(ItemKind::Movie, "/Movies/Up/", "Up", "m");
        let itself = Item::directory("/Movies/", "Movies");
        for bad in [outside, separator, dir_without_slash, file_with_slash, itself] {
            assert!(!is_valid_child("/Movies/", &bad), "{}", bad.path);
        }
    }
}
