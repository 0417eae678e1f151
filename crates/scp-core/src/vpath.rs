//! Pure string manipulation of virtual paths (`spec.md` §3's `DirectoryStack`
//! and the download engine's naming rules). These operate on the
//! user-visible `/`-separated virtual path, never on the resolved,
//! backend-specific real path.

/// Joins `base` and `name`, matching `path.Join(dest, name)` in `spec.md`
/// §3/§4.3.1.
#[must_use]
pub fn join(base: &str, name: &str) -> String {
    if base.is_empty() || base == "/" {
        format!("/{name}")
    } else {
        format!("{}/{name}", base.trim_end_matches('/'))
    }
}

/// The parent of `virtual_path`, matching `path.Join(dest, "..")`.
#[must_use]
pub fn parent(virtual_path: &str) -> String {
    let trimmed = virtual_path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => "/".to_owned(),
        Some(idx) => trimmed[..idx].to_owned(),
        None => "/".to_owned(),
    }
}

/// The final path component of `virtual_path`.
#[must_use]
pub fn name(virtual_path: &str) -> String {
    let trimmed = virtual_path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => trimmed[idx + 1..].to_owned(),
        None => trimmed.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_extends_base_with_name() {
        assert_eq!(join("/base", "sub"), "/base/sub");
        assert_eq!(join("/", "a"), "/a");
        assert_eq!(join("/base/", "sub"), "/base/sub");
    }

    #[test]
    fn parent_walks_up_one_level() {
        assert_eq!(parent("/base/sub"), "/base");
        assert_eq!(parent("/base"), "/");
        assert_eq!(parent("/"), "/");
    }

    #[test]
    fn name_returns_final_component() {
        assert_eq!(name("/base/sub"), "sub");
        assert_eq!(name("/base"), "base");
        assert_eq!(name("/"), "");
    }
}
