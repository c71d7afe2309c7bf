//! Relative paths with upward traversal.
//!
//! `Path::strip_prefix` only handles descendants. The template registry needs
//! names for templates living outside the bundled root (usually in the
//! caller's working directory), and the stylesheet stage hands the build
//! directory to the CSS toolchain relative to the working directory, so both
//! need `..` segments synthesized anchor-correctly.

use std::path::{Component, Path, PathBuf};

use crate::error::PathError;

/// Compute `R` such that `base.join(R)` names `path`.
///
/// Walks `base`, `base.parent()`, ... until the first ancestor that is a
/// component-wise prefix of `path`, then emits one `..` per step followed by
/// the remainder of `path`.
pub fn relative_to(path: &Path, base: &Path) -> Result<PathBuf, PathError> {
    let target = significant_components(path);
    let mut ancestor = significant_components(base);

    if ancestor.iter().any(|c| matches!(c, Component::ParentDir)) {
        return Err(PathError::InvalidBasePath {
            base: base.to_path_buf(),
        });
    }

    let mut steps = 0usize;
    while !is_prefix(&ancestor, &target) {
        // Only the anchor (root, drive prefix) or nothing left to walk.
        if !matches!(ancestor.last(), Some(Component::Normal(_))) {
            return Err(PathError::IncompatibleAnchors {
                path: path.to_path_buf(),
                base: base.to_path_buf(),
            });
        }
        ancestor.pop();
        steps += 1;
    }

    let mut relative = PathBuf::new();
    for _ in 0..steps {
        relative.push("..");
    }
    for component in &target[ancestor.len()..] {
        relative.push(component.as_os_str());
    }
    Ok(relative)
}

/// Components with `.` dropped; `Path::components` already folds repeated
/// separators and interior `.`.
fn significant_components(path: &Path) -> Vec<Component<'_>> {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

fn anchor_len(components: &[Component<'_>]) -> usize {
    components
        .iter()
        .take_while(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
        .count()
}

fn is_prefix(ancestor: &[Component<'_>], target: &[Component<'_>]) -> bool {
    let anchor = anchor_len(ancestor);
    anchor == anchor_len(target)
        && target.len() >= ancestor.len()
        && ancestor == &target[..ancestor.len()]
}
