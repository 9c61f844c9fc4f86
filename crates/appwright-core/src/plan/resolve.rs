//! File-tree resolution: normalize a plan's file listing into an ordered
//! path sequence. Pure and deterministic; no side effects.

use super::FileTree;

/// Flatten a [`FileTree`] into an ordered list of relative paths.
///
/// A flat listing is returned unchanged. A categorized listing concatenates
/// each category's paths in the mapping's insertion order, skipping any
/// category whose value is not a list.
pub fn resolve_file_tree(tree: &FileTree) -> Vec<String> {
    match tree {
        FileTree::Flat(paths) => paths.clone(),
        FileTree::Categorized(map) => map
            .values()
            .filter_map(|value| value.as_array())
            .flatten()
            .filter_map(|entry| entry.as_str().map(str::to_string))
            .collect(),
    }
}
