//! Settings tree types and dotted-path addressing
//!
//! A settings tree is a JSON object. Leaves are strings, numbers, booleans,
//! null or arrays; nested objects form subtrees. Paths such as
//! `window.width` address a value by splitting on `.` and descending one
//! object per segment.

use serde_json::{Map, Value};

/// A single settings value (tagged union over the JSON types)
pub type ConfigValue = Value;

/// A settings tree: ordered mapping from key to value
pub type ConfigTree = Map<String, Value>;

/// Separator between segments of a dotted path
pub const PATH_SEPARATOR: char = '.';

/// Split a dotted path into segments.
///
/// Always yields at least one segment. Empty segments are kept, so
/// `"a..b"` addresses the key `""` inside `a`.
pub fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split(PATH_SEPARATOR)
}

/// Resolve a dotted path against a tree.
///
/// Returns `None` as soon as a segment is missing or the current node is
/// not an object. Never mutates.
pub fn lookup<'a>(tree: &'a ConfigTree, path: &str) -> Option<&'a ConfigValue> {
    let mut segments = split_path(path);
    let mut current = tree.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Assign a value at a dotted path, creating intermediate objects.
///
/// Any intermediate node that is absent or not an object is replaced by an
/// empty object, so assignment never fails.
pub fn assign(tree: &mut ConfigTree, path: &str, value: ConfigValue) {
    let segments: Vec<&str> = split_path(path).collect();
    assign_segments(tree, &segments, value);
}

fn assign_segments(node: &mut ConfigTree, segments: &[&str], value: ConfigValue) {
    match segments {
        [] => {}
        [last] => {
            node.insert((*last).to_string(), value);
        }
        [first, rest @ ..] => {
            if let Some(Value::Object(child)) = node.get_mut(*first) {
                return assign_segments(child, rest, value);
            }

            // Absent or not an object: replace in place with a fresh subtree
            let mut child = ConfigTree::new();
            assign_segments(&mut child, rest, value);
            node.insert((*first).to_string(), Value::Object(child));
        }
    }
}

/// Merge `overlay` over `base`, one level deep.
///
/// Each top-level key of `overlay` replaces the whole value under that key
/// in `base`; nested objects are not merged key by key.
pub fn shallow_merge(base: &mut ConfigTree, overlay: ConfigTree) {
    for (key, value) in overlay {
        base.insert(key, value);
    }
}
