//! Directory-tree reconstruction of a recursive dataset listing
//!
//! The listing endpoint answers with one nested JSON document: a root
//! directory whose `contents` array mixes file and directory descriptors,
//! discriminated by a `type` field. This module rebuilds that document as a
//! flat node arena in depth-first pre-order, with index-based parent links
//! and last-sibling flags, ready for indented-text or tabular rendering.
//!
//! Missing descriptor fields never fail the build; they surface as literal
//! `UNKNOWN <field>` placeholders. The only structural error is a directory
//! without a `contents` array.

use serde::Serialize;
use serde_json::Value;

const BRANCH_MIDDLE: &str = "├──";
const BRANCH_LAST: &str = "└──";
const SEGMENT_PIPE: &str = "│   ";
const SEGMENT_BLANK: &str = "    ";

const UNKNOWN_NAME: &str = "UNKNOWN name";
const UNKNOWN_SIZE: &str = "UNKNOWN size";
const UNKNOWN_CREATE_TIME: &str = "UNKNOWN create_time";
const UNKNOWN_CHECKSUM: &str = "UNKNOWN checksum";

/// File descriptor inside a listing. Fields the server left out stay `None`
/// and render as placeholders.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub name: String,
    pub size: Option<u64>,
    pub create_time: Option<String>,
    pub checksum: Option<String>,
}

/// Directory descriptor. The name carries a trailing slash so that both the
/// tree rendering and path concatenation read naturally.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
}

/// One listing descriptor; the kind set is closed.
#[derive(Debug, Clone)]
pub enum ListingEntry {
    Directory(DirEntry),
    File(FileEntry),
}

impl ListingEntry {
    pub fn name(&self) -> &str {
        match self {
            ListingEntry::Directory(dir) => &dir.name,
            ListingEntry::File(file) => &file.name,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, ListingEntry::Directory(_))
    }
}

/// One node of the rebuilt tree.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub entry: ListingEntry,
    /// Arena index of the parent; `None` only for the root.
    pub parent: Option<usize>,
    /// Whether this node is the last of its siblings, for line drawing.
    pub is_last: bool,
    pub depth: usize,
}

/// Tabular rendering of one file node. Placeholders are already substituted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRow {
    pub name: String,
    pub path: String,
    pub size: String,
    pub create_time: String,
    pub checksum: String,
}

/// The flattened listing, nodes in depth-first pre-order.
#[derive(Debug)]
pub struct DirectoryTree {
    nodes: Vec<TreeNode>,
}

struct Frame<'a> {
    parent: usize,
    children: &'a [Value],
    next: usize,
}

impl DirectoryTree {
    /// Rebuild the tree from the listing endpoint's JSON document.
    ///
    /// Fails only when a directory descriptor has no `contents` array;
    /// every other irregularity degrades to a placeholder.
    pub fn from_listing(root: &Value) -> Result<Self, String> {
        let root_children = contents_of(root)?;
        let mut nodes = vec![TreeNode {
            entry: ListingEntry::Directory(decode_directory(root)),
            parent: None,
            is_last: false,
            depth: 0,
        }];

        let mut stack = vec![Frame {
            parent: 0,
            children: root_children,
            next: 0,
        }];

        // Pre-order with an explicit stack: a directory is pushed into the
        // arena before any of its descendants, siblings stay in listing
        // order.
        while !stack.is_empty() {
            let (parent, value, is_last) = {
                let frame = stack.last_mut().unwrap();
                let children = frame.children;
                if frame.next >= children.len() {
                    stack.pop();
                    continue;
                }
                let value = &children[frame.next];
                let is_last = frame.next + 1 == children.len();
                frame.next += 1;
                (frame.parent, value, is_last)
            };

            let depth = nodes[parent].depth + 1;

            if value.get("type").and_then(Value::as_str) == Some("directory") {
                let children = contents_of(value)?;
                let index = nodes.len();
                nodes.push(TreeNode {
                    entry: ListingEntry::Directory(decode_directory(value)),
                    parent: Some(parent),
                    is_last,
                    depth,
                });
                stack.push(Frame {
                    parent: index,
                    children,
                    next: 0,
                });
            } else {
                nodes.push(TreeNode {
                    entry: ListingEntry::File(decode_file(value)),
                    parent: Some(parent),
                    is_last,
                    depth,
                });
            }
        }

        Ok(DirectoryTree { nodes })
    }

    /// The nodes in traversal order.
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Indented-text form, one line per node.
    pub fn render_lines(&self) -> Vec<String> {
        (0..self.nodes.len()).map(|i| self.line(i)).collect()
    }

    fn line(&self, index: usize) -> String {
        let node = &self.nodes[index];

        if node.parent.is_none() {
            return node.entry.name().to_string();
        }

        let branch = if node.is_last {
            BRANCH_LAST
        } else {
            BRANCH_MIDDLE
        };
        let mut parts = vec![format!("{} {}", branch, node.entry.name())];

        // One segment per ancestor below the root, nearest first: a pipe
        // when that ancestor has further siblings, blank when it was last.
        let mut parent = node.parent;
        while let Some(idx) = parent {
            let ancestor = &self.nodes[idx];
            if ancestor.parent.is_none() {
                break;
            }
            parts.push(
                if ancestor.is_last {
                    SEGMENT_BLANK
                } else {
                    SEGMENT_PIPE
                }
                .to_string(),
            );
            parent = ancestor.parent;
        }

        parts.reverse();
        parts.concat()
    }

    /// Tabular form: one row per file node, directories produce none.
    pub fn file_rows(&self) -> Vec<FileRow> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(index, node)| match &node.entry {
                ListingEntry::File(file) => Some(FileRow {
                    name: file.name.clone(),
                    path: self.ancestor_path(index),
                    size: file
                        .size
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| UNKNOWN_SIZE.to_string()),
                    create_time: file
                        .create_time
                        .clone()
                        .unwrap_or_else(|| UNKNOWN_CREATE_TIME.to_string()),
                    checksum: file
                        .checksum
                        .clone()
                        .unwrap_or_else(|| UNKNOWN_CHECKSUM.to_string()),
                }),
                ListingEntry::Directory(_) => None,
            })
            .collect()
    }

    /// Concatenated ancestor directory names, root first. Directory names
    /// already end in a slash, so the result reads `root/sub/`.
    fn ancestor_path(&self, index: usize) -> String {
        let mut parts = Vec::new();
        let mut parent = self.nodes[index].parent;

        while let Some(idx) = parent {
            parts.push(self.nodes[idx].entry.name().to_string());
            parent = self.nodes[idx].parent;
        }

        parts.reverse();
        parts.concat()
    }
}

fn contents_of(value: &Value) -> Result<&[Value], String> {
    value
        .get("contents")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or_else(|| "listing directory entry has no 'contents' array".to_string())
}

fn decode_directory(value: &Value) -> DirEntry {
    let name = value
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN_NAME);

    DirEntry {
        name: format!("{name}/"),
    }
}

fn decode_file(value: &Value) -> FileEntry {
    FileEntry {
        name: value
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_NAME)
            .to_string(),
        size: value.get("size").and_then(Value::as_u64),
        create_time: value
            .get("create_time")
            .and_then(Value::as_str)
            .map(str::to_string),
        checksum: value
            .get("checksum")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample_listing() -> Value {
        json!({
            "name": "root",
            "type": "directory",
            "contents": [
                {"name": "a.txt", "type": "file", "size": 10, "create_time": "T", "checksum": "c"},
                {"name": "sub", "type": "directory", "contents": [
                    {"name": "b.txt", "type": "file", "size": 5, "create_time": "T2", "checksum": "c2"}
                ]}
            ]
        })
    }

    #[test]
    fn test_tabular_round_trip() {
        let tree = DirectoryTree::from_listing(&sample_listing()).unwrap();
        let rows = tree.file_rows();

        assert_eq!(
            rows,
            vec![
                FileRow {
                    name: "a.txt".to_string(),
                    path: "root/".to_string(),
                    size: "10".to_string(),
                    create_time: "T".to_string(),
                    checksum: "c".to_string(),
                },
                FileRow {
                    name: "b.txt".to_string(),
                    path: "root/sub/".to_string(),
                    size: "5".to_string(),
                    create_time: "T2".to_string(),
                    checksum: "c2".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_indented_text_rendering() {
        let tree = DirectoryTree::from_listing(&sample_listing()).unwrap();
        let lines = tree.render_lines();

        assert_eq!(
            lines,
            vec![
                "root/",
                "├── a.txt",
                "└── sub/",
                "    └── b.txt",
            ]
        );
    }

    #[test]
    fn test_pipe_segment_for_non_last_directory() {
        let listing = json!({
            "name": "root",
            "type": "directory",
            "contents": [
                {"name": "first", "type": "directory", "contents": [
                    {"name": "inner.txt", "type": "file", "size": 1, "create_time": "T", "checksum": "x"}
                ]},
                {"name": "last.txt", "type": "file", "size": 2, "create_time": "T", "checksum": "y"}
            ]
        });

        let tree = DirectoryTree::from_listing(&listing).unwrap();
        let lines = tree.render_lines();

        assert_eq!(
            lines,
            vec![
                "root/",
                "├── first/",
                "│   └── inner.txt",
                "└── last.txt",
            ]
        );
    }

    #[test]
    fn test_traversal_is_preorder_with_parent_links() {
        let tree = DirectoryTree::from_listing(&sample_listing()).unwrap();
        let nodes = tree.nodes();

        assert_eq!(nodes.len(), 4);
        assert!(nodes[0].parent.is_none());
        assert_eq!(nodes[0].depth, 0);

        // sub/ is yielded before its child, and both link back correctly
        assert_eq!(nodes[2].entry.name(), "sub/");
        assert_eq!(nodes[3].entry.name(), "b.txt");
        assert_eq!(nodes[3].parent, Some(2));
        assert_eq!(nodes[3].depth, 2);
        assert!(nodes[2].is_last);
    }

    #[test]
    fn test_missing_checksum_yields_placeholder() {
        let listing = json!({
            "name": "root",
            "type": "directory",
            "contents": [
                {"name": "a.txt", "type": "file", "size": 10, "create_time": "T"}
            ]
        });

        let tree = DirectoryTree::from_listing(&listing).unwrap();
        let rows = tree.file_rows();

        assert_eq!(rows[0].checksum, "UNKNOWN checksum");
        assert_eq!(rows[0].size, "10");
    }

    #[test]
    fn test_missing_name_and_size_yield_placeholders() {
        let listing = json!({
            "name": "root",
            "type": "directory",
            "contents": [
                {"type": "file"}
            ]
        });

        let tree = DirectoryTree::from_listing(&listing).unwrap();
        let rows = tree.file_rows();

        assert_eq!(rows[0].name, "UNKNOWN name");
        assert_eq!(rows[0].size, "UNKNOWN size");
        assert_eq!(rows[0].create_time, "UNKNOWN create_time");
    }

    #[test]
    fn test_non_list_contents_is_an_error() {
        let listing = json!({
            "name": "root",
            "type": "directory",
            "contents": "not-a-list"
        });

        assert!(DirectoryTree::from_listing(&listing).is_err());
    }

    #[test]
    fn test_directories_produce_no_rows() {
        let listing = json!({
            "name": "root",
            "type": "directory",
            "contents": [
                {"name": "only-dirs", "type": "directory", "contents": []}
            ]
        });

        let tree = DirectoryTree::from_listing(&listing).unwrap();
        assert!(tree.file_rows().is_empty());
        assert_eq!(tree.nodes().len(), 2);
    }
}
