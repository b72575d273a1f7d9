//! Write-once directory tree built from slash-separated file paths.

use slab::Slab;
use thiserror::Error;

pub type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Folder,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub rel_path: String,
    pub kind: NodeKind,
    pub children: Vec<NodeId>,
}

impl Node {
    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("Path {0:?} does not name a file")]
    EmptyPath(String),
    #[error("Path {path:?} conflicts with existing entry {existing:?}")]
    Conflict { path: String, existing: String },
}

pub type Result<T> = std::result::Result<T, TreeError>;

/// Hierarchy of folders and files. Nodes are never removed once added.
#[derive(Debug, Clone)]
pub struct DirectoryTree {
    root: NodeId,
    nodes: Slab<Node>,
    file_count: usize,
}

impl Default for DirectoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectoryTree {
    pub fn new() -> Self {
        let mut nodes = Slab::new();
        let root = nodes.insert(Node {
            id: 0,
            name: String::new(),
            rel_path: String::new(),
            kind: NodeKind::Folder,
            children: Vec::new(),
        });
        nodes[root].id = root;

        Self {
            root,
            nodes,
            file_count: 0,
        }
    }

    pub fn root(&self) -> &Node {
        &self.nodes[self.root]
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &Node> {
        self.nodes
            .get(id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(|child| self.nodes.get(*child))
    }

    /// Insert a file, creating the folders leading to it.
    ///
    /// Both `/` and `\` separate segments; empty and `.` segments are
    /// dropped. An absolute path hangs under a `/` folder, so `/x/a.c` and
    /// `x/a.c` are different leaves. Adding a path that is already present
    /// returns the existing leaf.
    pub fn add_file(&mut self, path: &str) -> Result<NodeId> {
        let segments = segments(path);
        let Some((file_name, folders)) = segments.split_last() else {
            return Err(TreeError::EmptyPath(path.to_string()));
        };

        let mut parent = self.root;
        for folder in folders {
            parent = self.child_or_insert(parent, folder, NodeKind::Folder, path)?;
        }

        let before = self.nodes.len();
        let leaf = self.child_or_insert(parent, file_name, NodeKind::File, path)?;
        if self.nodes.len() > before {
            self.file_count += 1;
        }
        Ok(leaf)
    }

    fn child_or_insert(
        &mut self,
        parent: NodeId,
        name: &str,
        kind: NodeKind,
        requested: &str,
    ) -> Result<NodeId> {
        let existing = self.nodes[parent]
            .children
            .iter()
            .copied()
            .find(|child| self.nodes[*child].name == name);

        if let Some(child) = existing {
            let node = &self.nodes[child];
            if node.kind != kind {
                return Err(TreeError::Conflict {
                    path: requested.to_string(),
                    existing: node.rel_path.clone(),
                });
            }
            return Ok(child);
        }

        let parent_path = &self.nodes[parent].rel_path;
        let rel_path = match parent_path.as_str() {
            "" => name.to_string(),
            ROOT_SEGMENT => format!("{ROOT_SEGMENT}{name}"),
            _ => format!("{parent_path}/{name}"),
        };
        let child = self.nodes.insert(Node {
            id: 0, // will be set
            name: name.to_string(),
            rel_path,
            kind,
            children: Vec::new(),
        });
        self.nodes[child].id = child;
        self.nodes[parent].children.push(child);
        Ok(child)
    }

    pub fn find(&self, path: &str) -> Option<&Node> {
        let mut current = self.root;
        for segment in segments(path) {
            current = self.nodes[current]
                .children
                .iter()
                .copied()
                .find(|child| self.nodes[*child].name == segment)?;
        }
        self.nodes.get(current)
    }

    /// Whether `path` names a file in the tree.
    pub fn contains(&self, path: &str) -> bool {
        self.find(path).map_or(false, Node::is_file)
    }

    /// Depth-first walk over file leaves; siblings keep insertion order.
    pub fn files(&self) -> Files<'_> {
        Files {
            tree: self,
            stack: vec![self.root],
        }
    }

    pub fn file_count(&self) -> usize {
        self.file_count
    }

    pub fn is_empty(&self) -> bool {
        self.file_count == 0
    }

    fn same_shape(&self, id: NodeId, other: &DirectoryTree, other_id: NodeId) -> bool {
        let (left, right) = (&self.nodes[id], &other.nodes[other_id]);
        left.name == right.name
            && left.kind == right.kind
            && left.children.len() == right.children.len()
            && left
                .children
                .iter()
                .zip(&right.children)
                .all(|(a, b)| self.same_shape(*a, other, *b))
    }
}

impl PartialEq for DirectoryTree {
    fn eq(&self, other: &Self) -> bool {
        self.file_count == other.file_count && self.same_shape(self.root, other, other.root)
    }
}

impl Eq for DirectoryTree {}

/// Iterator returned by [`DirectoryTree::files`].
pub struct Files<'a> {
    tree: &'a DirectoryTree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Files<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        while let Some(id) = self.stack.pop() {
            let node = &tree.nodes[id];
            match node.kind {
                NodeKind::File => return Some(node.rel_path.as_str()),
                NodeKind::Folder => self.stack.extend(node.children.iter().rev()),
            }
        }
        None
    }
}

const ROOT_SEGMENT: &str = "/";

fn segments(path: &str) -> Vec<&str> {
    let mut segments: Vec<&str> = path
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect();
    if path.starts_with('/') && !segments.is_empty() {
        segments.insert(0, ROOT_SEGMENT);
    }
    segments
}
