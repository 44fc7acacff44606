//! Disk-persisted B+Tree index.
//!
//! An order-preserving multimap from a column's textual value to the
//! byte offsets of the records carrying it. Duplicate keys are allowed
//! (one key, many offsets); uniqueness is the table's job, not the
//! index's. Keys are compared according to the indexed column's type:
//! `INT` keys numerically, with a lexicographic fallback when a key
//! does not parse, everything else lexicographically. Keys are trimmed
//! of surrounding whitespace at every boundary.
//!
//! Nodes live in an arena addressed by plain indices, so the tree has
//! no owning-pointer graph to manage; the leaf `next` links used for
//! future range scans are arena indices too and cannot dangle.
//!
//! The on-disk form is a depth-first preorder dump of the node graph
//! (see [`BPlusTree::save`]); loading a truncated or corrupt file
//! yields an empty tree rather than an error, and the table rebuilds
//! it from the data file on the next mutation.

use std::cmp::Ordering;
use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::warn;

use shale_core::ColumnType;

/// Maximum keys per node; a node holding `ORDER` keys is full.
const ORDER: usize = 4;

/// Upper bound on a serialized key length. Keys are column fields, so
/// anything larger than this is corruption, not data.
const MAX_KEY_LEN: usize = 1 << 16;

type NodeId = usize;

#[derive(Debug, Clone)]
struct Node {
    leaf: bool,
    /// Sorted keys. Internal nodes hold separator copies.
    keys: Vec<String>,
    /// Offset lists parallel to `keys`; placeholders on internal nodes.
    values: Vec<Vec<u64>>,
    /// Child node ids; empty on leaves.
    children: Vec<NodeId>,
    /// Right sibling of a leaf, for range scans.
    next: Option<NodeId>,
}

impl Node {
    fn new(leaf: bool) -> Self {
        Self {
            leaf,
            keys: Vec::new(),
            values: Vec::new(),
            children: Vec::new(),
            next: None,
        }
    }
}

/// A persistent B+Tree multimap from column values to record offsets.
#[derive(Debug, Clone)]
pub struct BPlusTree {
    nodes: Vec<Node>,
    root: NodeId,
    key_type: ColumnType,
}

impl BPlusTree {
    /// Creates an empty tree comparing keys as the given column type.
    #[must_use]
    pub fn new(key_type: ColumnType) -> Self {
        Self {
            nodes: vec![Node::new(true)],
            root: 0,
            key_type,
        }
    }

    /// The column type driving key comparison.
    #[must_use]
    pub fn key_type(&self) -> ColumnType {
        self.key_type
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn cmp_keys(&self, a: &str, b: &str) -> Ordering {
        if self.key_type == ColumnType::Int {
            if let (Ok(x), Ok(y)) = (a.parse::<i64>(), b.parse::<i64>()) {
                return x.cmp(&y);
            }
        }
        a.cmp(b)
    }

    /// Number of children a key slot routes past: the first child whose
    /// subtree can hold `key`, with equal keys routed right.
    fn descend_slot(&self, id: NodeId, key: &str) -> usize {
        let keys = &self.nodes[id].keys;
        let mut i = 0;
        while i < keys.len() && self.cmp_keys(key, &keys[i]) != Ordering::Less {
            i += 1;
        }
        i
    }

    /// Inserts one `(key, offset)` pair; duplicate keys append the
    /// offset to the existing list.
    pub fn insert(&mut self, key: &str, offset: u64) {
        let key = key.trim();
        if self.nodes[self.root].keys.len() == ORDER {
            let old_root = self.root;
            let mut new_root = Node::new(false);
            new_root.children.push(old_root);
            self.root = self.alloc(new_root);
            self.split_child(self.root, 0);
        }
        self.insert_non_full(self.root, key, offset);
    }

    fn insert_non_full(&mut self, id: NodeId, key: &str, offset: u64) {
        if self.nodes[id].leaf {
            let existing = self.nodes[id]
                .keys
                .iter()
                .position(|k| self.cmp_keys(key, k) == Ordering::Equal);
            if let Some(pos) = existing {
                self.nodes[id].values[pos].push(offset);
                return;
            }
            let pos = self.descend_slot(id, key);
            let node = &mut self.nodes[id];
            node.keys.insert(pos, key.to_string());
            node.values.insert(pos, vec![offset]);
        } else {
            let mut slot = self.descend_slot(id, key);
            let child = self.nodes[id].children[slot];
            if self.nodes[child].keys.len() == ORDER {
                self.split_child(id, slot);
                // The split promoted a key into `slot`; step right when
                // the new key belongs at or past it.
                if self.cmp_keys(key, &self.nodes[id].keys[slot]) != Ordering::Less {
                    slot += 1;
                }
            }
            let child = self.nodes[id].children[slot];
            self.insert_non_full(child, key, offset);
        }
    }

    /// Splits the full child at `index` of `parent`.
    ///
    /// The separator is the key at `mid` of the unsplit child. Leaf
    /// splits copy it up and keep it (with its offsets) as the first
    /// key of the right sibling; internal splits move it up.
    fn split_child(&mut self, parent: NodeId, index: usize) {
        let child_id = self.nodes[parent].children[index];
        let leaf = self.nodes[child_id].leaf;
        let mid = (ORDER - 1) / 2;

        let (promoted, sibling) = if leaf {
            let child = &mut self.nodes[child_id];
            debug_assert_eq!(child.keys.len(), ORDER);
            let keys = child.keys.split_off(mid);
            let values = child.values.split_off(mid);
            let next = child.next;
            let promoted = keys[0].clone();
            (
                promoted,
                Node {
                    leaf: true,
                    keys,
                    values,
                    children: Vec::new(),
                    next,
                },
            )
        } else {
            let child = &mut self.nodes[child_id];
            debug_assert_eq!(child.keys.len(), ORDER);
            let keys = child.keys.split_off(mid + 1);
            let values = child.values.split_off(mid + 1);
            let children = child.children.split_off(mid + 1);
            let promoted = child.keys.pop().unwrap_or_default();
            child.values.pop();
            (
                promoted,
                Node {
                    leaf: false,
                    keys,
                    values,
                    children,
                    next: None,
                },
            )
        };

        let sibling_id = self.alloc(sibling);
        if leaf {
            self.nodes[child_id].next = Some(sibling_id);
        }
        let parent_node = &mut self.nodes[parent];
        parent_node.keys.insert(index, promoted);
        parent_node.values.insert(index, Vec::new());
        parent_node.children.insert(index + 1, sibling_id);
    }

    /// Point lookup: the offsets recorded for `key`, empty on a miss.
    #[must_use]
    pub fn search(&self, key: &str) -> Vec<u64> {
        let key = key.trim();
        let mut id = self.root;
        loop {
            let node = &self.nodes[id];
            if node.leaf {
                for (i, k) in node.keys.iter().enumerate() {
                    match self.cmp_keys(key, k) {
                        Ordering::Greater => continue,
                        Ordering::Equal => return node.values[i].clone(),
                        Ordering::Less => return Vec::new(),
                    }
                }
                return Vec::new();
            }
            id = node.children[self.descend_slot(id, key)];
        }
    }

    /// Every `(key, offsets)` pair, in key order.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, Vec<u64>)> {
        let mut out = Vec::new();
        self.collect_entries(self.root, &mut out);
        out
    }

    fn collect_entries(&self, id: NodeId, out: &mut Vec<(String, Vec<u64>)>) {
        let node = &self.nodes[id];
        if node.leaf {
            for (key, offsets) in node.keys.iter().zip(&node.values) {
                out.push((key.clone(), offsets.clone()));
            }
        } else {
            for &child in &node.children {
                self.collect_entries(child, out);
            }
        }
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if node.leaf {
                count += node.keys.len();
            } else {
                stack.extend(&node.children);
            }
        }
        count
    }

    /// True when the tree holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry, leaving a fresh empty leaf root.
    pub fn clear(&mut self) {
        self.nodes = vec![Node::new(true)];
        self.root = 0;
    }

    /// Writes the tree as a depth-first preorder dump.
    ///
    /// Per node: a `u8` leaf flag, a `u32` key count, then for each key
    /// a `u32` length + raw bytes, a `u32` offset count and the `u64`
    /// offsets; internal nodes append a `u32` child count followed by
    /// each child. All words little-endian.
    pub fn save<W: Write>(&self, out: &mut W) -> io::Result<()> {
        self.save_node(self.root, out)
    }

    fn save_node<W: Write>(&self, id: NodeId, out: &mut W) -> io::Result<()> {
        let node = &self.nodes[id];
        out.write_u8(u8::from(node.leaf))?;
        out.write_u32::<LittleEndian>(node.keys.len() as u32)?;
        for (key, offsets) in node.keys.iter().zip(&node.values) {
            let key = key.trim();
            out.write_u32::<LittleEndian>(key.len() as u32)?;
            out.write_all(key.as_bytes())?;
            out.write_u32::<LittleEndian>(offsets.len() as u32)?;
            for &offset in offsets {
                out.write_u64::<LittleEndian>(offset)?;
            }
        }
        if !node.leaf {
            out.write_u32::<LittleEndian>(node.children.len() as u32)?;
            for &child in &node.children {
                self.save_node(child, out)?;
            }
        }
        Ok(())
    }

    /// Reads a tree back from its serialized form.
    ///
    /// Any short read or malformed field yields an empty tree; a
    /// partial node graph is never installed.
    pub fn load<R: Read>(key_type: ColumnType, input: &mut R) -> Self {
        match Self::read_tree(key_type, input) {
            Ok(tree) => tree,
            Err(e) => {
                warn!(error = %e, "failed to load index file, starting with an empty tree");
                Self::new(key_type)
            }
        }
    }

    fn read_tree<R: Read>(key_type: ColumnType, input: &mut R) -> io::Result<Self> {
        let mut nodes = Vec::new();
        let root = Self::read_node(&mut nodes, input)?;
        let mut tree = Self {
            nodes,
            root,
            key_type,
        };
        tree.relink_leaves();
        Ok(tree)
    }

    fn read_node<R: Read>(nodes: &mut Vec<Node>, input: &mut R) -> io::Result<NodeId> {
        let corrupt = |what: &str| io::Error::new(io::ErrorKind::InvalidData, what.to_string());

        let leaf = input.read_u8()? != 0;
        let key_count = input.read_u32::<LittleEndian>()? as usize;
        if key_count > ORDER {
            return Err(corrupt("node key count exceeds tree order"));
        }

        let mut keys = Vec::with_capacity(key_count);
        let mut values = Vec::with_capacity(key_count);
        for _ in 0..key_count {
            let key_len = input.read_u32::<LittleEndian>()? as usize;
            if key_len > MAX_KEY_LEN {
                return Err(corrupt("key length out of range"));
            }
            let mut buf = vec![0u8; key_len];
            input.read_exact(&mut buf)?;
            keys.push(String::from_utf8_lossy(&buf).trim().to_string());

            let offset_count = input.read_u32::<LittleEndian>()? as usize;
            let mut offsets = Vec::new();
            for _ in 0..offset_count {
                offsets.push(input.read_u64::<LittleEndian>()?);
            }
            values.push(offsets);
        }

        let mut children = Vec::new();
        if !leaf {
            let child_count = input.read_u32::<LittleEndian>()? as usize;
            if child_count > ORDER + 1 {
                return Err(corrupt("node child count exceeds tree order"));
            }
            for _ in 0..child_count {
                children.push(Self::read_node(nodes, input)?);
            }
        }

        nodes.push(Node {
            leaf,
            keys,
            values,
            children,
            next: None,
        });
        Ok(nodes.len() - 1)
    }

    /// Rebuilds the leaf chain after a load; the links are not part of
    /// the serialized form.
    fn relink_leaves(&mut self) {
        let mut leaves = Vec::new();
        let mut stack = vec![self.root];
        // Iterative preorder keeping child order left-to-right.
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if node.leaf {
                leaves.push(id);
            } else {
                for &child in node.children.iter().rev() {
                    stack.push(child);
                }
            }
        }
        for pair in leaves.windows(2) {
            self.nodes[pair[0]].next = Some(pair[1]);
        }
        if let Some(&last) = leaves.last() {
            self.nodes[last].next = None;
        }
    }
}
