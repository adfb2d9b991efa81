//! Arena representation of an already-parsed template or script tree.
//!
//! Parsers hand over trees shaped like `{ type, loc: {start, end}, ...fields }`.
//! Nodes live in a flat arena and refer to each other by [`NodeId`], so a node
//! may be shared by several parents and references may form cycles.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A location inside a source file: 1-based line, 0-based column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// Convert a zero-based editor position (line and character) into tree
    /// coordinates.
    pub fn from_editor(line: u32, character: u32) -> Self {
        Self {
            line: line + 1,
            column: character,
        }
    }
}

/// Inclusive source range of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRange {
    pub start: Position,
    pub end: Position,
}

impl SourceRange {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, position: Position) -> bool {
        self.start <= position && position <= self.end
    }
}

/// Index of a node in its [`SyntaxTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Value of a named node property.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// Plain data (strings, numbers, flags, non-node objects).
    Scalar(Value),
    Node(NodeId),
    List(Vec<NodeId>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: String,
    pub loc: Option<SourceRange>,
    pub block_params: Vec<String>,
    /// Properties in declaration order.
    pub fields: Vec<(String, Field)>,
}

impl Node {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            loc: None,
            block_params: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn with_loc(mut self, start: Position, end: Position) -> Self {
        self.loc = Some(SourceRange::new(start, end));
        self
    }

    pub fn with_block_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.block_params = params.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.fields.push((name.into(), field));
        self
    }

    /// Look up a property by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, field)| field)
    }

    /// String-valued scalar property, if any.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        match self.field(name) {
            Some(Field::Scalar(Value::String(s))) => Some(s),
            _ => None,
        }
    }

    /// Child nodes in property order, lists flattened in element order.
    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.fields.iter().flat_map(|(_, field)| {
            let ids: &[NodeId] = match field {
                Field::Node(id) => std::slice::from_ref(id),
                Field::List(ids) => ids,
                Field::Scalar(_) => &[],
            };
            ids.iter().copied()
        })
    }
}

/// Errors from building a tree out of JSON.
#[derive(Debug, thiserror::Error)]
pub enum SyntaxError {
    #[error("tree root must be an object with a string `type` property")]
    InvalidRoot,
}

/// An arena of nodes with a designated root.
#[derive(Debug, Clone, Default)]
pub struct SyntaxTree {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl SyntaxTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. The first node added becomes the root unless
    /// [`set_root`](Self::set_root) says otherwise.
    pub fn add(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        self.root.get_or_insert(id);
        id
    }

    pub fn set_root(&mut self, id: NodeId) {
        self.root = Some(id);
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Panics on an id from another tree.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Append a property to an existing node. Used to wire up shared or
    /// cyclic references after both ends exist.
    pub fn push_field(&mut self, id: NodeId, name: impl Into<String>, field: Field) {
        self.nodes[id.0].fields.push((name.into(), field));
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Build an arena from a JSON tree.
    ///
    /// Objects with a string `type` become nodes; arrays whose elements are
    /// all such objects become node lists; `loc` is read as a range and
    /// `blockParams` as the node's block parameters. Everything else is kept
    /// as scalar data.
    pub fn from_json(value: &Value) -> Result<Self, SyntaxError> {
        if !is_node(value) {
            return Err(SyntaxError::InvalidRoot);
        }
        let mut tree = SyntaxTree::new();
        let root = tree.insert_json(value);
        tree.set_root(root);
        Ok(tree)
    }

    fn insert_json(&mut self, value: &Value) -> NodeId {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let id = self.add(Node::new(kind));

        let Some(object) = value.as_object() else {
            return id;
        };
        for (key, child) in object {
            match key.as_str() {
                "type" => {}
                "loc" => self.nodes[id.0].loc = parse_loc(child),
                "blockParams" => {
                    self.nodes[id.0].block_params = child
                        .as_array()
                        .map(|params| {
                            params
                                .iter()
                                .filter_map(Value::as_str)
                                .map(str::to_string)
                                .collect()
                        })
                        .unwrap_or_default();
                }
                _ if is_node(child) => {
                    let child_id = self.insert_json(child);
                    self.push_field(id, key.clone(), Field::Node(child_id));
                }
                _ if is_node_list(child) => {
                    let ids = child
                        .as_array()
                        .into_iter()
                        .flatten()
                        .map(|item| self.insert_json(item))
                        .collect();
                    self.push_field(id, key.clone(), Field::List(ids));
                }
                _ => self.push_field(id, key.clone(), Field::Scalar(child.clone())),
            }
        }
        id
    }
}

fn is_node(value: &Value) -> bool {
    value.get("type").is_some_and(Value::is_string)
}

fn is_node_list(value: &Value) -> bool {
    value
        .as_array()
        .is_some_and(|items| !items.is_empty() && items.iter().all(is_node))
}

fn parse_loc(value: &Value) -> Option<SourceRange> {
    let point = |v: &Value| -> Option<Position> {
        let line = u32::try_from(v.get("line")?.as_u64()?).ok()?;
        let column = v
            .get("column")
            .or_else(|| v.get("col"))
            .and_then(Value::as_u64)
            .and_then(|c| u32::try_from(c).ok())?;
        Some(Position::new(line, column))
    };
    Some(SourceRange::new(
        point(value.get("start")?)?,
        point(value.get("end")?)?,
    ))
}
