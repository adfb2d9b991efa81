//! Resolve a cursor position to the chain of nodes that contain it.

use std::collections::HashSet;
use std::sync::Arc;

use crate::syntax::{Field, NodeId, Position, SyntaxTree};

/// Node types whose block params introduce local bindings.
const SCOPE_NODE_TYPES: [&str; 3] = ["ElementNode", "Block", "BlockStatement"];

/// Ancestor chain from the tree root down to the innermost node containing a
/// position.
///
/// The chain is shared: [`parent_path`](Self::parent_path) returns a view on
/// the same list one level shallower.
#[derive(Debug, Clone)]
pub struct FocusPath {
    tree: Arc<SyntaxTree>,
    path: Arc<[NodeId]>,
    /// Index of the focused node in `path`.
    index: usize,
    lines: Option<Arc<[String]>>,
}

/// A block param visible at the focused node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeValue {
    pub name: String,
    /// The node declaring the param.
    pub node: NodeId,
    /// Position of the param in the declaring node's list.
    pub index: usize,
}

impl FocusPath {
    /// Search `tree` for the nodes containing `position`.
    ///
    /// Returns `None` when the root has no location or the position lies
    /// outside it.
    pub fn resolve(
        tree: Arc<SyntaxTree>,
        position: Position,
        source: Option<&str>,
    ) -> Option<Self> {
        let root = tree.root()?;
        tree.get(root)?.loc?;

        let path = search(&tree, root, position)?;

        let lines = source.map(|text| text.lines().map(str::to_string).collect());
        let index = path.len() - 1;
        Some(Self {
            tree,
            path: path.into(),
            index,
            lines,
        })
    }

    pub fn tree(&self) -> &SyntaxTree {
        &self.tree
    }

    /// The focused (innermost) node.
    pub fn node(&self) -> NodeId {
        self.path[self.index]
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.index.checked_sub(1).map(|i| self.path[i])
    }

    /// The same chain focused one level up, or `None` at the root.
    pub fn parent_path(&self) -> Option<FocusPath> {
        let index = self.index.checked_sub(1)?;
        Some(Self {
            tree: Arc::clone(&self.tree),
            path: Arc::clone(&self.path),
            index,
            lines: self.lines.clone(),
        })
    }

    /// Nodes from the root down to the focused node.
    pub fn ancestors(&self) -> &[NodeId] {
        &self.path[..=self.index]
    }

    /// Node types from the root down to the focused node.
    pub fn kinds(&self) -> Vec<&str> {
        self.ancestors()
            .iter()
            .map(|id| self.tree.node(*id).kind.as_str())
            .collect()
    }

    /// Original text spanned by `node`, if source text was supplied and the
    /// node is located.
    pub fn source_for_node(&self, node: NodeId) -> Option<String> {
        let lines = self.lines.as_ref()?;
        let loc = self.tree.get(node)?.loc?;
        let first = usize::try_from(loc.start.line.checked_sub(1)?).ok()?;
        let last = usize::try_from(loc.end.line.checked_sub(1)?).ok()?;
        let start_col = loc.start.column as usize;
        let end_col = loc.end.column as usize;

        if first == last {
            return Some(char_slice(lines.get(first)?, start_col, Some(end_col)));
        }

        let mut out = Vec::with_capacity(last.saturating_sub(first) + 1);
        for line_no in first..=last {
            let line = lines.get(line_no)?;
            let piece = if line_no == first {
                char_slice(line, start_col, None)
            } else if line_no == last {
                char_slice(line, 0, Some(end_col))
            } else {
                line.clone()
            };
            out.push(piece);
        }
        Some(out.join("\n"))
    }

    /// Block params of enclosing element and block nodes, innermost first.
    ///
    /// The focused node's own params are not in scope for itself, so the
    /// walk starts at the parent.
    pub fn local_scope(&self) -> Vec<ScopeValue> {
        let mut values = Vec::new();
        let mut below = self.node();
        let mut cursor = self.parent_path();
        while let Some(path) = cursor {
            let id = path.node();
            let node = self.tree.node(id);
            if SCOPE_NODE_TYPES.contains(&node.kind.as_str()) {
                let params = if !node.block_params.is_empty() {
                    node.block_params.as_slice()
                } else {
                    self.program_block_params(id, below)
                };
                values.extend(params.iter().enumerate().map(|(index, name)| ScopeValue {
                    name: name.clone(),
                    node: id,
                    index,
                }));
            }
            below = id;
            cursor = path.parent_path();
        }
        values
    }

    /// Whether `name` (or its head before a `.`) is a local binding.
    pub fn is_local(&self, name: &str) -> bool {
        let head = name.split('.').next().unwrap_or(name);
        self.local_scope().iter().any(|value| value.name == head)
    }

    /// `{{#each items as |item|}}` keeps its params on the `program` block.
    /// Skipped when the walk came up through that block, which already
    /// reported them.
    fn program_block_params(&self, id: NodeId, below: NodeId) -> &[String] {
        match self.tree.node(id).field("program") {
            Some(Field::Node(program)) if *program != below => {
                &self.tree.node(*program).block_params
            }
            _ => &[],
        }
    }
}

/// Descend from `root`, taking at each level the first unvisited child
/// that accepts `position`. Unlocated nodes accept every position. The walk
/// is iterative so tree depth is not limited by the call stack.
fn search(tree: &SyntaxTree, root: NodeId, position: Position) -> Option<Vec<NodeId>> {
    let accepts = |id: NodeId| {
        tree.get(id)
            .is_some_and(|node| node.loc.is_none_or(|loc| loc.contains(position)))
    };
    if !accepts(root) {
        return None;
    }

    let mut visited = HashSet::from([root]);
    let mut path = vec![root];
    let mut current = root;
    while let Some(node) = tree.get(current) {
        let Some(next) = node
            .children()
            .find(|child| visited.insert(*child) && accepts(*child))
        else {
            break;
        };
        path.push(next);
        current = next;
    }
    Some(path)
}

fn char_slice(line: &str, start: usize, end: Option<usize>) -> String {
    let chars = line.chars().skip(start);
    match end {
        Some(end) => chars.take(end.saturating_sub(start)).collect(),
        None => chars.collect(),
    }
}
