//! Hierarchical warnings/errors collected while compiling types.
//!
//! Nodes live in an append-only arena and are addressed by [`NodeId`]. Each
//! node carries its root-to-node path; suppression is a plain set lookup on
//! that path and never propagates to descendants.

use std::collections::HashSet;
use std::fmt::Write as _;

use colored::Colorize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
pub struct DiagnosticNode {
    /// Display name, e.g. `[resource "x.Bucket"]`. Empty for the root.
    pub name: String,
    /// Qualified path used for suppression, e.g. `resource.x.Bucket`.
    pub path: String,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub is_root: bool,
    children: Vec<NodeId>,
}

impl DiagnosticNode {
    /// Local issues only; a suppressed parent does not silence its children.
    pub fn has_warnings_or_errors(&self, suppress: &HashSet<String>) -> bool {
        !suppress.contains(&self.path) && (!self.warnings.is_empty() || !self.errors.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostics {
    nodes: Vec<DiagnosticNode>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagnostics {
    pub fn new() -> Self {
        let root = DiagnosticNode {
            name: String::new(),
            path: String::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
            is_root: true,
            children: Vec::new(),
        };
        Self { nodes: vec![root] }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Open a new scope under `parent`. Top-level scopes are namespaced by
    /// `kind`; nested ones by their parent's path.
    pub fn child(&mut self, parent: NodeId, kind: &str, identifier: &str) -> NodeId {
        let parent_node = &self.nodes[parent.0];
        let path = if parent_node.is_root {
            format!("{kind}.{identifier}")
        } else {
            format!("{}.{identifier}", parent_node.path)
        };
        let id = NodeId(self.nodes.len());
        self.nodes.push(DiagnosticNode {
            name: format!("[{kind} \"{identifier}\"]"),
            path,
            warnings: Vec::new(),
            errors: Vec::new(),
            is_root: false,
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn warn(&mut self, node: NodeId, message: impl Into<String>) {
        self.nodes[node.0].warnings.push(message.into());
    }

    pub fn error(&mut self, node: NodeId, message: impl Into<String>) {
        self.nodes[node.0].errors.push(message.into());
    }

    pub fn node(&self, id: NodeId) -> &DiagnosticNode {
        &self.nodes[id.0]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// First node with the given qualified path, in creation order.
    pub fn find(&self, path: &str) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.path == path).map(NodeId)
    }

    pub fn has_warnings_or_errors(&self, id: NodeId, suppress: &HashSet<String>) -> bool {
        self.node(id).has_warnings_or_errors(suppress)
    }

    pub fn warning_count(&self) -> usize {
        self.nodes.iter().map(|n| n.warnings.len()).sum()
    }

    pub fn error_count(&self) -> usize {
        self.nodes.iter().map(|n| n.errors.len()).sum()
    }

    /// Depth-first rendering. Clean nodes print nothing but their children
    /// are still visited.
    pub fn render(&self, suppress: &HashSet<String>, colors: bool) -> String {
        let mut out = String::new();
        self.render_node(self.root(), suppress, colors, "", &mut out);
        out
    }

    /// Write [`Diagnostics::render`] to stderr.
    pub fn print(&self, suppress: &HashSet<String>, colors: bool) {
        eprint!("{}", self.render(suppress, colors));
    }

    fn render_node(&self, id: NodeId, suppress: &HashSet<String>, colors: bool, indent: &str, out: &mut String) {
        let node = self.node(id);
        if node.has_warnings_or_errors(suppress) {
            if !node.name.is_empty() {
                let _ = writeln!(out, "{indent}{}", node.name);
            }
            for warning in &node.warnings {
                let line = format!("{indent}  {warning}");
                let _ = writeln!(out, "{}", if colors { line.yellow().to_string() } else { line });
            }
            for error in &node.errors {
                let line = format!("{indent}  {error}");
                let _ = writeln!(out, "{}", if colors { line.red().to_string() } else { line });
            }
        }

        let indent = if node.is_root { indent.to_string() } else { format!("{indent}  ") };
        for child in &node.children {
            self.render_node(*child, suppress, colors, &indent, out);
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
