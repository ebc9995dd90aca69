//! Finds the nodes in a document that are marked for export.

use crate::document::{ExportSetting, Node};

/// Where the tree walk starts: the children of a single page, or every
/// top-level page of the document.
#[derive(Debug, Clone, Copy)]
pub enum RootSelection<'a> {
    Page(&'a Node),
    Pages(&'a [Node]),
}

impl<'a> RootSelection<'a> {
    fn start_nodes(self) -> &'a [Node] {
        match self {
            RootSelection::Page(page) => &page.children,
            RootSelection::Pages(pages) => pages,
        }
    }
}

/// Picks the traversal root. `page` is matched against the name or id of the
/// document's top-level children. A match without children, or no match at
/// all, falls back to the whole document.
pub fn resolve_root<'a>(document: &'a Node, page: Option<&str>) -> RootSelection<'a> {
    let pages = document.children.as_slice();

    let found = page
        .filter(|page| !page.is_empty())
        .and_then(|page| pages.iter().find(|node| node.name == page || node.id == page));

    match found {
        Some(node) if node.has_children() => RootSelection::Page(node),
        Some(node) => {
            log::debug!(
                "page '{}' ({}) has no children, exporting the whole document",
                node.name,
                node.id
            );
            RootSelection::Pages(pages)
        }
        None => {
            if let Some(page) = page.filter(|page| !page.is_empty()) {
                log::warn!("could not find page '{}', exporting the whole document", page);
            }
            RootSelection::Pages(pages)
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportableNode<'a> {
    pub node: &'a Node,
}

impl<'a> ExportableNode<'a> {
    pub fn id(&self) -> &'a str {
        &self.node.id
    }

    pub fn name(&self) -> &'a str {
        &self.node.name
    }

    pub fn export_settings(&self) -> &'a [ExportSetting] {
        &self.node.export_settings
    }
}

/// Walks the tree below `root` depth-first, pre-order, collecting every node
/// with a name and at least one export setting. Collected nodes are still
/// descended into.
pub fn collect_exportable_nodes(root: RootSelection<'_>) -> Vec<ExportableNode<'_>> {
    let mut collected = Vec::new();

    // Children are pushed in reverse so they pop in document order.
    let mut stack: Vec<&Node> = root.start_nodes().iter().rev().collect();

    while let Some(node) = stack.pop() {
        if node.is_exportable() {
            log::trace!("found exportable node '{}' ({})", node.name, node.id);
            collected.push(ExportableNode { node });
        }

        stack.extend(node.children.iter().rev());
    }

    collected
}
