use crate::dom::node::{DomArena, DomNode, ElementNode, NodeId, Rect, TextNode, ViewportInfo};
use crate::dom::selector_map::SelectorMap;
use crate::error::{AgentError, Result};
use serde::Deserialize;
use std::collections::HashMap;

/// One node descriptor from the in-page extraction script
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDomNode {
    /// Tag name for element nodes
    #[serde(default)]
    pub tag_name: Option<String>,

    /// `"TEXT_NODE"` marks a text node
    #[serde(default, rename = "type")]
    pub node_type: Option<String>,

    /// Text content for text nodes
    #[serde(default)]
    pub text: Option<String>,

    #[serde(default)]
    pub xpath: Option<String>,

    #[serde(default)]
    pub attributes: HashMap<String, String>,

    /// Child node ids in document order; ids absent from the map are skipped
    #[serde(default)]
    pub children: Vec<String>,

    #[serde(default)]
    pub is_visible: bool,

    #[serde(default)]
    pub is_interactive: bool,

    #[serde(default)]
    pub is_top_element: bool,

    #[serde(default)]
    pub is_in_viewport: bool,

    #[serde(default)]
    pub shadow_root: bool,

    #[serde(default)]
    pub highlight_index: Option<usize>,

    /// Bounding rectangle in page coordinates
    #[serde(default)]
    pub rect: Option<Rect>,

    /// Bounding rectangle in viewport coordinates
    #[serde(default)]
    pub viewport_rect: Option<Rect>,

    #[serde(default)]
    pub viewport: Option<ViewportInfo>,
}

/// Flat node map produced by `extract_dom.js`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDomPage {
    pub root_id: String,
    pub map: HashMap<String, RawDomNode>,
}

/// Indexed snapshot of one page state.
///
/// Created fresh on every capture and discarded when the next capture
/// replaces it; only [`crate::dom::history::DomHistoryElement`] projections
/// outlive the snapshot.
#[derive(Debug, Clone)]
pub struct DomTree {
    pub arena: DomArena,
    pub root: NodeId,
    pub selector_map: SelectorMap,
}

impl DomTree {
    /// Root element of the snapshot
    pub fn root_element(&self) -> &ElementNode {
        self.arena
            .element(self.root)
            .expect("snapshot root is always an element")
    }

    /// Element carrying the given highlight index, if any
    pub fn get_by_index(&self, index: usize) -> Option<&ElementNode> {
        self.selector_map
            .get(index)
            .and_then(|id| self.arena.element(id))
    }

    /// Total node count (elements and text)
    pub fn node_count(&self) -> usize {
        self.arena.len()
    }

    /// Number of indexed interactive elements
    pub fn interactive_count(&self) -> usize {
        self.selector_map.len()
    }
}

/// Build an ownership tree plus selector map from the script's flat node map.
///
/// Two passes: the first constructs one arena node per descriptor, the second
/// wires children by resolving ids against the already-constructed nodes and
/// sets parent back-references. Child ids missing from the map are dropped
/// silently to tolerate partial extraction. The temporary id table is gone
/// once this returns; the arena is the sole owner of every reachable node.
pub fn build_dom_tree(page: &RawDomPage) -> Result<DomTree> {
    if page.map.is_empty() {
        return Err(AgentError::DomTreeConstruction(
            "extraction script returned an empty node map".to_string(),
        ));
    }
    if !page.map.contains_key(&page.root_id) {
        return Err(AgentError::DomTreeConstruction(format!(
            "root id '{}' is not present in the node map",
            page.root_id
        )));
    }

    let mut arena = DomArena::new();
    let mut ids: HashMap<&str, NodeId> = HashMap::with_capacity(page.map.len());

    for (raw_id, raw) in &page.map {
        let node = if raw.node_type.as_deref() == Some("TEXT_NODE") {
            DomNode::Text(TextNode {
                text: raw.text.clone().unwrap_or_default(),
                is_visible: raw.is_visible,
                parent: None,
            })
        } else {
            let mut el = ElementNode::new(
                raw.tag_name.clone().unwrap_or_else(|| "unknown".to_string()),
            );
            el.xpath = raw.xpath.clone().unwrap_or_default();
            el.attributes = raw.attributes.clone();
            el.is_visible = raw.is_visible;
            el.is_interactive = raw.is_interactive;
            el.is_top_element = raw.is_top_element;
            el.is_in_viewport = raw.is_in_viewport;
            el.shadow_root = raw.shadow_root;
            el.highlight_index = raw.highlight_index;
            el.page_coordinates = raw.rect.clone();
            el.viewport_coordinates = raw.viewport_rect.clone();
            el.viewport_info = raw.viewport.clone();
            DomNode::Element(el)
        };
        ids.insert(raw_id.as_str(), arena.alloc(node));
    }

    for (raw_id, raw) in &page.map {
        let parent_id = ids[raw_id.as_str()];
        if arena.element(parent_id).is_none() {
            continue;
        }
        for child_raw in &raw.children {
            let Some(&child_id) = ids.get(child_raw.as_str()) else {
                log::debug!("Skipping unresolved child id '{}'", child_raw);
                continue;
            };
            if let DomNode::Element(el) = arena.get_mut(parent_id) {
                el.children.push(child_id);
            }
            match arena.get_mut(child_id) {
                DomNode::Element(el) => el.parent = Some(parent_id),
                DomNode::Text(t) => t.parent = Some(parent_id),
            }
        }
    }

    let mut selector_map = SelectorMap::new();
    for (raw_id, raw) in &page.map {
        if raw.node_type.as_deref() == Some("TEXT_NODE") {
            continue;
        }
        if let Some(index) = raw.highlight_index {
            selector_map.insert(index, ids[raw_id.as_str()]);
        }
    }
    selector_map.sort();

    let root = ids[page.root_id.as_str()];
    if arena.element(root).is_none() {
        return Err(AgentError::DomTreeConstruction(
            "root node is not an element".to_string(),
        ));
    }

    Ok(DomTree { arena, root, selector_map })
}

/// Parse the JSON string returned by the extraction script and build the tree
pub fn parse_dom_snapshot(json: &str) -> Result<DomTree> {
    let page: RawDomPage = serde_json::from_str(json).map_err(|e| {
        AgentError::DomTreeConstruction(format!("malformed extraction payload: {}", e))
    })?;
    build_dom_tree(&page)
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn three_node_page() -> RawDomPage {
        // root div -> button[highlightIndex=0] -> text "Go"
        serde_json::from_value(serde_json::json!({
            "rootId": "1",
            "map": {
                "1": {
                    "tagName": "div",
                    "xpath": "/html/body/div",
                    "isVisible": true,
                    "children": ["2"]
                },
                "2": {
                    "tagName": "button",
                    "xpath": "/html/body/div/button",
                    "isVisible": true,
                    "isInteractive": true,
                    "isTopElement": true,
                    "isInViewport": true,
                    "highlightIndex": 0,
                    "children": ["3"]
                },
                "3": {
                    "type": "TEXT_NODE",
                    "text": "Go",
                    "isVisible": true
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_build_three_node_tree() {
        let tree = build_dom_tree(&three_node_page()).unwrap();

        assert_eq!(tree.node_count(), 3);
        assert_eq!(tree.root_element().tag_name, "div");
        assert_eq!(tree.interactive_count(), 1);

        let button = tree.get_by_index(0).expect("button registered under index 0");
        assert_eq!(button.tag_name, "button");
        assert_eq!(button.xpath, "/html/body/div/button");
    }

    #[test]
    fn test_parent_back_references() {
        let tree = build_dom_tree(&three_node_page()).unwrap();
        let button_id = tree.selector_map.get(0).unwrap();
        let button = tree.arena.element(button_id).unwrap();

        assert_eq!(button.parent, Some(tree.root));
        assert_eq!(button.children.len(), 1);
        let text = tree.arena.get(button.children[0]).as_text().unwrap();
        assert_eq!(text.text, "Go");
        assert_eq!(text.parent, Some(button_id));
    }

    #[test]
    fn test_empty_map_fails() {
        let page = RawDomPage { root_id: "1".to_string(), map: HashMap::new() };
        let err = build_dom_tree(&page).unwrap_err();
        assert!(matches!(err, AgentError::DomTreeConstruction(_)));
    }

    #[test]
    fn test_missing_root_fails() {
        let mut page = three_node_page();
        page.root_id = "99".to_string();
        let err = build_dom_tree(&page).unwrap_err();
        assert!(matches!(err, AgentError::DomTreeConstruction(_)));
    }

    #[test]
    fn test_missing_child_ids_skipped_silently() {
        let mut page = three_node_page();
        page.map.get_mut("2").unwrap().children.push("404".to_string());

        let tree = build_dom_tree(&page).unwrap();
        let button = tree.get_by_index(0).unwrap();
        assert_eq!(button.children.len(), 1);
    }

    #[test]
    fn test_index_uniqueness_within_snapshot() {
        let tree = build_dom_tree(&three_node_page()).unwrap();
        let mut seen = std::collections::HashSet::new();
        for index in tree.selector_map.indices() {
            assert!(seen.insert(index), "duplicate highlight index {}", index);
        }
    }
}
