use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Handle into a [`DomArena`]. Valid only for the arena that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

/// Axis-aligned rectangle in CSS pixels
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// A rectangle with zero width or height occupies no visible area
    pub fn is_visible(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// Viewport scroll position and dimensions at snapshot time
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ViewportInfo {
    pub scroll_x: f64,
    pub scroll_y: f64,
    pub width: f64,
    pub height: f64,
}

/// A DOM element as captured by the extraction script
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementNode {
    /// HTML tag name, lowercased (e.g. "div", "button", "input")
    pub tag_name: String,

    /// Absolute XPath from the document root, used to re-locate the element
    pub xpath: String,

    /// Element attributes (id, class, href, aria-label, ...)
    #[serde(default)]
    pub attributes: HashMap<String, String>,

    /// Child nodes in document order
    #[serde(default)]
    pub children: Vec<NodeId>,

    /// Parent element; `None` for the root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,

    /// Whether the element is rendered
    #[serde(default)]
    pub is_visible: bool,

    /// Whether the element accepts user interaction
    #[serde(default)]
    pub is_interactive: bool,

    /// Whether the element is the topmost at its own center point
    #[serde(default)]
    pub is_top_element: bool,

    /// Whether the element intersects the current viewport
    #[serde(default)]
    pub is_in_viewport: bool,

    /// Whether the element hosts a shadow root
    #[serde(default)]
    pub shadow_root: bool,

    /// Index the LLM uses to name this element; unique within one snapshot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight_index: Option<usize>,

    /// Bounding rectangle in page coordinates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_coordinates: Option<Rect>,

    /// Bounding rectangle in viewport coordinates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewport_coordinates: Option<Rect>,

    /// Viewport metadata captured with the snapshot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewport_info: Option<ViewportInfo>,
}

impl ElementNode {
    /// Create a bare element with the given tag
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            xpath: String::new(),
            attributes: HashMap::new(),
            children: Vec::new(),
            parent: None,
            is_visible: false,
            is_interactive: false,
            is_top_element: false,
            is_in_viewport: false,
            shadow_root: false,
            highlight_index: None,
            page_coordinates: None,
            viewport_coordinates: None,
            viewport_info: None,
        }
    }

    /// Builder method: set the xpath
    pub fn with_xpath(mut self, xpath: impl Into<String>) -> Self {
        self.xpath = xpath.into();
        self
    }

    /// Builder method: set attributes
    pub fn with_attributes(mut self, attributes: HashMap<String, String>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Builder method: set visibility
    pub fn with_visibility(mut self, visible: bool) -> Self {
        self.is_visible = visible;
        self
    }

    /// Builder method: set interactivity
    pub fn with_interactivity(mut self, interactive: bool) -> Self {
        self.is_interactive = interactive;
        self
    }

    /// Builder method: set the highlight index
    pub fn with_highlight_index(mut self, index: usize) -> Self {
        self.highlight_index = Some(index);
        self
    }

    /// Add a single attribute
    pub fn add_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Get attribute value by key
    pub fn get_attribute(&self, key: &str) -> Option<&String> {
        self.attributes.get(key)
    }

    /// Element ID attribute, if present
    pub fn id(&self) -> Option<&String> {
        self.attributes.get("id")
    }

    /// Check tag name case-insensitively
    pub fn is_tag(&self, tag: &str) -> bool {
        self.tag_name.eq_ignore_ascii_case(tag)
    }
}

/// A text node captured by the extraction script
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextNode {
    pub text: String,

    #[serde(default)]
    pub is_visible: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,
}

/// Element or text node in the snapshot tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum DomNode {
    Element(ElementNode),
    Text(TextNode),
}

impl DomNode {
    pub fn as_element(&self) -> Option<&ElementNode> {
        match self {
            DomNode::Element(el) => Some(el),
            DomNode::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextNode> {
        match self {
            DomNode::Text(t) => Some(t),
            DomNode::Element(_) => None,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        match self {
            DomNode::Element(el) => el.parent,
            DomNode::Text(t) => t.parent,
        }
    }
}

/// Owns every node of one snapshot; the tree structure is index-based, so
/// parent back-references never form ownership cycles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomArena {
    nodes: Vec<DomNode>,
}

impl DomArena {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Move a node into the arena and return its handle
    pub fn alloc(&mut self, node: DomNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub fn get(&self, id: NodeId) -> &DomNode {
        &self.nodes[id.0]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut DomNode {
        &mut self.nodes[id.0]
    }

    /// Element view of a node, `None` if it is a text node
    pub fn element(&self, id: NodeId) -> Option<&ElementNode> {
        self.get(id).as_element()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Tag names from the root down to (and including) the given element
    pub fn parent_branch_path(&self, id: NodeId) -> Vec<String> {
        let mut path = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.get(node_id);
            if let DomNode::Element(el) = node {
                path.push(el.tag_name.clone());
            }
            current = node.parent();
        }
        path.reverse();
        path
    }

    /// Whether any ancestor element carries a highlight index
    pub fn has_highlighted_ancestor(&self, id: NodeId) -> bool {
        let mut current = self.get(id).parent();
        while let Some(node_id) = current {
            let node = self.get(node_id);
            if let DomNode::Element(el) = node {
                if el.highlight_index.is_some() {
                    return true;
                }
            }
            current = node.parent();
        }
        false
    }
}
