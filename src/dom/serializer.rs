use crate::dom::node::{DomArena, DomNode, ElementNode, NodeId};
use crate::dom::snapshot::DomTree;

/// Render the snapshot as the compact line format the LLM consumes.
///
/// One line per indexed element: `[i]<tag attr1;attr2>text</>`. Attribute
/// values are taken from `include_attributes` keys only, deduplicated, and
/// dropped when they merely repeat the tag name or the inline text. Visible
/// text that has no indexed ancestor is emitted on its own line so nothing
/// the user can read is lost, while text under an indexed element appears
/// exactly once inside that element's line.
pub fn clickable_elements_to_string(tree: &DomTree, include_attributes: &[String]) -> String {
    let mut lines = Vec::new();
    visit(&tree.arena, tree.root, include_attributes, &mut lines);
    lines.join("\n")
}

fn visit(arena: &DomArena, id: NodeId, include_attributes: &[String], lines: &mut Vec<String>) {
    match arena.get(id) {
        DomNode::Element(el) => {
            if let Some(index) = el.highlight_index {
                lines.push(render_element_line(arena, el, id, index, include_attributes));
            }
            for &child in &el.children {
                visit(arena, child, include_attributes, lines);
            }
        }
        DomNode::Text(text) => {
            // Text already captured inside an indexed element's line is skipped
            if text.is_visible && !arena.has_highlighted_ancestor(id) {
                let trimmed = text.text.trim();
                if !trimmed.is_empty() {
                    lines.push(trimmed.to_string());
                }
            }
        }
    }
}

fn render_element_line(
    arena: &DomArena,
    el: &ElementNode,
    id: NodeId,
    index: usize,
    include_attributes: &[String],
) -> String {
    let text = text_until_next_clickable(arena, id);

    let mut values: Vec<&str> = Vec::new();
    for key in include_attributes {
        if let Some(value) = el.attributes.get(key) {
            let value = value.as_str();
            if value == el.tag_name || values.contains(&value) {
                continue;
            }
            values.push(value);
        }
    }
    // Inline text repeating an attribute value is redundant in the attribute list
    if !text.is_empty() {
        values.retain(|v| *v != text);
    }

    if values.is_empty() && text.is_empty() {
        return format!("[{}]<{}/>", index, el.tag_name);
    }
    if values.is_empty() {
        format!("[{}]<{}>{}</>", index, el.tag_name, text)
    } else {
        format!("[{}]<{} {}>{}</>", index, el.tag_name, values.join(";"), text)
    }
}

/// Concatenated descendant text, stopping at the next indexed element so
/// sibling indexed elements never share text blocks.
pub fn text_until_next_clickable(arena: &DomArena, id: NodeId) -> String {
    let mut parts = Vec::new();
    if let Some(el) = arena.element(id) {
        for &child in &el.children {
            collect_text(arena, child, &mut parts);
        }
    }
    parts.join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collect_text(arena: &DomArena, id: NodeId, parts: &mut Vec<String>) {
    match arena.get(id) {
        DomNode::Text(text) => {
            let trimmed = text.text.trim();
            if !trimmed.is_empty() {
                parts.push(trimmed.to_string());
            }
        }
        DomNode::Element(el) => {
            if el.highlight_index.is_some() {
                return;
            }
            for &child in &el.children {
                collect_text(arena, child, parts);
            }
        }
    }
}
