use crate::dom::node::{DomArena, NodeId, Rect, ViewportInfo};
use crate::dom::snapshot::DomTree;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Structural fingerprint of one interactive element.
///
/// Combines the ancestor tag path, the attribute set and the xpath; two
/// snapshots that disagree on any component describe different interactive
/// structure. Used by the staleness check between queued actions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HashedDomElement {
    pub branch_path_hash: String,
    pub attributes_hash: String,
    pub xpath_hash: String,
}

impl HashedDomElement {
    /// Single string form, convenient for set membership
    pub fn fingerprint(&self) -> String {
        sha256_hex(&format!(
            "{}-{}-{}",
            self.branch_path_hash, self.attributes_hash, self.xpath_hash
        ))
    }
}

/// Copied-out descriptor of an element the agent interacted with.
///
/// Owns its data so it survives the snapshot that produced it; stored in
/// step history, never back-resolved into a live tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DomHistoryElement {
    pub tag_name: String,
    pub xpath: String,
    pub highlight_index: Option<usize>,
    pub entire_parent_branch_path: Vec<String>,
    pub attributes: HashMap<String, String>,
    pub shadow_root: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_coordinates: Option<Rect>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewport_coordinates: Option<Rect>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewport_info: Option<ViewportInfo>,
}

/// Hash an element's structural identity
pub fn hash_dom_element(arena: &DomArena, id: NodeId) -> Option<HashedDomElement> {
    let el = arena.element(id)?;
    let branch_path = arena.parent_branch_path(id).join("/");

    // BTreeMap gives a stable attribute order independent of capture order
    let attributes: BTreeMap<&String, &String> = el.attributes.iter().collect();
    let attr_string = attributes
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(";");

    Some(HashedDomElement {
        branch_path_hash: sha256_hex(&branch_path),
        attributes_hash: sha256_hex(&attr_string),
        xpath_hash: sha256_hex(&el.xpath),
    })
}

/// Fingerprints of every indexed element in the snapshot's selector map
pub fn selector_fingerprints(tree: &DomTree) -> HashSet<String> {
    tree.selector_map
        .nodes()
        .filter_map(|id| hash_dom_element(&tree.arena, id))
        .map(|h| h.fingerprint())
        .collect()
}

/// Project an element into its long-lived history form
pub fn to_history_element(arena: &DomArena, id: NodeId) -> Option<DomHistoryElement> {
    let el = arena.element(id)?;
    Some(DomHistoryElement {
        tag_name: el.tag_name.clone(),
        xpath: el.xpath.clone(),
        highlight_index: el.highlight_index,
        entire_parent_branch_path: arena.parent_branch_path(id),
        attributes: el.attributes.clone(),
        shadow_root: el.shadow_root,
        page_coordinates: el.page_coordinates.clone(),
        viewport_coordinates: el.viewport_coordinates.clone(),
        viewport_info: el.viewport_info.clone(),
    })
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::snapshot::{RawDomPage, build_dom_tree};

    fn page_with_buttons(extra_button: bool) -> DomTree {
        let mut map = serde_json::json!({
            "1": {"tagName": "body", "isVisible": true, "children": ["2"]},
            "2": {"tagName": "button", "xpath": "/html/body/button[1]",
                  "attributes": {"id": "a"}, "isVisible": true,
                  "isInteractive": true, "highlightIndex": 0, "children": []}
        });
        if extra_button {
            map["1"]["children"] = serde_json::json!(["2", "3"]);
            map["3"] = serde_json::json!({
                "tagName": "button", "xpath": "/html/body/button[2]",
                "attributes": {"id": "b"}, "isVisible": true,
                "isInteractive": true, "highlightIndex": 1, "children": []
            });
        }
        let page: RawDomPage =
            serde_json::from_value(serde_json::json!({"rootId": "1", "map": map})).unwrap();
        build_dom_tree(&page).unwrap()
    }

    #[test]
    fn test_hash_is_deterministic() {
        let tree_a = page_with_buttons(false);
        let tree_b = page_with_buttons(false);

        let id_a = tree_a.selector_map.get(0).unwrap();
        let id_b = tree_b.selector_map.get(0).unwrap();

        assert_eq!(
            hash_dom_element(&tree_a.arena, id_a),
            hash_dom_element(&tree_b.arena, id_b)
        );
    }

    #[test]
    fn test_hash_changes_with_xpath() {
        let tree = page_with_buttons(true);
        let first = hash_dom_element(&tree.arena, tree.selector_map.get(0).unwrap()).unwrap();
        let second = hash_dom_element(&tree.arena, tree.selector_map.get(1).unwrap()).unwrap();

        assert_eq!(first.branch_path_hash, second.branch_path_hash);
        assert_ne!(first.xpath_hash, second.xpath_hash);
        assert_ne!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn test_grown_page_is_not_subset() {
        let before = selector_fingerprints(&page_with_buttons(false));
        let after = selector_fingerprints(&page_with_buttons(true));

        // Old structure persists but new structure appeared
        assert!(before.is_subset(&after));
        assert!(!after.is_subset(&before));
    }

    #[test]
    fn test_history_projection_owns_data() {
        let tree = page_with_buttons(false);
        let id = tree.selector_map.get(0).unwrap();
        let hist = to_history_element(&tree.arena, id).unwrap();

        assert_eq!(hist.tag_name, "button");
        assert_eq!(hist.xpath, "/html/body/button[1]");
        assert_eq!(hist.highlight_index, Some(0));
        assert_eq!(hist.entire_parent_branch_path, vec!["body", "button"]);
        assert_eq!(hist.attributes.get("id"), Some(&"a".to_string()));

        // Tree can be dropped; the projection stands alone
        drop(tree);
        assert_eq!(hist.tag_name, "button");
    }
}
