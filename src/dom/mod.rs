//! DOM perception module
//!
//! Turns the flat node map produced by the in-page extraction script into an
//! indexed snapshot the agent can reason about:
//! - node/arena types for the ownership tree with parent back-references
//! - snapshot builder (flat map -> tree + selector map)
//! - line serializer producing the LLM-facing element listing
//! - history projections and structural fingerprints for staleness checks

pub mod history;
pub mod node;
pub mod selector_map;
pub mod serializer;
pub mod snapshot;

pub use history::{DomHistoryElement, HashedDomElement, hash_dom_element, selector_fingerprints, to_history_element};
pub use node::{DomArena, DomNode, ElementNode, NodeId, Rect, TextNode, ViewportInfo};
pub use selector_map::SelectorMap;
pub use serializer::clickable_elements_to_string;
pub use snapshot::{DomTree, RawDomNode, RawDomPage, build_dom_tree, parse_dom_snapshot};

/// JavaScript source evaluated in the page to produce the flat node map
pub const EXTRACT_DOM_JS: &str = include_str!("extract_dom.js");
