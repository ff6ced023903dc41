use crate::dom::node::NodeId;
use indexmap::IndexMap;

/// Map from highlight index to the element node carrying it.
///
/// Valid only for the lifetime of the snapshot that produced it; consumers
/// must re-fetch after any action that could mutate the page. Uses IndexMap
/// so iteration follows ascending index order after [`SelectorMap::sort`].
#[derive(Debug, Clone, Default)]
pub struct SelectorMap {
    map: IndexMap<usize, NodeId>,
}

impl SelectorMap {
    pub fn new() -> Self {
        Self { map: IndexMap::new() }
    }

    /// Register an element under its highlight index
    pub fn insert(&mut self, index: usize, node: NodeId) {
        self.map.insert(index, node);
    }

    /// Node handle for a highlight index
    pub fn get(&self, index: usize) -> Option<NodeId> {
        self.map.get(&index).copied()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.map.contains_key(&index)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Sort entries by highlight index (construction iterates an unordered map)
    pub fn sort(&mut self) {
        self.map.sort_keys();
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, NodeId)> + '_ {
        self.map.iter().map(|(k, v)| (*k, *v))
    }

    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.map.keys().copied()
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.map.values().copied()
    }
}
