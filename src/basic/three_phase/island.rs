use super::network::SequenceModel;

/// Union-find over bus positions with path compression and union by rank.
#[derive(Debug, Clone)]
pub(crate) struct NodeMerge {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl NodeMerge {
    pub fn new(nodes: usize) -> Self {
        Self {
            parent: (0..nodes).collect(),
            rank: vec![0; nodes],
        }
    }

    /// Finds the root of a node, compressing the path on the way.
    pub fn find(&mut self, node: usize) -> usize {
        let mut root = node;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut current = node;
        while self.parent[current] != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }
        root
    }

    /// Merges the sets containing the two nodes.
    pub fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

/// Bijection between bus-table positions and the dense internal index space.
///
/// Internal indices follow the order of the bus table among the included buses.
#[derive(Debug, Clone, PartialEq)]
pub struct BusIndexMap {
    internal: Vec<Option<usize>>,
    positions: Vec<usize>,
    source: usize,
}

impl BusIndexMap {
    /// Number of included buses.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Internal index of the source bus.
    pub fn source(&self) -> usize {
        self.source
    }

    /// Internal index of the bus at `position`, `None` if excluded.
    #[inline]
    pub fn internal(&self, position: usize) -> Option<usize> {
        self.internal[position]
    }

    /// Bus-table position of an internal index.
    #[inline]
    pub fn position(&self, internal: usize) -> usize {
        self.positions[internal]
    }

    /// Internal indices of both ends if they are included.
    pub fn branch(&self, from: usize, to: usize) -> Option<(usize, usize)> {
        Some((self.internal(from)?, self.internal(to)?))
    }
}

/// Finds the buses energized from the source.
///
/// A bus is included iff it is in service and connected to `source` through in-service
/// branches whose both ends are in service. `source` must be an in-service position.
pub fn detect_islands(
    bus_in_service: &[bool],
    branches: impl IntoIterator<Item = (usize, usize)>,
    source: usize,
) -> BusIndexMap {
    let n = bus_in_service.len();
    let mut merge = NodeMerge::new(n);
    for (from, to) in branches {
        if bus_in_service[from] && bus_in_service[to] {
            merge.union(from, to);
        }
    }

    let root = merge.find(source);
    let mut internal = vec![None; n];
    let mut positions = Vec::new();
    for position in 0..n {
        if bus_in_service[position] && merge.find(position) == root {
            internal[position] = Some(positions.len());
            positions.push(position);
        }
    }
    let source = internal[source].unwrap_or_default();
    BusIndexMap {
        internal,
        positions,
        source,
    }
}

impl SequenceModel {
    /// Island detection over the in-service branches of this model.
    pub fn bus_index_map(&self) -> BusIndexMap {
        detect_islands(
            &self.buses.in_service,
            self.branches
                .iter()
                .filter(|b| b.in_service)
                .map(|b| (b.from, b.to)),
            self.source.bus,
        )
    }
}
