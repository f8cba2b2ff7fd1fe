//! Barcode correction graph.
//!
//! Barcodes that align to each other (after upstream quality filtering)
//! form the nodes and edges of an undirected graph; each connected
//! component is presumed to be one true barcode plus its sequencing-error
//! variants. This crate owns the graph itself: an arena of interned
//! barcode nodes, adjacency sets, union-find connected components,
//! canonical-member selection under a configurable policy, and the
//! component-shape diagnostics (isomorphism classes, centralization).
//!
//! Only the operations the pipeline needs are implemented — add-edge,
//! components, degree, and a shape check — rather than pulling in a
//! general graph library.

use ahash::{AHashMap, AHashSet};
use log::debug;

/// Policy for choosing the canonical barcode of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChoosePolicy {
    /// Highest total read-pair count wins.
    #[default]
    Count,
    /// Highest within-component degree wins.
    Connect,
}

/// Union-find over node indices with path compression and union by rank.
#[derive(Debug, Default)]
struct UnionFind {
    parent: Vec<u32>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn push(&mut self) {
        let idx = u32::try_from(self.parent.len()).expect("node count fits in u32");
        self.parent.push(idx);
        self.rank.push(0);
    }

    fn find(&mut self, node: u32) -> u32 {
        let mut root = node;
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }
        // Path compression.
        let mut current = node;
        while self.parent[current as usize] != root {
            current = std::mem::replace(&mut self.parent[current as usize], root);
        }
        root
    }

    fn union(&mut self, a: u32, b: u32) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra as usize].cmp(&self.rank[rb as usize]) {
            std::cmp::Ordering::Less => self.parent[ra as usize] = rb,
            std::cmp::Ordering::Greater => self.parent[rb as usize] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb as usize] = ra;
                self.rank[ra as usize] += 1;
            }
        }
    }
}

/// Undirected graph over observed barcode sequences.
///
/// Nodes are interned in insertion order; parallel edges collapse and
/// self-edges are ignored, so `degree` counts distinct neighbors.
#[derive(Debug, Default)]
pub struct BarcodeGraph {
    nodes: Vec<String>,
    index: AHashMap<String, u32>,
    adjacency: Vec<AHashSet<u32>>,
}

impl BarcodeGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when no barcode has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The barcode sequence of a node.
    #[must_use]
    pub fn barcode(&self, node: u32) -> &str {
        &self.nodes[node as usize]
    }

    /// Number of distinct neighbors of a node.
    #[must_use]
    pub fn degree(&self, node: u32) -> usize {
        self.adjacency[node as usize].len()
    }

    /// Interns a barcode, returning its node index.
    pub fn add_node(&mut self, barcode: &str) -> u32 {
        if let Some(&idx) = self.index.get(barcode) {
            return idx;
        }
        let idx = u32::try_from(self.nodes.len()).expect("node count fits in u32");
        self.nodes.push(barcode.to_string());
        self.index.insert(barcode.to_string(), idx);
        self.adjacency.push(AHashSet::new());
        idx
    }

    /// Adds an undirected edge between two barcodes, interning as needed.
    /// Self-edges are ignored.
    pub fn add_edge(&mut self, a: &str, b: &str) {
        let ai = self.add_node(a);
        let bi = self.add_node(b);
        if ai == bi {
            return;
        }
        self.adjacency[ai as usize].insert(bi);
        self.adjacency[bi as usize].insert(ai);
    }

    /// Connected components, each listing its members in insertion order;
    /// components themselves ordered by their earliest-inserted member.
    #[must_use]
    pub fn components(&self) -> Vec<Vec<u32>> {
        let mut uf = UnionFind::default();
        for _ in 0..self.nodes.len() {
            uf.push();
        }
        for (node, neighbors) in self.adjacency.iter().enumerate() {
            for &neighbor in neighbors {
                uf.union(u32::try_from(node).expect("fits"), neighbor);
            }
        }

        let mut component_of_root: AHashMap<u32, usize> = AHashMap::new();
        let mut components: Vec<Vec<u32>> = Vec::new();
        for node in 0..u32::try_from(self.nodes.len()).expect("fits") {
            let root = uf.find(node);
            let slot = *component_of_root.entry(root).or_insert_with(|| {
                components.push(Vec::new());
                components.len() - 1
            });
            components[slot].push(node);
        }
        components
    }

    /// Builds the barcode → canonical-barcode correction map.
    ///
    /// Members of each multi-node component are sorted in stable
    /// descending order of the policy key (total read-pair count, or
    /// within-component degree); the top member is canonical and every
    /// other member maps to it. Canonical barcodes never appear as keys,
    /// so applying the map twice is a no-op.
    pub fn correction_table<F>(
        &self,
        policy: ChoosePolicy,
        count_of: F,
    ) -> AHashMap<String, String>
    where
        F: Fn(&str) -> u64,
    {
        let mut corrections = AHashMap::new();
        for mut members in self.components() {
            if members.len() < 2 {
                continue;
            }
            match policy {
                ChoosePolicy::Count => {
                    members.sort_by_key(|&node| std::cmp::Reverse(count_of(self.barcode(node))));
                }
                ChoosePolicy::Connect => {
                    members.sort_by_key(|&node| std::cmp::Reverse(self.degree(node)));
                }
            }
            let canonical = self.barcode(members[0]);
            for &member in &members[1..] {
                let barcode = self.barcode(member);
                debug!("correcting {barcode} -> {canonical}");
                corrections.insert(barcode.to_string(), canonical.to_string());
            }
        }
        corrections
    }

    /// Classifies the components into isomorphism classes.
    ///
    /// Returns the classes in discovery order; `count_of` supplies the
    /// per-barcode read-pair totals used by the centralization check.
    pub fn count_structures<F>(&self, count_of: F) -> Vec<Structure>
    where
        F: Fn(&str) -> u64,
    {
        let mut structures: Vec<Structure> = Vec::new();
        for members in self.components() {
            let shape = self.local_shape(&members);
            let central = u64::from(self.is_centralized(&members, &count_of));
            match structures.iter().position(|s| is_isomorphic(&s.shape, &shape)) {
                Some(index) => {
                    structures[index].count += 1;
                    structures[index].central += central;
                }
                None => {
                    let mut degrees: Vec<usize> = shape.iter().map(|edges| edges.len()).collect();
                    degrees.sort_unstable_by(|a, b| b.cmp(a));
                    structures.push(Structure {
                        size: members.len(),
                        count: 1,
                        central,
                        degrees,
                        shape,
                    });
                }
            }
        }
        structures
    }

    /// Whether a component's read pairs are centralized: only its
    /// highest-degree node may carry more than one read pair. Two-node
    /// components are decided purely on counts, since both nodes have
    /// degree one.
    pub fn is_centralized<F>(&self, members: &[u32], count_of: F) -> bool
    where
        F: Fn(&str) -> u64,
    {
        if members.len() == 2 {
            let total1 = count_of(self.barcode(members[0]));
            let total2 = count_of(self.barcode(members[1]));
            return (total1 >= 1 && total2 == 1) || (total1 == 1 && total2 >= 1);
        }
        let mut by_degree = members.to_vec();
        by_degree.sort_by_key(|&node| std::cmp::Reverse(self.degree(node)));
        by_degree.iter().skip(1).all(|&node| count_of(self.barcode(node)) <= 1)
    }

    /// Re-labels a component's adjacency onto indices `0..len`.
    fn local_shape(&self, members: &[u32]) -> Vec<AHashSet<usize>> {
        let local: AHashMap<u32, usize> =
            members.iter().enumerate().map(|(i, &node)| (node, i)).collect();
        members
            .iter()
            .map(|&node| {
                self.adjacency[node as usize]
                    .iter()
                    .filter_map(|neighbor| local.get(neighbor).copied())
                    .collect()
            })
            .collect()
    }
}

/// One isomorphism class of component shapes.
#[derive(Debug)]
pub struct Structure {
    /// Node count of the shape.
    pub size: usize,
    /// How many components have this shape.
    pub count: u64,
    /// How many of those are centralized.
    pub central: u64,
    /// Degree sequence of the archetype, descending.
    pub degrees: Vec<usize>,
    shape: Vec<AHashSet<usize>>,
}

/// Graph isomorphism by backtracking with degree pruning. Components are
/// small (a true barcode plus a few error variants), so the exponential
/// worst case is irrelevant in practice.
fn is_isomorphic(a: &[AHashSet<usize>], b: &[AHashSet<usize>]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a_degrees: Vec<usize> = a.iter().map(|edges| edges.len()).collect();
    let mut b_degrees: Vec<usize> = b.iter().map(|edges| edges.len()).collect();
    a_degrees.sort_unstable();
    b_degrees.sort_unstable();
    if a_degrees != b_degrees {
        return false;
    }

    let mut mapping = vec![usize::MAX; a.len()];
    let mut used = vec![false; b.len()];
    extend_mapping(a, b, 0, &mut mapping, &mut used)
}

fn extend_mapping(
    a: &[AHashSet<usize>],
    b: &[AHashSet<usize>],
    next: usize,
    mapping: &mut [usize],
    used: &mut [bool],
) -> bool {
    if next == a.len() {
        return true;
    }
    for candidate in 0..b.len() {
        if used[candidate] || a[next].len() != b[candidate].len() {
            continue;
        }
        // Every already-mapped neighbor relationship must be preserved.
        let consistent = (0..next).all(|prev| {
            a[next].contains(&prev) == b[candidate].contains(&mapping[prev])
        });
        if !consistent {
            continue;
        }
        mapping[next] = candidate;
        used[candidate] = true;
        if extend_mapping(a, b, next + 1, mapping, used) {
            return true;
        }
        mapping[next] = usize::MAX;
        used[candidate] = false;
    }
    false
}

/// Swaps the two halves of a barcode (alpha+beta -> beta+alpha).
///
/// For odd lengths the first "half" is the shorter one, matching how the
/// two-part barcodes are split upstream.
#[must_use]
pub fn half_swapped(barcode: &str) -> String {
    let (alpha, beta) = barcode.split_at(barcode.len() / 2);
    format!("{beta}{alpha}")
}
