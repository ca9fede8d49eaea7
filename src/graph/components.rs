//! Connected component analysis

use std::collections::BTreeMap;

use crate::graph::InteractionGraph;

/// Union-find over node indices. `find` halves paths as it walks, and
/// `union` hangs the smaller set under the larger one.
pub struct DisjointSets {
    parent: Vec<u32>,
    members: Vec<u32>,
    sets: usize,
}

impl DisjointSets {
    pub fn new(len: usize) -> Self {
        Self {
            parent: (0..len as u32).collect(),
            members: vec![1; len],
            sets: len,
        }
    }

    pub fn find(&mut self, mut x: u32) -> u32 {
        while self.parent[x as usize] != x {
            let grandparent = self.parent[self.parent[x as usize] as usize];
            self.parent[x as usize] = grandparent;
            x = grandparent;
        }
        x
    }

    /// Merge the sets holding `x` and `y`; false if they already share one
    pub fn union(&mut self, x: u32, y: u32) -> bool {
        let (mut big, mut small) = (self.find(x), self.find(y));
        if big == small {
            return false;
        }
        if self.members[big as usize] < self.members[small as usize] {
            std::mem::swap(&mut big, &mut small);
        }
        self.parent[small as usize] = big;
        self.members[big as usize] += self.members[small as usize];
        self.sets -= 1;
        true
    }

    /// Number of elements in the set holding `x`
    pub fn set_len(&mut self, x: u32) -> usize {
        let root = self.find(x);
        self.members[root as usize] as usize
    }

    /// Number of disjoint sets
    pub fn set_count(&self) -> usize {
        self.sets
    }
}

/// Components as ascending node-index lists, ordered by smallest member
pub fn connected_components(graph: &InteractionGraph) -> Vec<Vec<usize>> {
    let node_count = graph.node_count();
    let mut sets = DisjointSets::new(node_count);

    for node in 0..node_count {
        for &neighbor in graph.neighbors(node) {
            if (neighbor as usize) > node {
                sets.union(node as u32, neighbor);
            }
        }
    }

    // Iterating nodes in order makes every member list sorted and keys the
    // map by each component's first node.
    let mut first_member: BTreeMap<u32, usize> = BTreeMap::new();
    let mut components: Vec<Vec<usize>> = Vec::new();
    for node in 0..node_count {
        let root = sets.find(node as u32);
        let slot = *first_member.entry(root).or_insert_with(|| {
            components.push(Vec::new());
            components.len() - 1
        });
        components[slot].push(node);
    }

    components
}
