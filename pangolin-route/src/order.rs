//! Vertex relabelling for run-length friendliness.
//!
//! A depth-first preorder clusters the descendants of each subtree into a
//! contiguous id range, and targets inside one subtree tend to share their
//! first move from far-away sources. The ordering depends only on the graph,
//! never on a particular source.

use pangolin_common::{Error, Result};

use crate::graph::XyGraph;

/// A bijection between original vertex ids and ordered column ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeOrder {
    to_new: Vec<u32>,
    to_old: Vec<u32>,
}

impl NodeOrder {
    /// Depth-first preorder from vertex 0, deterministic: neighbours are
    /// visited in ascending original-id order, and every component after the
    /// first is entered at its smallest unvisited id.
    pub fn dfs_preorder(graph: &XyGraph) -> Self {
        let n = graph.num_vertices();
        let mut to_new = vec![u32::MAX; n];
        let mut to_old = Vec::with_capacity(n);
        let mut stack = Vec::new();

        for root in 0..n as u32 {
            if to_new[root as usize] != u32::MAX {
                continue;
            }
            stack.push(root);
            while let Some(v) = stack.pop() {
                if to_new[v as usize] != u32::MAX {
                    continue;
                }
                to_new[v as usize] = to_old.len() as u32;
                to_old.push(v);

                // Push in descending id order so the smallest id pops first.
                let mut heads: Vec<u32> =
                    graph.out_edges(v).iter().map(|e| e.head).collect();
                heads.sort_unstable_by(|a, b| b.cmp(a));
                for head in heads {
                    if to_new[head as usize] == u32::MAX {
                        stack.push(head);
                    }
                }
            }
        }

        NodeOrder { to_new, to_old }
    }

    /// Rebuild an ordering from its two halves (as stored in a CPD file),
    /// verifying that they are inverse bijections.
    pub fn from_parts(to_new: Vec<u32>, to_old: Vec<u32>) -> Result<Self> {
        let n = to_new.len();
        if to_old.len() != n {
            return Err(Error::Io("ordering arrays disagree in length".to_string()));
        }
        for (old, &new) in to_new.iter().enumerate() {
            if new as usize >= n || to_old[new as usize] as usize != old {
                return Err(Error::Io("ordering arrays are not inverse bijections".to_string()));
            }
        }
        Ok(NodeOrder { to_new, to_old })
    }

    #[inline(always)]
    pub fn to_new(&self, old: u32) -> u32 {
        self.to_new[old as usize]
    }

    #[inline(always)]
    pub fn to_old(&self, new: u32) -> u32 {
        self.to_old[new as usize]
    }

    pub fn len(&self) -> usize {
        self.to_old.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_old.is_empty()
    }

    pub fn to_new_slice(&self) -> &[u32] {
        &self.to_new
    }

    pub fn to_old_slice(&self) -> &[u32] {
        &self.to_old
    }
}
