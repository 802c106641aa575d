//! Merkle machinery for the two proof shapes this chain verifies: an SSZ
//! list element bound into a container field (a blob commitment inside a
//! block body) and a flat branch whose length mix-in travels inside the
//! proof (the deposit tree).
//! https://ethereum.github.io/consensus-specs/ssz/merkle-proofs

use alloy_primitives::B256;
use anyhow::ensure;
use ethereum_hashing::hash32_concat;

fn parent(left: &B256, right: &B256) -> B256 {
    hash32_concat(left.as_slice(), right.as_slice()).into()
}

/// A zero-padded binary tree over chunk roots, kept level by level with
/// the leaves first. Proofs are read off by walking sibling positions up
/// the levels.
pub struct ChunkTree {
    levels: Vec<Vec<B256>>,
}

impl ChunkTree {
    /// Build over `leaves`, padded with zero chunks to `1 << depth`.
    pub fn build(leaves: &[B256], depth: u64) -> anyhow::Result<Self> {
        let width = 1usize << depth;
        ensure!(
            leaves.len() <= width,
            "{} leaves do not fit a depth-{depth} tree",
            leaves.len()
        );

        let mut level = leaves.to_vec();
        level.resize(width, B256::ZERO);
        let mut levels = vec![level];
        for _ in 0..depth {
            let below = levels.last().expect("at least the leaf level");
            let above = below
                .chunks(2)
                .map(|pair| parent(&pair[0], &pair[1]))
                .collect();
            levels.push(above);
        }

        Ok(Self { levels })
    }

    pub fn root(&self) -> B256 {
        self.levels.last().expect("at least the leaf level")[0]
    }

    /// Sibling hashes for `index`, leaf level first.
    pub fn proof(&self, index: u64) -> anyhow::Result<Vec<B256>> {
        let mut position = index as usize;
        ensure!(position < self.levels[0].len(), "leaf index out of range");

        let mut branch = Vec::with_capacity(self.levels.len() - 1);
        for level in &self.levels[..self.levels.len() - 1] {
            branch.push(level[position ^ 1]);
            position >>= 1;
        }
        Ok(branch)
    }
}

/// Walk `branch` from `leaf` up to a root, taking the left or right slot
/// at each level from the bits of `index`.
pub fn verify_merkle_branch(
    leaf: B256,
    branch: &[B256],
    depth: u64,
    index: u64,
    root: B256,
) -> bool {
    if (branch.len() as u64) < depth {
        return false;
    }
    let mut node = leaf;
    let mut position = index;
    for sibling in &branch[..depth as usize] {
        node = if position & 1 == 1 {
            parent(sibling, &node)
        } else {
            parent(&node, sibling)
        };
        position >>= 1;
    }
    node == root
}

/// SSZ length mix-in chunk for a list of `length` elements.
pub fn length_chunk(length: usize) -> B256 {
    let mut chunk = [0u8; 32];
    chunk[..8].copy_from_slice(&(length as u64).to_le_bytes());
    B256::new(chunk)
}

/// Root of an SSZ list given the root of its data tree and its length.
pub fn mix_in_length(root: B256, length: usize) -> B256 {
    parent(&root, &length_chunk(length))
}

/// Branch proving `list_leaves[index]` of an SSZ list that sits at
/// `field_index` of an SSZ container: the list branch, the list's length
/// chunk, then the container branch, leaf first.
///
/// `field_roots` are the container's field roots in declaration order;
/// the entry at `field_index` must be the list's mixed-in root, which is
/// checked so a drifting caller cannot produce a proof that will never
/// verify.
pub fn list_in_container_proof(
    list_leaves: &[B256],
    index: u64,
    list_depth: u64,
    field_roots: &[B256],
    field_index: u64,
    container_depth: u64,
) -> anyhow::Result<Vec<B256>> {
    let list_tree = ChunkTree::build(list_leaves, list_depth)?;
    ensure!(
        field_roots.get(field_index as usize)
            == Some(&mix_in_length(list_tree.root(), list_leaves.len())),
        "field root at {field_index} is not the mixed-in list root"
    );

    let mut branch = list_tree.proof(index)?;
    branch.push(length_chunk(list_leaves.len()));

    let container_tree = ChunkTree::build(field_roots, container_depth)?;
    branch.extend(container_tree.proof(field_index)?);

    Ok(branch)
}

/// Leaf position of list element `index` within the combined branch of
/// [`list_in_container_proof`]: the list bits, one bit for the length
/// mix-in (the data tree is the left child), then the field bits.
pub fn list_in_container_index(index: u64, list_depth: u64, field_index: u64) -> u64 {
    field_index << (list_depth + 1) | index
}

/// Check a combined branch produced by [`list_in_container_proof`]
/// against the container root.
pub fn verify_list_in_container(
    leaf: B256,
    branch: &[B256],
    index: u64,
    list_depth: u64,
    field_index: u64,
    container_depth: u64,
    root: B256,
) -> bool {
    let depth = list_depth + 1 + container_depth;
    branch.len() as u64 == depth
        && verify_merkle_branch(
            leaf,
            branch,
            depth,
            list_in_container_index(index, list_depth, field_index),
            root,
        )
}
