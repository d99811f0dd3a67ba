//! Basic blocks and CFG edges (§3 "Basic block", §5 "Ordering guarantees").
//!
//! Predecessor/successor bookkeeping here is a plain `Vec`-based adjacency
//! list rather than `cranelift-codegen`'s `flowgraph.rs` (which layers a
//! `cranelift_bforest` forest map on top of the instruction arena to recover
//! predecessors from branch instructions lazily). This crate's blocks are
//! few and its CFGs small enough that an explicitly maintained `Vec<Block>`
//! per block is simpler and just as correct; see `DESIGN.md` for the
//! tradeoff.

use crate::ir::value::{Block, Inst};

/// An ordered sequence of instructions terminated by a branch (§3).
#[derive(Clone, Debug, Default)]
pub struct BlockData {
    /// User-visible name, for pretty-printing.
    pub name: Option<String>,
    /// Instructions in emission order; the last one must be a branch.
    pub insts: Vec<Inst>,
    /// Predecessor blocks, in the order edges were added.
    pub preds: Vec<Block>,
    /// Successor blocks, in the order edges were added.
    pub succs: Vec<Block>,
}

impl BlockData {
    /// An empty block with no instructions or edges.
    pub fn new() -> Self {
        BlockData::default()
    }

    /// Append an instruction to the end of the block.
    pub fn push_inst(&mut self, inst: Inst) {
        self.insts.push(inst);
    }

    /// The block's terminator, if any instructions have been appended.
    pub fn terminator(&self) -> Option<Inst> {
        self.insts.last().copied()
    }

    fn add_edge_target(list: &mut Vec<Block>, b: Block) {
        if !list.contains(&b) {
            list.push(b);
        }
    }

    /// Record `succ` as a successor of this block.
    pub fn add_succ(&mut self, succ: Block) {
        Self::add_edge_target(&mut self.succs, succ);
    }

    /// Record `pred` as a predecessor of this block.
    pub fn add_pred(&mut self, pred: Block) {
        Self::add_edge_target(&mut self.preds, pred);
    }

    /// Is this block a critical-edge source, i.e. does it have more than one
    /// successor? Used by the emission driver to decide whether an
    /// edge-transition stub must be placed inline at the successor's entry
    /// rather than appended after this block (§4.6 step 3a).
    pub fn is_multi_successor(&self) -> bool {
        self.succs.len() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityRef;

    #[test]
    fn tracks_terminator_as_last_instruction() {
        let mut b = BlockData::new();
        assert!(b.terminator().is_none());
        b.push_inst(Inst::new(0));
        b.push_inst(Inst::new(1));
        assert_eq!(b.terminator(), Some(Inst::new(1)));
    }

    #[test]
    fn edges_are_set_semantic() {
        let mut b = BlockData::new();
        b.add_succ(Block::new(1));
        b.add_succ(Block::new(1));
        b.add_succ(Block::new(2));
        assert_eq!(b.succs, vec![Block::new(1), Block::new(2)]);
        assert!(b.is_multi_successor());
    }
}
