//! Def-use and use-def maps, built from the CFG via an iterative
//! reaching-definitions dataflow fixpoint.

use std::collections::HashMap;

use bitvec::prelude::*;

use crate::config::Config;
use crate::error::Result;
use crate::graph::Graph;
use crate::ir::{BlockId, Register};

/// A definition site: `(register, block, instruction index within block)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DefSite {
    pub register: Register,
    pub block: BlockId,
    pub index: usize,
}

/// A use site: `(register, block, instruction index within block)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UseSite {
    pub register: Register,
    pub block: BlockId,
    pub index: usize,
}

/// Maps each definition to the use sites it reaches.
#[derive(Debug, Clone, Default)]
pub struct DefUseMap(pub HashMap<DefSite, Vec<UseSite>>);

/// Maps each use to the definitions that reach it. After variable
/// splitting this collapses to exactly one definition per use; before
/// splitting a use may have several reaching definitions (a join point).
#[derive(Debug, Clone, Default)]
pub struct UseDefMap(pub HashMap<UseSite, Vec<DefSite>>);

/// A synthetic definition index used as the entry point for a parameter
/// register; `index` is unused past ordering (parameters have no real
/// instruction slot, so they're placed before index 0 of the entry block).
const PARAM_DEF_INDEX: usize = usize::MAX;

/// Build bidirectional def-use maps for a method.
///
/// Synthesises a definition for each parameter register at method entry,
/// then computes reaching definitions via iterative forward dataflow:
/// `out[b] = gen[b] ∪ (in[b] - kill[b])`, `in[b] = ⋃ out[pred]`. Complexity
/// is `O(N·V)` with `V` registers, bounded by the bitset width.
pub fn build_def_use(
    graph: &Graph,
    param_regs: &[Register],
    _config: &Config,
) -> Result<(UseDefMap, DefUseMap)> {
    // Enumerate every definition site: synthetic parameter defs first, then
    // one per instruction that writes a register, in block/index order.
    let mut defs: Vec<DefSite> = Vec::new();
    for reg in param_regs {
        defs.push(DefSite { register: *reg, block: graph.entry, index: PARAM_DEF_INDEX });
    }
    let mut block_ids = graph.block_ids();
    block_ids.sort_by_key(|b| b.0);
    for id in &block_ids {
        let block = graph.get(*id)?;
        for (idx, inst) in block.instructions.iter().enumerate() {
            if let Some(reg) = inst.writes() {
                defs.push(DefSite { register: reg, block: *id, index: idx });
            }
        }
    }
    let def_index: HashMap<DefSite, usize> =
        defs.iter().enumerate().map(|(i, d)| (*d, i)).collect();
    let n = defs.len();

    // kill[r] = every def site index for register r.
    let mut defs_of_register: HashMap<Register, Vec<usize>> = HashMap::new();
    for (i, d) in defs.iter().enumerate() {
        defs_of_register.entry(d.register).or_default().push(i);
    }

    // gen[block] / kill[block] as bit vectors over def indices.
    let mut gen: HashMap<BlockId, BitVec> = HashMap::new();
    let mut kill: HashMap<BlockId, BitVec> = HashMap::new();
    for id in &block_ids {
        let mut g = bitvec![0; n];
        let mut k = bitvec![0; n];
        if *id == graph.entry {
            for reg in param_regs {
                let idx = def_index[&DefSite { register: *reg, block: graph.entry, index: PARAM_DEF_INDEX }];
                g.set(idx, true);
            }
        }
        let block = graph.get(*id)?;
        for (pos, inst) in block.instructions.iter().enumerate() {
            if let Some(reg) = inst.writes() {
                let this_def = def_index[&DefSite { register: reg, block: *id, index: pos }];
                // Earlier defs of the same register in this block are
                // killed locally (overwritten before block exit).
                for &other in &defs_of_register[&reg] {
                    if other != this_def {
                        g.set(other, false);
                        k.set(other, true);
                    }
                }
                g.set(this_def, true);
            }
        }
        gen.insert(*id, g);
        kill.insert(*id, k);
    }

    let mut in_sets: HashMap<BlockId, BitVec> =
        block_ids.iter().map(|id| (*id, bitvec![0; n])).collect();
    let mut out_sets: HashMap<BlockId, BitVec> = block_ids
        .iter()
        .map(|id| (*id, gen[id].clone()))
        .collect();

    let mut changed = true;
    while changed {
        changed = false;
        for id in &block_ids {
            let block = graph.get(*id)?;
            let mut new_in = bitvec![0; n];
            for pred in &block.predecessors {
                if let Some(pred_out) = out_sets.get(pred) {
                    new_in |= pred_out.clone();
                }
            }
            let mut new_out = new_in.clone();
            new_out &= !kill[id].clone();
            new_out |= gen[id].clone();

            if new_in != in_sets[id] || new_out != out_sets[id] {
                changed = true;
            }
            in_sets.insert(*id, new_in);
            out_sets.insert(*id, new_out);
        }
    }

    // Resolve each use against the `in` set of its block, adjusted for any
    // definitions of the same register earlier in the same block.
    let mut use_defs = UseDefMap::default();
    let mut def_uses = DefUseMap::default();
    for d in &defs {
        def_uses.0.entry(*d).or_default();
    }

    for id in &block_ids {
        let block = graph.get(*id)?;
        let mut reaching = in_sets[id].clone();
        for (pos, inst) in block.instructions.iter().enumerate() {
            for reg in inst.reads() {
                let mut reached: Vec<DefSite> = defs_of_register
                    .get(&reg)
                    .into_iter()
                    .flatten()
                    .filter(|&&i| reaching[i])
                    .map(|&i| defs[i])
                    .collect();
                reached.sort_by_key(|d| (d.block.0, d.index));
                let use_site = UseSite { register: reg, block: *id, index: pos };
                for d in &reached {
                    def_uses.0.entry(*d).or_default().push(use_site);
                }
                use_defs.0.insert(use_site, reached);
            }
            if let Some(reg) = inst.writes() {
                let this_def = def_index[&DefSite { register: reg, block: *id, index: pos }];
                for &other in &defs_of_register[&reg] {
                    reaching.set(other, false);
                }
                reaching.set(this_def, true);
            }
        }
    }

    Ok((use_defs, def_uses))
}
