/*!
Small CFG helpers shared by the alias machinery.
*/

use crate::block::BlockId;
use crate::function::Function;
use std::collections::{HashMap, HashSet, VecDeque};

/// Predecessor lists for every block.
pub fn predecessors(func: &Function) -> HashMap<BlockId, Vec<BlockId>> {
    let mut preds: HashMap<BlockId, Vec<BlockId>> = HashMap::new();
    for id in func.blocks.keys() {
        preds.entry(*id).or_default();
    }
    for (id, block) in &func.blocks {
        for succ in block.successors() {
            preds.entry(succ).or_default().push(*id);
        }
    }
    preds
}

/// Budget on blocks explored before giving a conservative answer.
const REACHABILITY_SCAN_LIMIT: usize = 32;

/// Whether control can flow from `from` to `to`. Bounded breadth-first
/// search over successors; answers `true` once the budget is exhausted,
/// so a `false` is always trustworthy.
pub fn is_potentially_reachable(func: &Function, from: BlockId, to: BlockId) -> bool {
    if from == to {
        return true;
    }
    let mut visited = HashSet::new();
    let mut worklist = VecDeque::new();
    worklist.push_back(from);
    visited.insert(from);
    while let Some(block) = worklist.pop_front() {
        if visited.len() > REACHABILITY_SCAN_LIMIT {
            return true;
        }
        let Some(bb) = func.block(block) else {
            continue;
        };
        for succ in bb.successors() {
            if succ == to {
                return true;
            }
            if visited.insert(succ) {
                worklist.push_back(succ);
            }
        }
    }
    false
}
