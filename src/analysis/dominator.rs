use crate::analysis::cfg::predecessors;
use crate::block::BlockId;
use crate::function::Function;
use std::collections::{HashMap, HashSet};

/// Dominator tree for one function, built with the classic iterative
/// dataflow over reverse postorder.
#[derive(Debug, Clone)]
pub struct DominatorTree {
    idom: HashMap<BlockId, BlockId>,
}

impl DominatorTree {
    pub fn build(function: &Function) -> Self {
        let entry = function.entry_block();
        let mut idom = HashMap::new();

        let blocks = Self::reverse_postorder(function, entry);
        if blocks.len() <= 1 {
            return Self { idom };
        }

        let preds = predecessors(function);
        let mut doms: HashMap<BlockId, HashSet<BlockId>> = HashMap::new();
        doms.insert(entry, HashSet::from([entry]));
        for &block in &blocks[1..] {
            doms.insert(block, blocks.iter().copied().collect());
        }

        let mut changed = true;
        while changed {
            changed = false;
            for &block in &blocks[1..] {
                let block_preds = &preds[&block];
                if block_preds.is_empty() {
                    continue;
                }

                let mut new_dom: Option<HashSet<BlockId>> = None;
                for pred in block_preds {
                    if let Some(pred_dom) = doms.get(pred) {
                        new_dom = Some(match new_dom {
                            Some(acc) => acc.intersection(pred_dom).copied().collect(),
                            None => pred_dom.clone(),
                        });
                    }
                }

                if let Some(mut new_dom_set) = new_dom {
                    new_dom_set.insert(block);
                    if doms[&block] != new_dom_set {
                        doms.insert(block, new_dom_set);
                        changed = true;
                    }
                }
            }
        }

        for &block in &blocks {
            if block == entry {
                continue;
            }
            let dominators = &doms[&block];
            for &candidate in dominators {
                if candidate == block {
                    continue;
                }
                // Immediate dominator: no other strict dominator of `block`
                // is itself dominated by `candidate`'s strict dominators.
                let is_immediate = dominators.iter().all(|&other| {
                    other == block
                        || other == candidate
                        || !doms
                            .get(&candidate)
                            .is_some_and(|c_doms| c_doms.contains(&other))
                });
                if is_immediate {
                    idom.insert(block, candidate);
                    break;
                }
            }
        }

        Self { idom }
    }

    fn reverse_postorder(function: &Function, entry: BlockId) -> Vec<BlockId> {
        let mut visited = HashSet::new();
        let mut postorder = Vec::new();
        Self::dfs_postorder(function, entry, &mut visited, &mut postorder);
        postorder.reverse();
        postorder
    }

    fn dfs_postorder(
        function: &Function,
        block: BlockId,
        visited: &mut HashSet<BlockId>,
        postorder: &mut Vec<BlockId>,
    ) {
        if !visited.insert(block) {
            return;
        }
        if let Some(block_data) = function.block(block) {
            for succ in block_data.successors() {
                Self::dfs_postorder(function, succ, visited, postorder);
            }
        }
        postorder.push(block);
    }

    pub fn dominates(&self, dominator: BlockId, dominated: BlockId) -> bool {
        if dominator == dominated {
            return true;
        }
        let mut current = dominated;
        while let Some(&idom) = self.idom.get(&current) {
            if idom == dominator {
                return true;
            }
            if idom == current {
                break;
            }
            current = idom;
        }
        false
    }

    pub fn idom(&self, block: BlockId) -> Option<BlockId> {
        self.idom.get(&block).copied()
    }

    /// Whether the definition at `a` executes before the point `b` on every
    /// path reaching `b`. Within one block this is position order.
    pub fn dominates_point(&self, a: (BlockId, usize), b: (BlockId, usize)) -> bool {
        if a.0 == b.0 {
            return a.1 < b.1;
        }
        self.dominates(a.0, b.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::FunctionBuilder;
    use crate::types::TypeRegistry;

    #[test]
    fn test_diamond_dominance() {
        let types = TypeRegistry::new();
        let mut b = FunctionBuilder::new("f", &types);
        let then_b = b.create_block();
        let else_b = b.create_block();
        let join = b.create_block();
        let cond = b.const_int(1, 1);
        b.branch(cond, then_b, else_b).unwrap();
        b.switch_to_block(then_b).unwrap();
        b.jump(join).unwrap();
        b.switch_to_block(else_b).unwrap();
        b.jump(join).unwrap();
        b.switch_to_block(join).unwrap();
        b.ret(None).unwrap();
        let f = b.build().unwrap();

        let dom = DominatorTree::build(&f);
        let entry = f.entry_block();
        assert!(dom.dominates(entry, then_b));
        assert!(dom.dominates(entry, join));
        assert!(!dom.dominates(then_b, join));
        assert!(!dom.dominates(else_b, then_b));
        assert_eq!(dom.idom(join), Some(entry));
    }

    #[test]
    fn test_dominates_point_same_block() {
        let dom = DominatorTree {
            idom: HashMap::new(),
        };
        assert!(dom.dominates_point((BlockId(0), 1), (BlockId(0), 3)));
        assert!(!dom.dominates_point((BlockId(0), 3), (BlockId(0), 1)));
        assert!(!dom.dominates_point((BlockId(0), 2), (BlockId(0), 2)));
    }
}
