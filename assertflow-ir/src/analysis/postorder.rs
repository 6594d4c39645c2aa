use rustc_hash::{FxHashMap, FxHashSet};

use crate::{block::Block, context::Context, function::Function, instruction::BranchToWithArgs};

/// Post ordering of blocks in the CFG.
pub struct PostOrder {
    pub block_to_po: FxHashMap<Block, usize>,
    pub po_to_block: Vec<Block>,
}

impl PostOrder {
    /// Return the blocks in reverse post-order, i.e., the entry block first.
    pub fn reverse_post_order(&self) -> impl Iterator<Item = &Block> {
        self.po_to_block.iter().rev()
    }

    /// Whether `block` is reachable from the entry block.
    pub fn contains(&self, block: &Block) -> bool {
        self.block_to_po.contains_key(block)
    }
}

/// Compute the post-order traversal of the CFG.
/// Beware: Unreachable blocks aren't part of the result.
pub fn compute_post_order(context: &Context, function: &Function) -> PostOrder {
    let mut res = PostOrder {
        block_to_po: FxHashMap::default(),
        po_to_block: Vec::default(),
    };
    let entry = function.get_entry_block(context);

    let mut counter = 0;
    let mut on_stack = FxHashSet::<Block>::default();
    fn post_order(
        context: &Context,
        n: Block,
        res: &mut PostOrder,
        on_stack: &mut FxHashSet<Block>,
        counter: &mut usize,
    ) {
        if on_stack.contains(&n) {
            return;
        }
        on_stack.insert(n);
        for BranchToWithArgs { block: n_succ, .. } in n.successors(context) {
            post_order(context, n_succ, res, on_stack, counter);
        }
        res.block_to_po.insert(n, *counter);
        res.po_to_block.push(n);
        *counter += 1;
    }
    post_order(context, entry, &mut res, &mut on_stack, &mut counter);

    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn entry_is_first_in_reverse_post_order() {
        let context = parse(
            r#"
module {
    fn f(c: bool) -> () {
        entry():
        cbr c, left(), right()

        left():
        br join()

        right():
        br join()

        join():
        v0 = const () ()
        ret () v0

        dead():
        v1 = const () ()
        ret () v1
    }
}
"#,
        )
        .unwrap();
        let function = context
            .module_iter()
            .next()
            .unwrap()
            .function_iter(&context)
            .next()
            .unwrap();
        let po = compute_post_order(&context, &function);
        let rpo: Vec<String> = po
            .reverse_post_order()
            .map(|block| block.get_label(&context))
            .collect();

        assert_eq!(rpo.len(), 4);
        assert_eq!(rpo[0], "entry");
        assert_eq!(rpo[3], "join");
        assert!(!rpo.contains(&"dead".to_owned()));
    }
}
