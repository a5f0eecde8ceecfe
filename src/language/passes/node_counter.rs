use super::{Pass, PassContext};
use crate::{
    config::ConfigKeyInt,
    language::{
        ast::{Arena, NodeRef},
        errors::{failure, success, Outcome},
        visit::{visit, Visitor},
    },
};
use tracing::debug;

/// Number of tree nodes reachable from the program root.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NodeCount(pub usize);

#[derive(Default)]
pub struct NodeCounter {
    count: usize,
}

impl NodeCounter {
    pub fn count(&self) -> usize {
        self.count
    }
}

impl Visitor for NodeCounter {
    type Output = ();

    fn pre_visit(&mut self, _ast: &Arena, _node: NodeRef) {
        self.count += 1;
    }
}

pub fn count_nodes(ast: &mut Arena) -> usize {
    let mut counter = NodeCounter::default();
    visit(&mut counter, ast);
    counter.count()
}

pub fn create_node_counter_pass() -> Pass {
    Pass::new("NodeCounter", |ctx: &mut PassContext| -> Outcome {
        let count = count_nodes(&mut ctx.ast);
        let max = usize::try_from(ctx.config.get_int(ConfigKeyInt::MaxAstNodes))
            .unwrap_or(usize::MAX);
        debug!(count, "AST node count");
        if count >= max {
            return failure(format!("node count ({count}) exceeds the limit ({max})"));
        }
        ctx.put(NodeCount(count));
        success()
    })
    .produces::<NodeCount>()
}
