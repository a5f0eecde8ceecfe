//! Arena-owned syntax tree.
//!
//! Every node of a compilation lives in one [`Arena`] and is addressed by a
//! typed index. Indices are never invalidated: a rewrite only changes the
//! index stored in the parent slot, the orphaned node stays in the arena
//! until the arena is dropped.

mod attach_point;
mod build;
mod nodes;

#[cfg(test)]
mod tests;

pub use attach_point::{AttachPoint, ExpansionType, ProbeType};
pub use nodes::*;

use crate::language::typecheck::TypeTable;
use std::ops::{Index, IndexMut};

macro_rules! node_id {
    ($name:ident) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

node_id!(ExprId);
node_id!(StmtId);
node_id!(AttachPointId);
node_id!(ProbeId);
node_id!(SubprogId);

/// Borrowed handle on any node, used by traversal hooks that apply to every
/// node kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeRef {
    Program,
    Probe(ProbeId),
    AttachPoint(AttachPointId),
    Predicate(ProbeId),
    Subprog(SubprogId),
    SubprogArg(SubprogId, usize),
    Stmt(StmtId),
    Expr(ExprId),
}

/// Anything that can be placed in the arena.
pub trait ArenaNode: Sized {
    type Id: Copy;

    fn store(self, arena: &mut Arena) -> Self::Id;
}

#[derive(Default)]
pub struct Arena {
    exprs: Vec<Expr>,
    stmts: Vec<Stmt>,
    attach_points: Vec<AttachPoint>,
    probes: Vec<Probe>,
    subprogs: Vec<Subprog>,
    root: Option<Program>,
    types: TypeTable,
}

fn next_id(len: usize) -> u32 {
    u32::try_from(len).unwrap_or_else(|_| panic!("BUG: arena exhausted"))
}

impl ArenaNode for Expr {
    type Id = ExprId;

    fn store(self, arena: &mut Arena) -> ExprId {
        let id = ExprId(next_id(arena.exprs.len()));
        arena.exprs.push(self);
        id
    }
}

impl ArenaNode for Stmt {
    type Id = StmtId;

    fn store(self, arena: &mut Arena) -> StmtId {
        let id = StmtId(next_id(arena.stmts.len()));
        arena.stmts.push(self);
        id
    }
}

impl ArenaNode for AttachPoint {
    type Id = AttachPointId;

    fn store(self, arena: &mut Arena) -> AttachPointId {
        let id = AttachPointId(next_id(arena.attach_points.len()));
        arena.attach_points.push(self);
        id
    }
}

impl ArenaNode for Probe {
    type Id = ProbeId;

    fn store(self, arena: &mut Arena) -> ProbeId {
        let id = ProbeId(next_id(arena.probes.len()));
        arena.probes.push(self);
        id
    }
}

impl ArenaNode for Subprog {
    type Id = SubprogId;

    fn store(self, arena: &mut Arena) -> SubprogId {
        let id = SubprogId(next_id(arena.subprogs.len()));
        arena.subprogs.push(self);
        id
    }
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves `node` under arena ownership. The returned index stays valid for
    /// the lifetime of the arena.
    pub fn make_node<N: ArenaNode>(&mut self, node: N) -> N::Id {
        node.store(self)
    }

    pub fn set_root(&mut self, program: Program) {
        self.root = Some(program);
    }

    pub fn root(&self) -> Option<&Program> {
        self.root.as_ref()
    }

    pub fn program(&self) -> &Program {
        self.root
            .as_ref()
            .unwrap_or_else(|| panic!("BUG: arena has no program root"))
    }

    pub fn program_mut(&mut self) -> &mut Program {
        self.root
            .as_mut()
            .unwrap_or_else(|| panic!("BUG: arena has no program root"))
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    pub fn expr_mut(&mut self, id: ExprId) -> &mut Expr {
        &mut self.exprs[id.index()]
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.index()]
    }

    pub fn stmt_mut(&mut self, id: StmtId) -> &mut Stmt {
        &mut self.stmts[id.index()]
    }

    pub fn attach_point(&self, id: AttachPointId) -> &AttachPoint {
        &self.attach_points[id.index()]
    }

    pub fn attach_point_mut(&mut self, id: AttachPointId) -> &mut AttachPoint {
        &mut self.attach_points[id.index()]
    }

    pub fn probe(&self, id: ProbeId) -> &Probe {
        &self.probes[id.index()]
    }

    pub fn probe_mut(&mut self, id: ProbeId) -> &mut Probe {
        &mut self.probes[id.index()]
    }

    pub fn subprog(&self, id: SubprogId) -> &Subprog {
        &self.subprogs[id.index()]
    }

    pub fn subprog_mut(&mut self, id: SubprogId) -> &mut Subprog {
        &mut self.subprogs[id.index()]
    }

    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    /// Total number of nodes ever allocated, reachable or not.
    pub fn allocated(&self) -> usize {
        self.exprs.len()
            + self.stmts.len()
            + self.attach_points.len()
            + self.probes.len()
            + self.subprogs.len()
    }

    /// Comma-joined attach point names of a probe.
    pub fn probe_name(&self, id: ProbeId) -> String {
        self.probe(id)
            .attach_points
            .iter()
            .map(|ap| self.attach_point(*ap).name())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Name of the record type holding the probe's resolved arguments.
    pub fn probe_args_typename(&self, id: ProbeId) -> String {
        format!("struct {}_args", self.probe_name(id))
    }

    pub fn probe_has_type(&self, id: ProbeId, probe_type: ProbeType) -> bool {
        self.probe(id)
            .attach_points
            .iter()
            .any(|ap| self.attach_point(*ap).probe_type() == probe_type)
    }

    /// Numbers probes and their attach points in program order.
    pub fn assign_indices(&mut self) {
        let probes = self.program().probes.clone();
        let mut ap_index = 0;
        for (probe_index, probe) in probes.into_iter().enumerate() {
            self.probe_mut(probe).index = probe_index;
            let attach_points = self.probe(probe).attach_points.clone();
            for ap in attach_points {
                self.attach_point_mut(ap).index = ap_index;
                ap_index += 1;
            }
        }
    }
}

impl Index<ExprId> for Arena {
    type Output = Expr;

    fn index(&self, id: ExprId) -> &Expr {
        self.expr(id)
    }
}

impl IndexMut<ExprId> for Arena {
    fn index_mut(&mut self, id: ExprId) -> &mut Expr {
        self.expr_mut(id)
    }
}

impl Index<StmtId> for Arena {
    type Output = Stmt;

    fn index(&self, id: StmtId) -> &Stmt {
        self.stmt(id)
    }
}

impl IndexMut<StmtId> for Arena {
    fn index_mut(&mut self, id: StmtId) -> &mut Stmt {
        self.stmt_mut(id)
    }
}
