use super::{Pass, PassContext};
use crate::language::{
    ast::*,
    errors::{outcome_from, Diagnostic, Diagnostics},
    visit::{dispatch_stmt, expect_stmt, visit, Visitor},
};

/// Checks that every function with a return type returns on all paths. The
/// result of a statement visit is whether that statement always returns.
#[derive(Default)]
pub struct ReturnPathAnalyser {
    diagnostics: Diagnostics,
}

impl ReturnPathAnalyser {
    pub fn into_diagnostics(self) -> Diagnostics {
        self.diagnostics
    }
}

impl Visitor for ReturnPathAnalyser {
    type Output = bool;

    fn visit_program(&mut self, ast: &mut Arena) -> bool {
        let functions = ast.program().functions.clone();
        let mut all_return = true;
        for func in functions {
            all_return &= self.visit_subprog(ast, func);
        }
        all_return
    }

    fn visit_subprog(&mut self, ast: &mut Arena, id: SubprogId) -> bool {
        let subprog = ast.subprog(id).clone();
        if subprog.return_type.is_void() {
            return true;
        }
        for stmt in subprog.stmts {
            if self.visit_stmt(ast, stmt) {
                return true;
            }
        }
        self.diagnostics.push(
            Diagnostic::error("Not all code paths returned a value").at(subprog.loc),
        );
        false
    }

    /// Loops may run zero times, so only blocks, conditionals and jumps can
    /// guarantee a return.
    fn visit_stmt(&mut self, ast: &mut Arena, id: StmtId) -> bool {
        match ast[id].tag() {
            StmtTag::Block | StmtTag::If | StmtTag::Jump => dispatch_stmt(self, ast, id),
            _ => false,
        }
    }

    fn visit_block(&mut self, ast: &mut Arena, id: StmtId) -> bool {
        let block = expect_stmt!(ast, id, Block);
        block.stmts.into_iter().any(|stmt| self.visit_stmt(ast, stmt))
    }

    fn visit_if(&mut self, ast: &mut Arena, id: StmtId) -> bool {
        let if_stmt = expect_stmt!(ast, id, If);
        if !self.visit_stmt(ast, if_stmt.then_block) {
            return false;
        }
        if_stmt
            .else_block
            .is_some_and(|else_block| self.visit_stmt(ast, else_block))
    }

    fn visit_jump(&mut self, ast: &mut Arena, id: StmtId) -> bool {
        expect_stmt!(ast, id, Jump).kind == JumpKind::Return
    }
}

pub fn create_return_path_pass() -> Pass {
    Pass::new("ReturnPath", |ctx: &mut PassContext| {
        let mut analyser = ReturnPathAnalyser::default();
        visit(&mut analyser, &mut ctx.ast);
        outcome_from(analyser.into_diagnostics())
    })
}
