use super::{Pass, PassContext};
use crate::language::{
    ast::*,
    errors::{success, Outcome},
    visit::{expect_stmt, visit, walk_expr_statement, Visitor},
};
use tracing::trace;

/// Turns a statement consisting of a bare identifier into `print(ident)`.
#[derive(Default)]
pub struct AutoPrintAnalyser {
    rewritten: usize,
}

impl AutoPrintAnalyser {
    pub fn rewritten(&self) -> usize {
        self.rewritten
    }
}

impl Visitor for AutoPrintAnalyser {
    type Output = ();

    fn visit_expr_statement(&mut self, ast: &mut Arena, id: StmtId) {
        let stmt = expect_stmt!(ast, id, Expr);
        if matches!(ast[stmt.expr].kind, ExprKind::Identifier(_)) {
            let loc = ast[stmt.expr].loc;
            let print = ast.call("print", vec![stmt.expr], loc);
            if let StmtKind::Expr(stmt) = &mut ast[id].kind {
                stmt.expr = print;
            }
            ast.types().invalidate();
            self.rewritten += 1;
            trace!(?id, "promoted bare identifier to print()");
        }
        walk_expr_statement(self, ast, id);
    }
}

pub fn create_auto_print_pass() -> Pass {
    Pass::new("AutoPrintAnalyser", |ctx: &mut PassContext| -> Outcome {
        visit(&mut AutoPrintAnalyser::default(), &mut ctx.ast);
        success()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::span::Location;

    fn probe_with(ast: &mut Arena, stmts: Vec<StmtId>) {
        let probe = ast.new_probe(
            vec![AttachPoint::new("BEGIN", Location::default())],
            None,
            stmts,
            Location::default(),
        );
        ast.set_root(Program {
            probes: vec![probe],
            ..Program::default()
        });
    }

    fn stmt_expr(ast: &Arena, stmt: StmtId) -> ExprId {
        match &ast[stmt].kind {
            StmtKind::Expr(stmt) => stmt.expr,
            other => panic!("unexpected statement {:?}", other.tag()),
        }
    }

    #[test]
    fn bare_identifier_is_printed() {
        let mut ast = Arena::new();
        let loc = Location::line(1, 9, 14);
        let ident = ast.identifier("value", loc);
        let stmt = ast.expr_stmt(ident, loc);
        probe_with(&mut ast, vec![stmt]);

        let mut analyser = AutoPrintAnalyser::default();
        visit(&mut analyser, &mut ast);
        assert_eq!(analyser.rewritten(), 1);

        let call = ast[stmt_expr(&ast, stmt)].as_call().cloned().expect("print call");
        assert_eq!(call.func, "print");
        assert_eq!(call.args, vec![ident]);
        assert_eq!(ast[stmt_expr(&ast, stmt)].loc, loc);
    }

    #[test]
    fn other_statements_are_untouched() {
        let mut ast = Arena::new();
        let map = ast.map("@x", None, Location::default());
        let map_stmt = ast.expr_stmt(map, Location::default());
        let exit = ast.call("exit", vec![], Location::default());
        let exit_stmt = ast.expr_stmt(exit, Location::default());
        probe_with(&mut ast, vec![map_stmt, exit_stmt]);

        let mut analyser = AutoPrintAnalyser::default();
        visit(&mut analyser, &mut ast);
        assert_eq!(analyser.rewritten(), 0);
        assert_eq!(stmt_expr(&ast, map_stmt), map);
        assert_eq!(stmt_expr(&ast, exit_stmt), exit);
    }
}
