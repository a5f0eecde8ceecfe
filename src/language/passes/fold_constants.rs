use super::{Pass, PassContext};
use crate::language::{
    ast::*,
    errors::{Diagnostic, Outcome},
    visit::{expect_expr, visit, walk_binop, walk_call, walk_unop, Visitor},
};
use tracing::trace;

enum Folded {
    Integer(i64),
    String(String),
    /// Operands are literals but the operation is left for later stages.
    Unchanged,
}

fn truth(value: bool) -> Folded {
    Folded::Integer(i64::from(value))
}

fn fold_integers(op: BinaryOp, left: i64, right: i64) -> Folded {
    let checked = match op {
        BinaryOp::Eq => return truth(left == right),
        BinaryOp::Ne => return truth(left != right),
        BinaryOp::Lt => return truth(left < right),
        BinaryOp::Le => return truth(left <= right),
        BinaryOp::Gt => return truth(left > right),
        BinaryOp::Ge => return truth(left >= right),
        BinaryOp::LAnd => return truth(left != 0 && right != 0),
        BinaryOp::LOr => return truth(left != 0 || right != 0),
        BinaryOp::BAnd => Some(left & right),
        BinaryOp::BOr => Some(left | right),
        BinaryOp::BXor => Some(left ^ right),
        BinaryOp::Plus => left.checked_add(right),
        BinaryOp::Minus => left.checked_sub(right),
        BinaryOp::Mul => left.checked_mul(right),
        BinaryOp::Div => left.checked_div(right),
        BinaryOp::Mod => left.checked_rem(right),
        BinaryOp::Left => u32::try_from(right).ok().and_then(|shift| left.checked_shl(shift)),
        BinaryOp::Right => u32::try_from(right).ok().and_then(|shift| left.checked_shr(shift)),
    };
    checked.map_or(Folded::Unchanged, Folded::Integer)
}

fn fold_strings(op: BinaryOp, left: &str, right: &str) -> Folded {
    match op {
        BinaryOp::Eq => truth(left == right),
        BinaryOp::Ne => truth(left != right),
        BinaryOp::Plus => Folded::String(format!("{left}{right}")),
        _ => Folded::Unchanged,
    }
}

/// Replaces operations on literals with their result.
pub struct FoldConstants<'a> {
    params: &'a [String],
    reduced: Option<ExprId>,
}

impl<'a> FoldConstants<'a> {
    pub fn new(params: &'a [String]) -> Self {
        Self {
            params,
            reduced: None,
        }
    }

    /// Hands `replacement` to the parent slot of the node being visited.
    fn reduce(&mut self, replacement: ExprId) {
        if self.reduced.is_some() {
            panic!("BUG: folded expression was never consumed");
        }
        self.reduced = Some(replacement);
    }

    fn reduce_to(&mut self, ast: &mut Arena, id: ExprId, folded: Folded) {
        let loc = ast[id].loc;
        let replacement = match folded {
            Folded::Integer(value) => ast.integer(value, loc),
            Folded::String(value) => ast.string(&value, loc),
            Folded::Unchanged => return,
        };
        trace!(?id, ?replacement, "folded expression");
        self.reduce(replacement);
    }

    fn param_value(&self, param: PositionalParameter) -> Option<String> {
        match param {
            PositionalParameter::Param(n) => n
                .checked_sub(1)
                .and_then(|idx| self.params.get(idx))
                .cloned(),
            PositionalParameter::Count => Some(self.params.len().to_string()),
        }
    }
}

impl Visitor for FoldConstants<'_> {
    type Output = Outcome;

    fn replace_expr(&mut self, _ast: &mut Arena, id: ExprId, _result: &Outcome) -> ExprId {
        self.reduced.take().unwrap_or(id)
    }

    fn visit_binop(&mut self, ast: &mut Arena, id: ExprId) -> Outcome {
        let result = walk_binop(self, ast, id);
        let binop = expect_expr!(ast, id, Binop);
        let folded = match (&ast[binop.left].kind, &ast[binop.right].kind) {
            (ExprKind::Integer(left), ExprKind::Integer(right)) => {
                fold_integers(binop.op, left.value, right.value)
            }
            (ExprKind::String(left), ExprKind::String(right)) => {
                fold_strings(binop.op, &left.value, &right.value)
            }
            (ExprKind::String(_), ExprKind::Integer(_))
            | (ExprKind::Integer(_), ExprKind::String(_)) => {
                let error = Diagnostic::error(format!(
                    "Illegal operation on string and integer: '{}'",
                    binop.op
                ))
                .at(ast[id].loc);
                return result.merge(Outcome::fail(error));
            }
            _ => Folded::Unchanged,
        };
        self.reduce_to(ast, id, folded);
        result
    }

    fn visit_unop(&mut self, ast: &mut Arena, id: ExprId) -> Outcome {
        let result = walk_unop(self, ast, id);
        let unop = expect_expr!(ast, id, Unop);
        if let Some(value) = ast[unop.expr].as_integer() {
            let folded = match unop.op {
                UnaryOp::Minus => value.checked_neg().map_or(Folded::Unchanged, Folded::Integer),
                UnaryOp::LNot => truth(value == 0),
                UnaryOp::BNot => Folded::Integer(!value),
                _ => Folded::Unchanged,
            };
            self.reduce_to(ast, id, folded);
        }
        result
    }

    fn visit_call(&mut self, ast: &mut Arena, id: ExprId) -> Outcome {
        let result = walk_call(self, ast, id);
        let call = expect_expr!(ast, id, Call);
        let [arg] = call.args.as_slice() else {
            return result;
        };
        if call.func != "str" {
            return result;
        }
        let folded = match &ast[*arg].kind {
            ExprKind::String(_) => {
                self.reduce(*arg);
                return result;
            }
            ExprKind::Integer(lit) => Folded::String(lit.value.to_string()),
            ExprKind::PositionalParameter(param) => match self.param_value(*param) {
                Some(value) => Folded::String(value),
                None => Folded::Unchanged,
            },
            _ => Folded::Unchanged,
        };
        self.reduce_to(ast, id, folded);
        result
    }
}

pub fn create_fold_constants_pass() -> Pass {
    Pass::new("FoldConstants", |ctx: &mut PassContext| {
        let mut folder = FoldConstants::new(&ctx.params);
        visit(&mut folder, &mut ctx.ast)
    })
}
