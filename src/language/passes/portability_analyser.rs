//! Rejects constructs that cannot be compiled ahead of time: anything whose
//! value is resolved on the build host and embedded into the program.

use super::{Pass, PassContext};
use crate::language::{
    ast::*,
    errors::{Diagnostic, Outcome},
    span::Location,
    visit::{expect_expr, visit, walk_call, walk_cast, Visitor},
};

fn reject(message: impl Into<String>, loc: Location) -> Outcome {
    Outcome::fail(Diagnostic::error(message).at(loc))
}

#[derive(Default)]
pub struct PortabilityAnalyser;

impl Visitor for PortabilityAnalyser {
    type Output = Outcome;

    fn visit_positional_parameter(&mut self, ast: &mut Arena, id: ExprId) -> Outcome {
        reject(
            "AOT does not yet support positional parameters",
            ast[id].loc,
        )
    }

    fn visit_builtin(&mut self, ast: &mut Arena, id: ExprId) -> Outcome {
        let builtin = expect_expr!(ast, id, Builtin);
        if builtin.ident == "curtask" {
            return reject("AOT does not yet support accessing `curtask`", ast[id].loc);
        }
        Outcome::default()
    }

    fn visit_call(&mut self, ast: &mut Arena, id: ExprId) -> Outcome {
        let result = walk_call(self, ast, id);
        let call = expect_expr!(ast, id, Call);
        if matches!(call.func.as_str(), "kaddr" | "uaddr" | "cgroupid") {
            let error = reject(
                format!("AOT does not yet support {}()", call.func),
                ast[id].loc,
            );
            return result.merge(error);
        }
        result
    }

    /// Cast target layouts are resolved on the build host.
    fn visit_cast(&mut self, ast: &mut Arena, id: ExprId) -> Outcome {
        let result = walk_cast(self, ast, id);
        result.merge(reject("AOT does not yet support struct casts", ast[id].loc))
    }

    fn visit_attach_point(&mut self, ast: &mut Arena, id: AttachPointId) -> Outcome {
        let ap = ast.attach_point(id);
        match ap.probe_type() {
            ProbeType::Usdt => reject("AOT does not yet support USDT probes", ap.loc),
            ProbeType::Watchpoint | ProbeType::AsyncWatchpoint => {
                reject("AOT does not yet support watchpoint probes", ap.loc)
            }
            _ => Outcome::default(),
        }
    }
}

pub fn create_portability_pass() -> Pass {
    Pass::new("PortabilityAnalyser", |ctx: &mut PassContext| {
        visit(&mut PortabilityAnalyser, &mut ctx.ast)
    })
}
