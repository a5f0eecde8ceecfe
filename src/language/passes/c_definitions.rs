use super::{Pass, PassContext};
use crate::language::{
    cdefs::parse_definitions,
    errors::{success, Diagnostic, Outcome},
};
use tracing::debug;

/// Records defined by the program's C definitions block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CDefinitions {
    pub records: Vec<String>,
}

pub fn create_c_definitions_pass() -> Pass {
    Pass::new("CDefinitionParser", |ctx: &mut PassContext| -> Outcome {
        let source = ctx.ast.program().c_definitions.clone();
        let loc = ctx.ast.program().loc;
        match parse_definitions(&source, &mut ctx.structs) {
            Ok(records) => {
                debug!(count = records.len(), "parsed C definitions");
                ctx.put(CDefinitions { records });
                success()
            }
            Err(errors) => Outcome::failures(
                errors
                    .into_iter()
                    .map(|err| Diagnostic::error(err.to_string()).at(loc))
                    .collect(),
                Vec::new(),
            ),
        }
    })
    .produces::<CDefinitions>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::ast::{Arena, Program};

    fn context(c_definitions: &str) -> PassContext {
        let mut ast = Arena::new();
        ast.set_root(Program {
            c_definitions: c_definitions.to_string(),
            ..Program::default()
        });
        PassContext::new(ast)
    }

    #[test]
    fn registers_records() {
        let mut ctx = context("struct point { int x; int y; };");
        let outcome = create_c_definitions_pass().run(&mut ctx);
        assert!(outcome.ok());
        assert_eq!(ctx.get::<CDefinitions>().records, vec!["struct point"]);
        assert!(ctx.structs.is_resolved("struct point"));
    }

    #[test]
    fn unknown_field_type_fails() {
        let mut ctx = context("struct s { mystery m; };");
        let outcome = create_c_definitions_pass().run(&mut ctx);
        assert_eq!(outcome.errors().len(), 1);
        assert!(!ctx.has::<CDefinitions>());
    }
}
