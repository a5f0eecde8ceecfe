//! Analysis and rewriting passes over the arena, and the manager that runs
//! them in a checked order.

mod manager;

pub mod auto_print;
pub mod c_definitions;
pub mod config_analyser;
pub mod field_analyser;
pub mod fold_constants;
pub mod node_counter;
pub mod portability_analyser;
pub mod resource_analyser;
pub mod return_path_analyser;

pub use auto_print::create_auto_print_pass;
pub use c_definitions::{create_c_definitions_pass, CDefinitions};
pub use config_analyser::create_config_pass;
pub use field_analyser::{create_field_analyser_pass, FieldInfo};
pub use fold_constants::create_fold_constants_pass;
pub use manager::{Pass, PassContext, PassManager, TypeKey};
pub use node_counter::{create_node_counter_pass, NodeCount};
pub use portability_analyser::create_portability_pass;
pub use resource_analyser::{create_resource_pass, MapInfo, RequiredResources};
pub use return_path_analyser::create_return_path_pass;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::{
        ast::Arena,
        errors::{failure, success, success_with, Diagnostic, Outcome},
    };
    use std::{cell::RefCell, rc::Rc};

    struct Parsed;
    struct Typed;

    fn noop(name: &str) -> Pass {
        Pass::new(name, |_: &mut PassContext| success())
    }

    #[test]
    #[should_panic(expected = "BUG: Pass typer requires output Parsed, which is not available.")]
    fn missing_input_is_a_wiring_bug() {
        let mut pm = PassManager::new();
        pm.add(noop("typer").requires::<Parsed>());
    }

    #[test]
    #[should_panic(
        expected = "BUG: Pass second attempting to register output Typed, which is already registered by pass first."
    )]
    fn duplicate_output_is_a_wiring_bug() {
        let mut pm = PassManager::new();
        pm.add(noop("first").produces::<Typed>())
            .add(noop("second").produces::<Typed>());
    }

    #[test]
    fn wired_passes_share_outputs() {
        let mut pm = PassManager::new();
        pm.add(
            Pass::new("parse", |ctx: &mut PassContext| {
                ctx.put(Parsed);
                success()
            })
            .produces::<Parsed>(),
        )
        .add(
            Pass::new("type", |ctx: &mut PassContext| {
                assert!(ctx.has::<Parsed>());
                ctx.put(Typed);
                success()
            })
            .requires::<Parsed>()
            .produces::<Typed>(),
        );
        assert_eq!(pm.names().collect::<Vec<_>>(), vec!["parse", "type"]);

        let mut ctx = PassContext::new(Arena::new());
        assert!(pm.run(&mut ctx).ok());
        assert!(ctx.try_get::<Typed>().is_some());
    }

    #[test]
    #[should_panic(expected = "BUG: Pass lazy did not produce Parsed")]
    fn declared_output_must_be_stored() {
        let mut pm = PassManager::new();
        pm.add(noop("lazy").produces::<Parsed>());
        pm.run(&mut PassContext::new(Arena::new()));
    }

    #[test]
    fn stops_at_first_failure_and_keeps_earlier_warnings() {
        let ran = Rc::new(RefCell::new(Vec::new()));
        let record = |name: &'static str, outcome: fn() -> Outcome| {
            let ran = Rc::clone(&ran);
            Pass::new(name, move |_: &mut PassContext| {
                ran.borrow_mut().push(name);
                outcome()
            })
        };

        let mut pm = PassManager::new();
        pm.add(record("warns", || {
            success_with(vec![Diagnostic::warning("first warning")])
        }))
        .add(record("fails", || {
            let mut outcome = failure("broken");
            outcome.add_warning(Diagnostic::warning("second warning"));
            outcome
        }))
        .add(record("never", success));

        let outcome = pm.run(&mut PassContext::new(Arena::new()));
        assert_eq!(*ran.borrow(), vec!["warns", "fails"]);
        let errors: Vec<String> = outcome.errors().iter().map(ToString::to_string).collect();
        assert_eq!(errors, vec!["ERROR: broken"]);
        let warnings: Vec<String> = outcome.warnings().iter().map(ToString::to_string).collect();
        assert_eq!(
            warnings,
            vec!["WARNING: first warning", "WARNING: second warning"]
        );
    }

    #[test]
    fn warnings_survive_a_successful_run() {
        let mut pm = PassManager::new();
        pm.add(Pass::new("a", |_: &mut PassContext| {
            success_with(vec![Diagnostic::warning("a")])
        }))
        .add(Pass::new("b", |_: &mut PassContext| {
            success_with(vec![Diagnostic::warning("b")])
        }));
        let outcome = pm.run(&mut PassContext::new(Arena::new()));
        assert!(outcome.ok());
        assert_eq!(outcome.warnings().len(), 2);
    }
}
