//! Assembly of the standard analysis pipeline.

use crate::language::{
    errors::ErrorOr,
    passes::{
        create_auto_print_pass, create_c_definitions_pass, create_config_pass,
        create_field_analyser_pass, create_fold_constants_pass, create_node_counter_pass,
        create_portability_pass, create_resource_pass, create_return_path_pass, PassContext,
        PassManager, RequiredResources,
    },
};
use tracing::info;

/// How the analysed program will be compiled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompileMode {
    /// Compiled and loaded on the same host.
    #[default]
    Jit,
    /// Compiled into a standalone artifact for later loading elsewhere.
    Aot,
}

/// Every pass between parsing and code generation, in order.
pub fn standard_passes(mode: CompileMode) -> PassManager {
    let mut pm = PassManager::new();
    pm.add(create_config_pass())
        .add(create_c_definitions_pass())
        .add(create_auto_print_pass())
        .add(create_fold_constants_pass())
        .add(create_node_counter_pass())
        .add(create_field_analyser_pass());
    if mode == CompileMode::Aot {
        pm.add(create_portability_pass());
    }
    pm.add(create_return_path_pass()).add(create_resource_pass());
    pm
}

/// Runs the standard pipeline and hands back what code generation needs to
/// provision. The (possibly rewritten) tree stays in `ctx`.
pub fn analyse(ctx: &mut PassContext, mode: CompileMode) -> ErrorOr<RequiredResources> {
    let mut pm = standard_passes(mode);
    info!(passes = pm.len(), ?mode, "running analysis pipeline");
    let outcome = pm.run(ctx);
    if !outcome.ok() {
        return outcome.propagate(Vec::new());
    }
    let (_, warnings) = outcome.into_parts();
    match ctx.take::<RequiredResources>() {
        Some(resources) => ErrorOr::with_warnings(resources, warnings),
        None => panic!("BUG: pipeline finished without RequiredResources"),
    }
}
