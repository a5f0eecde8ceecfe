//! Whole-pipeline scenarios over hand-built trees.

use crate::{
    compiler::{analyse, standard_passes, CompileMode},
    config::ConfigKeyInt,
    language::{
        ast::*,
        errors::ErrorOr,
        passes::{PassContext, RequiredResources},
        span::Location,
        types::{AggregateKind, SizedType},
    },
    providers::{Providers, StaticDebugInfo},
};

fn loc(line: u32) -> Location {
    Location::line(line, 1, 30)
}

fn begin(ast: &mut Arena, stmts: Vec<StmtId>) -> ProbeId {
    ast.new_probe(vec![AttachPoint::new("BEGIN", loc(1))], None, stmts, loc(1))
}

fn call_stmt(ast: &mut Arena, func: &str, args: Vec<ExprId>) -> StmtId {
    let call = ast.call(func, args, loc(2));
    ast.expr_stmt(call, loc(2))
}

fn root(ast: &mut Arena, probes: Vec<ProbeId>) {
    ast.set_root(Program {
        probes,
        loc: loc(1),
        ..Program::default()
    });
}

fn errors<T>(result: &ErrorOr<T>) -> Vec<String> {
    result.errors().iter().map(|d| d.message.clone()).collect()
}

fn resources(result: ErrorOr<RequiredResources>) -> RequiredResources {
    let mut warnings = Vec::new();
    result.unwrap_into(&mut warnings)
}

#[test]
fn hello_world_passes_every_pass() {
    let mut ast = Arena::new();
    let fmt = ast.string("hello world!\n", loc(2));
    let printf = call_stmt(&mut ast, "printf", vec![fmt]);
    let exit = call_stmt(&mut ast, "exit", vec![]);
    let probe = begin(&mut ast, vec![printf, exit]);
    root(&mut ast, vec![probe]);

    let mut ctx = PassContext::new(ast);
    let result = analyse(&mut ctx, CompileMode::Jit);
    assert!(result.ok(), "{:?}", result.errors());
    assert!(result.warnings().is_empty());
    let resources = resources(result);
    assert!(resources.maps.is_empty());
    assert_eq!(resources.printf_args.len(), 1);
}

#[test]
fn aot_rejects_positional_parameters_once() {
    let mut ast = Arena::new();
    let fmt = ast.string("%d\n", loc(2));
    let param = ast.positional(1, loc(2));
    let printf = call_stmt(&mut ast, "printf", vec![fmt, param]);
    let probe = begin(&mut ast, vec![printf]);
    root(&mut ast, vec![probe]);

    let mut ctx = PassContext::new(ast);
    let result = analyse(&mut ctx, CompileMode::Aot);
    let messages = errors(&result);
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("positional parameters"));
}

#[test]
fn portability_only_runs_ahead_of_time() {
    let jit: Vec<_> = standard_passes(CompileMode::Jit).names().map(String::from).collect();
    let aot: Vec<_> = standard_passes(CompileMode::Aot).names().map(String::from).collect();
    assert!(!jit.iter().any(|name| name == "PortabilityAnalyser"));
    assert_eq!(aot.len(), jit.len() + 1);
    assert_eq!(jit.first().map(String::as_str), Some("ConfigAnalyser"));
    assert_eq!(jit.last().map(String::as_str), Some("ResourceAnalyser"));
}

/// `config = { max_ast_nodes = <limit> } BEGIN { exit(0); }`, ten nodes.
fn limited_program(limit: i64) -> Arena {
    let mut ast = Arena::new();
    let value = ast.integer(limit, loc(1));
    let assign = ast.assign_config("max_ast_nodes", value, loc(1));
    let config = ast.config_block(vec![assign], loc(1));
    let zero = ast.integer(0, loc(2));
    let exit = call_stmt(&mut ast, "exit", vec![zero]);
    let probe = begin(&mut ast, vec![exit]);
    ast.set_root(Program {
        config: Some(config),
        probes: vec![probe],
        ..Program::default()
    });
    ast
}

#[test]
fn node_limit_from_script_config() {
    let mut ctx = PassContext::new(limited_program(5));
    let result = analyse(&mut ctx, CompileMode::Jit);
    assert_eq!(errors(&result), vec!["node count (10) exceeds the limit (5)"]);
    assert_eq!(ctx.config.get_int(ConfigKeyInt::MaxAstNodes), 5);

    let mut ctx = PassContext::new(limited_program(11));
    assert!(analyse(&mut ctx, CompileMode::Jit).ok());
}

#[test]
fn script_max_strlen_sizes_str_results() {
    let mut ast = Arena::new();
    let value = ast.integer(128, loc(1));
    let assign = ast.assign_config("max_strlen", value, loc(1));
    let config = ast.config_block(vec![assign], loc(1));
    let pid = ast.builtin("pid", loc(2));
    let str_call = ast.call("str", vec![pid], loc(2));
    let map = ast.map("@s", None, loc(2));
    let store = ast.assign_map(map, str_call, loc(2));
    let probe = begin(&mut ast, vec![store]);
    ast.set_root(Program {
        config: Some(config),
        probes: vec![probe],
        ..Program::default()
    });

    let mut ctx = PassContext::new(ast);
    let resources = resources(analyse(&mut ctx, CompileMode::Jit));
    assert_eq!(ctx.config.get_int(ConfigKeyInt::MaxStrlen), 128);
    assert_eq!(resources.maps["@s"].value, SizedType::string(128));
}

#[test]
fn folded_constants_reach_the_map_types() {
    let mut ast = Arena::new();
    let one = ast.integer(1, loc(2));
    let other = ast.integer(1, loc(2));
    let eq = ast.binop(one, BinaryOp::Eq, other, loc(2));
    let map = ast.map("@same", None, loc(2));
    let assign = ast.assign_map(map, eq, loc(2));
    let comm = ast.builtin("comm", loc(3));
    let counts = ast.map("@counts", Some(comm), loc(3));
    let count = ast.call("count", vec![], loc(3));
    let count_assign = ast.assign_map(counts, count, loc(3));
    let kprobe = AttachPoint::new("kprobe", loc(1)).with_func("vfs_read");
    let probe = ast.new_probe(vec![kprobe], None, vec![assign, count_assign], loc(1));
    root(&mut ast, vec![probe]);

    let mut ctx = PassContext::new(ast);
    let resources = resources(analyse(&mut ctx, CompileMode::Jit));
    let folded = match &ctx.ast[ctx.ast.probe(probe).block].kind {
        StmtKind::Block(block) => match &ctx.ast[block.stmts[0]].kind {
            StmtKind::AssignMap(assign) => assign.expr,
            other => panic!("unexpected statement {:?}", other.tag()),
        },
        other => panic!("unexpected statement {:?}", other.tag()),
    };
    assert_eq!(ctx.ast[folded].as_integer(), Some(1));
    assert_eq!(resources.maps["@same"].value, SizedType::int64());
    assert_eq!(resources.maps["@counts"].key, Some(SizedType::string(16)));
    assert_eq!(
        resources.maps["@counts"].value,
        SizedType::Aggregate(AggregateKind::Count)
    );
}

#[test]
fn str_of_positional_parameter_uses_known_values() {
    let build = || {
        let mut ast = Arena::new();
        let fmt = ast.string("%s\n", loc(2));
        let param = ast.positional(1, loc(2));
        let str_call = ast.call("str", vec![param], loc(2));
        let printf = call_stmt(&mut ast, "printf", vec![fmt, str_call]);
        let probe = begin(&mut ast, vec![printf]);
        root(&mut ast, vec![probe]);
        ast
    };

    let mut ctx = PassContext::new(build()).with_params(vec!["abc".to_string()]);
    let known = resources(analyse(&mut ctx, CompileMode::Jit));
    assert_eq!(known.printf_args[0].1, vec![SizedType::string(4)]);

    let mut ctx = PassContext::new(build());
    let unknown = resources(analyse(&mut ctx, CompileMode::Jit));
    assert_eq!(unknown.printf_args[0].1, vec![SizedType::string(64)]);
}

#[test]
fn failing_pass_stops_the_pipeline() {
    let mut ast = Arena::new();
    let cond = ast.variable("$x", loc(3));
    let value = ast.integer(1, loc(4));
    let ret = ast.jump(JumpKind::Return, Some(value), loc(4));
    let then_block = ast.block(vec![ret], loc(3));
    let if_stmt = ast.if_stmt(cond, then_block, None, loc(3));
    let arg = SubprogArg {
        name: "$x".to_string(),
        ty: SizedType::int64(),
        loc: loc(2),
    };
    let func = ast.new_subprog("f", SizedType::int64(), vec![arg], vec![if_stmt], loc(2));
    let probe = begin(&mut ast, vec![]);
    ast.set_root(Program {
        functions: vec![func],
        probes: vec![probe],
        ..Program::default()
    });

    let mut ctx = PassContext::new(ast);
    let result = analyse(&mut ctx, CompileMode::Jit);
    assert_eq!(errors(&result), vec!["Not all code paths returned a value"]);
    assert!(!ctx.has::<RequiredResources>());
}

#[test]
fn warnings_from_early_passes_are_kept() {
    let mut ast = Arena::new();
    let exit = call_stmt(&mut ast, "exit", vec![]);
    let uprobe = AttachPoint::new("uprobe", loc(1))
        .with_target("/bin/app")
        .with_func("main");
    let args = ast.builtin("args", loc(2));
    let args_stmt = ast.expr_stmt(args, loc(2));
    let probe = ast.new_probe(vec![uprobe], None, vec![args_stmt, exit], loc(1));
    root(&mut ast, vec![probe]);

    let providers = Providers {
        debug_info: Box::new(StaticDebugInfo::default().with_target("/bin/other")),
        ..Providers::default()
    };
    let mut ctx = PassContext::new(ast).with_providers(providers);
    let result = analyse(&mut ctx, CompileMode::Jit);
    let warnings: Vec<String> = result.warnings().iter().map(|d| d.message.clone()).collect();
    assert_eq!(warnings, vec!["No debuginfo found for /bin/app"]);
}
