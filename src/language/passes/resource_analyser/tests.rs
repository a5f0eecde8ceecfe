use super::*;
use crate::language::{typecheck::TypeSource, types::AggregateKind};

fn loc() -> Location {
    Location::line(2, 5, 12)
}

fn probe(ast: &mut Arena, ap: AttachPoint, stmts: Vec<StmtId>) -> ProbeId {
    ast.new_probe(vec![ap], None, stmts, loc())
}

fn program(ast: &mut Arena, probes: Vec<ProbeId>) {
    ast.set_root(Program {
        probes,
        ..Program::default()
    });
}

fn analyse(ast: &mut Arena) -> (RequiredResources, Diagnostics) {
    ResourceAnalyser::new(32, UserSymbolCacheType::PerProgram).analyse(ast)
}

fn typed_map(ast: &mut Arena, ident: &str, key: Option<ExprId>, ty: SizedType) -> ExprId {
    let map = ast.map(ident, key, loc());
    ast.set_type(map, TypeSource::Fixed(ty));
    map
}

fn messages(diagnostics: &Diagnostics) -> Vec<String> {
    diagnostics.iter().map(|d| d.message.clone()).collect()
}

#[test]
fn hello_world_needs_no_maps() {
    let mut ast = Arena::new();
    let fmt = ast.string("hello world!\n", loc());
    let printf = ast.call("printf", vec![fmt], loc());
    let printf_stmt = ast.expr_stmt(printf, loc());
    let exit = ast.call("exit", vec![], loc());
    let exit_stmt = ast.expr_stmt(exit, loc());
    let begin = probe(&mut ast, AttachPoint::new("BEGIN", loc()), vec![printf_stmt, exit_stmt]);
    program(&mut ast, vec![begin]);

    let (resources, diagnostics) = analyse(&mut ast);
    assert!(diagnostics.is_empty());
    assert!(resources.maps.is_empty());
    assert_eq!(
        resources.printf_args,
        vec![("hello world!\n".to_string(), vec![])]
    );
    assert!(!resources.needs_usym_tables());
}

#[test]
fn maps_are_numbered_by_first_use() {
    let mut ast = Arena::new();
    let count = ast.call("count", vec![], loc());
    let pid = ast.builtin("pid", loc());
    ast.set_type(pid, TypeSource::Fixed(SizedType::uint(32)));
    let counts = typed_map(
        &mut ast,
        "@counts",
        Some(pid),
        SizedType::Aggregate(AggregateKind::Count),
    );
    let count_stmt = ast.assign_map(counts, count, loc());
    let one = ast.integer(1, loc());
    let seen = typed_map(&mut ast, "@a_seen", None, SizedType::int64());
    let seen_stmt = ast.assign_map(seen, one, loc());
    let kprobe = AttachPoint::new("kprobe", loc()).with_func("vfs_read");
    let first = probe(&mut ast, kprobe, vec![count_stmt, seen_stmt]);
    program(&mut ast, vec![first]);

    let (resources, diagnostics) = analyse(&mut ast);
    assert!(diagnostics.is_empty(), "{diagnostics:?}");
    assert_eq!(
        resources.maps["@counts"],
        MapInfo {
            id: 0,
            key: Some(SizedType::uint(32)),
            value: SizedType::Aggregate(AggregateKind::Count),
        }
    );
    assert_eq!(resources.maps["@a_seen"].id, 1);
    assert_eq!(resources.maps["@a_seen"].key, None);
    assert_eq!(resources.max_map_key_size, 4);
    assert_eq!(ast.probe(first).index, 0);
}

#[test]
fn wider_keys_are_kept_and_conflicting_keys_fail() {
    let mut ast = Arena::new();
    let narrow = ast.builtin("pid", loc());
    ast.set_type(narrow, TypeSource::Fixed(SizedType::uint(32)));
    let first = typed_map(&mut ast, "@m", Some(narrow), SizedType::int64());
    let first_stmt = ast.expr_stmt(first, loc());
    let wide = ast.integer(7, loc());
    let second = typed_map(&mut ast, "@m", Some(wide), SizedType::int64());
    let second_stmt = ast.expr_stmt(second, loc());
    let text = ast.string("x", loc());
    let third = typed_map(&mut ast, "@m", Some(text), SizedType::int64());
    let third_stmt = ast.expr_stmt(third, loc());
    let begin = probe(
        &mut ast,
        AttachPoint::new("BEGIN", loc()),
        vec![first_stmt, second_stmt, third_stmt],
    );
    program(&mut ast, vec![begin]);

    let (_, diagnostics) = analyse(&mut ast);
    assert_eq!(
        messages(&diagnostics),
        vec![
            "Argument mismatch for @m: trying to access with arguments: [string[2]] when map expects arguments: [int64]"
        ]
    );
}

#[test]
fn maps_without_a_value_type_are_errors() {
    let mut ast = Arena::new();
    let unknown = ast.map("@never", None, loc());
    let stmt = ast.expr_stmt(unknown, loc());
    let begin = probe(&mut ast, AttachPoint::new("BEGIN", loc()), vec![stmt]);
    program(&mut ast, vec![begin]);

    let (resources, diagnostics) = analyse(&mut ast);
    assert!(resources.maps.is_empty());
    assert_eq!(
        diagnostics[0].to_string(),
        "2:5-12: ERROR: Undefined map or unresolved value type: @never"
    );
}

#[test]
fn user_symbols_are_tracked_per_probe() {
    let mut ast = Arena::new();
    let func = ast.builtin("func", loc());
    let func_stmt = ast.expr_stmt(func, loc());
    let uprobe = AttachPoint::new("uprobe", loc())
        .with_target("/bin/sh")
        .with_func("main");
    let user = probe(&mut ast, uprobe, vec![func_stmt]);
    let kfunc = ast.builtin("func", loc());
    let kfunc_stmt = ast.expr_stmt(kfunc, loc());
    let kprobe = AttachPoint::new("kprobe", loc()).with_func("vfs_read");
    let kernel = probe(&mut ast, kprobe, vec![kfunc_stmt]);
    program(&mut ast, vec![user, kernel]);

    let (resources, _) = analyse(&mut ast);
    assert_eq!(
        resources.probes_using_usym.into_iter().collect::<Vec<_>>(),
        vec!["uprobe:/bin/sh:main"]
    );

    let (resources, _) = ResourceAnalyser::new(32, UserSymbolCacheType::None).analyse(&mut ast);
    assert!(!resources.needs_usym_tables());
}

#[test]
fn async_print_arguments_are_collected() {
    let mut ast = Arena::new();
    let fmt = ast.string("%d %s\n", loc());
    let pid = ast.builtin("pid", loc());
    ast.set_type(pid, TypeSource::Fixed(SizedType::uint(32)));
    let name = ast.string("abc", loc());
    let printf = ast.call("printf", vec![fmt, pid, name], loc());
    let printf_stmt = ast.expr_stmt(printf, loc());
    let value = ast.integer(3, loc());
    let print = ast.call("print", vec![value], loc());
    let print_stmt = ast.expr_stmt(print, loc());
    let time = ast.call("time", vec![], loc());
    let time_stmt = ast.expr_stmt(time, loc());
    let elapsed = ast.builtin("elapsed", loc());
    let elapsed_stmt = ast.expr_stmt(elapsed, loc());
    let begin = probe(
        &mut ast,
        AttachPoint::new("BEGIN", loc()),
        vec![printf_stmt, print_stmt, time_stmt, elapsed_stmt],
    );
    program(&mut ast, vec![begin]);

    let (resources, diagnostics) = analyse(&mut ast);
    assert!(diagnostics.is_empty(), "{diagnostics:?}");
    assert_eq!(
        resources.printf_args,
        vec![(
            "%d %s\n".to_string(),
            vec![SizedType::uint(32), SizedType::string(4)]
        )]
    );
    assert_eq!(resources.non_map_print_args, vec![SizedType::int64()]);
    assert_eq!(resources.time_args, vec![DEFAULT_TIME_FORMAT.to_string()]);
    assert!(resources.needs_elapsed_map);
}

#[test]
fn unresolved_printf_argument_fails() {
    let mut ast = Arena::new();
    let fmt = ast.string("%d\n", loc());
    let mystery = ast.identifier("mystery", loc());
    let printf = ast.call("printf", vec![fmt, mystery], loc());
    let stmt = ast.expr_stmt(printf, loc());
    let begin = probe(&mut ast, AttachPoint::new("BEGIN", loc()), vec![stmt]);
    program(&mut ast, vec![begin]);

    let (resources, diagnostics) = analyse(&mut ast);
    assert!(resources.printf_args.is_empty());
    assert_eq!(
        messages(&diagnostics),
        vec!["printf() argument 1 has an unresolved type: unknown type"]
    );
}

#[test]
fn large_values_move_to_scratch_or_fail() {
    let big = "x".repeat(100);
    let mut ast = Arena::new();
    let first = ast.string(&big, loc());
    let second = ast.integer(1, loc());
    let tuple = ast.tuple(vec![first, second], loc());
    let stmt = ast.expr_stmt(tuple, loc());
    let begin = probe(&mut ast, AttachPoint::new("BEGIN", loc()), vec![stmt]);
    program(&mut ast, vec![begin]);

    let (resources, diagnostics) = analyse(&mut ast);
    assert!(diagnostics.is_empty());
    assert!(resources.tuples_on_scratch);
    assert_eq!(resources.max_tuple_size, 112);

    let huge = "y".repeat(600);
    let mut ast = Arena::new();
    let var = ast.variable("$s", loc());
    let value = ast.string(&huge, loc());
    let assign = ast.assign_var(var, value, loc());
    ast.set_type(var, TypeSource::Fixed(SizedType::string(601)));
    let begin = probe(&mut ast, AttachPoint::new("BEGIN", loc()), vec![assign]);
    program(&mut ast, vec![begin]);

    let (resources, _) = analyse(&mut ast);
    assert!(resources.variables_on_scratch);

    let (_, diagnostics) =
        ResourceAnalyser::new(4096, UserSymbolCacheType::PerProgram).analyse(&mut ast);
    assert_eq!(
        messages(&diagnostics),
        vec!["Value of 601 bytes exceeds the BPF stack of 512 bytes"]
    );
}
