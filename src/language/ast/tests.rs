use super::*;
use crate::language::span::Location;

fn loc() -> Location {
    Location::line(1, 1, 5)
}

#[test]
fn nodes_keep_their_index_as_the_arena_grows() {
    let mut ast = Arena::new();
    let first = ast.integer(1, loc());
    for n in 0..100 {
        ast.integer(n, loc());
    }
    assert_eq!(ast[first].as_integer(), Some(1));
    assert_eq!(ast.allocated(), 101);
}

#[test]
fn map_key_points_back_at_its_map() {
    let mut ast = Arena::new();
    let key = ast.builtin("pid", loc());
    let map = ast.map("@m", Some(key), loc());
    assert_eq!(ast[key].key_for_map, Some(map));
    assert_eq!(ast[map].as_map().and_then(|m| m.key), Some(key));
}

#[test]
fn assignments_annotate_the_assigned_expression() {
    let mut ast = Arena::new();
    let map = ast.map("@m", None, loc());
    let value = ast.integer(1, loc());
    ast.assign_map(map, value, loc());
    assert_eq!(ast[value].map, Some(map));

    let var = ast.variable("$x", loc());
    let decl = ast.var_decl(var, None, loc());
    let other = ast.integer(2, loc());
    let assign = ast.assign_var_decl(decl, other, loc());
    assert_eq!(ast[other].var, Some(var));
    match &ast[assign].kind {
        StmtKind::AssignVar(stmt) => assert_eq!(stmt.var_decl, Some(decl)),
        other => panic!("unexpected statement {other:?}"),
    }
}

#[test]
fn attach_point_name_uses_fixed_field_order() {
    let mut ap = AttachPoint::new("uprobe", loc())
        .with_target("/bin/sh")
        .with_func("main");
    ap.func_offset = 16;
    assert_eq!(ap.name(), "uprobe:/bin/sh:main+16");

    let mut watch = AttachPoint::new("watchpoint", loc());
    watch.address = 4096;
    watch.len = 8;
    watch.mode = "rw".into();
    assert_eq!(watch.name(), "watchpoint:4096:8:rw");
}

#[test]
fn expansion_copy_binds_one_match() {
    let kprobe = AttachPoint::new("kprobe", loc()).with_func("vfs_*");
    let plain = kprobe.expansion_copy("vfs_read");
    assert_eq!((plain.target.as_str(), plain.func.as_str()), ("", "vfs_read"));
    let module = kprobe.expansion_copy("ext4:ext4_sync_fs");
    assert_eq!(
        (module.target.as_str(), module.func.as_str()),
        ("ext4", "ext4_sync_fs")
    );

    let usdt = AttachPoint::new("usdt", loc()).with_func("*");
    let bound = usdt.expansion_copy("/bin/app:provider:probe");
    assert_eq!(bound.target, "/bin/app");
    assert_eq!(bound.ns, "provider");
    assert_eq!(bound.func, "probe");

    let tp = AttachPoint::new("tracepoint", loc()).with_func("*");
    let bound = tp.expansion_copy("sched:sched_switch");
    assert_eq!(bound.name(), "tracepoint:sched:sched_switch");

    let interval = AttachPoint::new("interval", loc());
    assert_eq!(interval.expansion_copy("anything"), interval);
}

#[test]
fn provider_aliases_resolve() {
    assert_eq!(ProbeType::from_provider("kr"), ProbeType::Kretprobe);
    assert_eq!(ProbeType::from_provider("kfunc"), ProbeType::Fentry);
    assert_eq!(ProbeType::from_provider("U"), ProbeType::Usdt);
    assert_eq!(ProbeType::from_provider("BEGIN"), ProbeType::Special);
    assert_eq!(ProbeType::from_provider("nope"), ProbeType::Invalid);
}

#[test]
fn probe_names_and_indices() {
    let mut ast = Arena::new();
    let first = ast.new_probe(
        vec![
            AttachPoint::new("kprobe", loc()).with_func("a"),
            AttachPoint::new("kprobe", loc()).with_func("b"),
        ],
        None,
        vec![],
        loc(),
    );
    let second = ast.new_probe(vec![AttachPoint::new("END", loc())], None, vec![], loc());
    ast.set_root(Program {
        probes: vec![first, second],
        ..Program::default()
    });
    ast.assign_indices();

    assert_eq!(ast.probe_name(first), "kprobe:a,kprobe:b");
    assert_eq!(ast.probe_args_typename(first), "struct kprobe:a,kprobe:b_args");
    assert_eq!(ast.probe(second).index, 1);
    let last_ap = ast.probe(second).attach_points[0];
    assert_eq!(ast.attach_point(last_ap).index, 2);
}
