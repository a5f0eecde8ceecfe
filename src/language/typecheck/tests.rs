use super::*;
use crate::language::{
    ast::{Arena, BinaryOp, UnaryOp},
    span::Location,
    types::{AggregateKind, Record, SizedType},
};

fn loc() -> Location {
    Location::line(1, 1, 2)
}

fn error_of(ast: &Arena, id: ExprId) -> String {
    let mut future = ast.type_of(id);
    assert!(!future.valid(), "expected a type error");
    future.error().to_string()
}

fn type_of(ast: &Arena, id: ExprId) -> SizedType {
    let mut future = ast.type_of(id);
    assert!(future.valid(), "unexpected type error: {}", future.error());
    future.ty().clone()
}

#[test]
fn literal_types() {
    let mut ast = Arena::new();
    let int = ast.integer(7, loc());
    let string = ast.string("hello", loc());
    let count = ast.param_count(loc());
    assert_eq!(type_of(&ast, int), SizedType::int64());
    assert_eq!(type_of(&ast, string), SizedType::string(6));
    assert_eq!(type_of(&ast, count), SizedType::uint64());
}

#[test]
fn unknown_stack_mode_is_a_type_error() {
    let mut ast = Arena::new();
    let mode = ast.stack_mode("fancy", loc());
    assert_eq!(error_of(&ast, mode), "Unknown stack mode: 'fancy'");
}

#[test]
fn second_resolution_hits_the_memo() {
    let mut ast = Arena::new();
    let left = ast.integer(1, loc());
    let right = ast.integer(2, loc());
    let sum = ast.binop(left, BinaryOp::Plus, right, loc());

    let first = type_of(&ast, sum);
    let evaluations = ast.types().evaluations();
    assert_eq!(evaluations, 3);

    let second = type_of(&ast, sum);
    assert_eq!(first, second);
    assert_eq!(ast.types().evaluations(), evaluations);
}

#[test]
fn set_type_invalidates_the_memo() {
    let mut ast = Arena::new();
    let var = ast.variable("$x", loc());
    ast.set_type(var, TypeSource::Fixed(SizedType::int(32)));
    assert_eq!(type_of(&ast, var), SizedType::int(32));
    assert!(ast.types().is_memoised(var));

    ast.set_type(var, TypeSource::Fixed(SizedType::uint(16)));
    assert!(!ast.types().is_memoised(var));
    assert_eq!(type_of(&ast, var), SizedType::uint(16));
}

#[test]
fn failures_are_not_memoised() {
    let mut ast = Arena::new();
    let ident = ast.identifier("thing", loc());
    assert_eq!(error_of(&ast, ident), UNKNOWN_TYPE);
    ast.set_type(ident, TypeSource::Fixed(SizedType::int64()));
    assert_eq!(type_of(&ast, ident), SizedType::int64());
}

#[test]
fn self_referential_type_reports_recursion() {
    let mut ast = Arena::new();
    let a = ast.variable("$a", loc());
    let b = ast.variable("$b", loc());
    let one = ast.integer(1, loc());
    let sum = ast.binop(b, BinaryOp::Plus, one, loc());
    ast.set_type(a, TypeSource::SameAs(sum));
    ast.set_type(b, TypeSource::SameAs(a));

    let error = error_of(&ast, a);
    assert!(error.contains("recursive type inference"), "{error}");
    // Nothing is left marked as in progress.
    assert!(error_of(&ast, b).contains("recursive type inference"));
}

#[test]
#[should_panic(expected = "BUG: type read before valid()")]
fn reading_before_valid_is_a_bug() {
    let mut ast = Arena::new();
    let int = ast.integer(1, loc());
    let future = ast.type_of(int);
    let _ = future.ty();
}

#[test]
fn array_comparison_rules() {
    let mut ast = Arena::new();
    let ints = |ast: &mut Arena, name: &str, bits: u8, len: usize| {
        let var = ast.variable(name, loc());
        ast.set_type(var, TypeSource::Fixed(SizedType::array(SizedType::int(bits), len)));
        var
    };
    let a = ints(&mut ast, "$a", 8, 4);
    let b = ints(&mut ast, "$b", 8, 4);
    let eq = ast.binop(a, BinaryOp::Eq, b, loc());
    assert_eq!(type_of(&ast, eq), SizedType::int64());

    let lt = ast.binop(a, BinaryOp::Lt, b, loc());
    assert_eq!(error_of(&ast, lt), "The < operator cannot be used on arrays.");

    let wide = ints(&mut ast, "$c", 32, 4);
    let mixed = ast.binop(a, BinaryOp::Eq, wide, loc());
    assert_eq!(
        error_of(&ast, mixed),
        "Only arrays of same sized integer support comparison operators."
    );

    let strings = ast.variable("$s", loc());
    ast.set_type(
        strings,
        TypeSource::Fixed(SizedType::array(SizedType::string(4), 4)),
    );
    let not_int = ast.binop(strings, BinaryOp::Ne, strings, loc());
    assert_eq!(
        error_of(&ast, not_int),
        "Only arrays of same sized integer support comparison operators."
    );
}

#[test]
fn integer_arithmetic_result_types() {
    let mut ast = Arena::new();
    let small = ast.variable("$small", loc());
    ast.set_type(small, TypeSource::Fixed(SizedType::uint(16)));
    let big = ast.integer(3, loc());
    let mul = ast.binop(small, BinaryOp::Mul, big, loc());
    assert_eq!(type_of(&ast, mul), SizedType::int64());

    let string = ast.string("x", loc());
    let bad = ast.binop(string, BinaryOp::Minus, big, loc());
    assert_eq!(
        error_of(&ast, bad),
        "The - operator cannot be used on types string[2] and int64"
    );
}

#[test]
fn logical_not_yields_a_byte() {
    let mut ast = Arena::new();
    let string = ast.string("abc", loc());
    let not = ast.unop(UnaryOp::LNot, string, loc());
    assert_eq!(type_of(&ast, not), SizedType::boolean());
    assert_eq!(SizedType::boolean().size(), 1);
}

#[test]
fn dereference_requires_a_pointer() {
    let mut ast = Arena::new();
    let ptr = ast.variable("$p", loc());
    ast.set_type(ptr, TypeSource::Fixed(SizedType::pointer(SizedType::int(32))));
    let deref = ast.unop(UnaryOp::Deref, ptr, loc());
    assert_eq!(type_of(&ast, deref), SizedType::int(32));

    let int = ast.integer(1, loc());
    let bad = ast.unop(UnaryOp::Deref, int, loc());
    assert_eq!(error_of(&ast, bad), "invalid dereference of type int64");
}

#[test]
fn ternary_branches_must_agree() {
    let mut ast = Arena::new();
    let cond = ast.integer(1, loc());
    let left = ast.integer(2, loc());
    let right = ast.string("no", loc());
    let ternary = ast.ternary(cond, left, right, loc());
    assert_eq!(
        error_of(&ast, ternary),
        "ternary type mismatch, left type is int64, right type is string[3]"
    );
}

#[test]
fn field_access_on_records() {
    let mut ast = Arena::new();
    let record = Record::with_fields(
        "struct point",
        vec![("x".into(), SizedType::int(32)), ("y".into(), SizedType::int(32))],
    );
    let var = ast.variable("$p", loc());
    ast.set_type(var, TypeSource::Fixed(SizedType::Record(record)));
    let x = ast.field_access(var, "x", loc());
    assert_eq!(type_of(&ast, x), SizedType::int(32));

    let z = ast.field_access(var, "z", loc());
    assert_eq!(error_of(&ast, z), "field z not found on type struct point");

    let int = ast.integer(1, loc());
    let bad = ast.field_access(int, "x", loc());
    assert_eq!(error_of(&ast, bad), "field access on non-record type int64");
}

#[test]
fn array_access_unwraps_element_or_pointee() {
    let mut ast = Arena::new();
    let arr = ast.variable("$a", loc());
    ast.set_type(arr, TypeSource::Fixed(SizedType::array(SizedType::uint(8), 16)));
    let idx = ast.integer(0, loc());
    let access = ast.array_access(arr, idx, loc());
    assert_eq!(type_of(&ast, access), SizedType::uint(8));

    let bad = ast.array_access(idx, idx, loc());
    assert_eq!(error_of(&ast, bad), "type int64 not legal for array access");
}

#[test]
fn tuples_reject_map_only_elements() {
    let mut ast = Arena::new();
    let one = ast.integer(1, loc());
    let name = ast.string("ab", loc());
    let tuple = ast.tuple(vec![one, name], loc());
    assert_eq!(
        type_of(&ast, tuple),
        SizedType::Tuple(vec![SizedType::int64(), SizedType::string(3)])
    );

    let counter = ast.map("@c", None, loc());
    ast.set_type(
        counter,
        TypeSource::Fixed(SizedType::Aggregate(AggregateKind::Count)),
    );
    let bad = ast.tuple(vec![one, counter], loc());
    assert_eq!(
        error_of(&ast, bad),
        "map type count_t cannot exist inside a tuple"
    );
}
