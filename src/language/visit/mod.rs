//! Generic tree traversal with in-place rewriting.
//!
//! A [`Visitor`] overrides the `visit_*` methods it cares about; every other
//! node falls back to the matching `walk_*` function, which visits the
//! children in a fixed order and merges their results. Overriding a method
//! makes the override responsible for its children: call the `walk_*`
//! function to keep the default descent.
//!
//! After a child in a single-node slot has been visited, `replace_expr` /
//! `replace_stmt` may hand back a different node; the walker stores it in the
//! parent slot. List elements are replaced one by one, never the list itself.


use crate::language::{
    ast::*,
    errors::ErrorOr,
};

/// Combination of results from sibling subtrees.
pub trait Merge: Default {
    fn merge(self, other: Self) -> Self;
}

impl Merge for () {
    fn merge(self, _other: ()) {}
}

/// Plain values keep the last result.
impl Merge for bool {
    fn merge(self, other: bool) -> bool {
        other
    }
}

impl<T: Default> Merge for ErrorOr<T> {
    fn merge(self, other: Self) -> Self {
        ErrorOr::merge(self, other)
    }
}

fn merge_all<R: Merge>(results: impl IntoIterator<Item = R>) -> R {
    let mut iter = results.into_iter();
    match iter.next() {
        Some(first) => iter.fold(first, Merge::merge),
        None => R::default(),
    }
}

macro_rules! expect_expr {
    ($ast:expr, $id:expr, $variant:ident) => {
        match &$ast[$id].kind {
            ExprKind::$variant(node) => node.clone(),
            other => panic!(
                "BUG: expected {} expression, found {:?}",
                stringify!($variant),
                other.tag()
            ),
        }
    };
}

macro_rules! expect_stmt {
    ($ast:expr, $id:expr, $variant:ident) => {
        match &$ast[$id].kind {
            StmtKind::$variant(node) => node.clone(),
            other => panic!(
                "BUG: expected {} statement, found {:?}",
                stringify!($variant),
                other.tag()
            ),
        }
    };
}

pub(crate) use expect_expr;
pub(crate) use expect_stmt;

pub trait Visitor: Sized {
    type Output: Merge;

    /// Called for every node reached through the default dispatch, before
    /// its own visit method.
    fn pre_visit(&mut self, _ast: &Arena, _node: NodeRef) {}

    fn replace_expr(&mut self, _ast: &mut Arena, id: ExprId, _result: &Self::Output) -> ExprId {
        id
    }

    fn replace_stmt(&mut self, _ast: &mut Arena, id: StmtId, _result: &Self::Output) -> StmtId {
        id
    }

    fn visit_program(&mut self, ast: &mut Arena) -> Self::Output {
        walk_program(self, ast)
    }

    fn visit_probe(&mut self, ast: &mut Arena, id: ProbeId) -> Self::Output {
        walk_probe(self, ast, id)
    }

    fn visit_attach_point(&mut self, _ast: &mut Arena, _id: AttachPointId) -> Self::Output {
        Self::Output::default()
    }

    fn visit_predicate(&mut self, ast: &mut Arena, probe: ProbeId) -> Self::Output {
        walk_predicate(self, ast, probe)
    }

    fn visit_subprog(&mut self, ast: &mut Arena, id: SubprogId) -> Self::Output {
        walk_subprog(self, ast, id)
    }

    fn visit_subprog_arg(&mut self, _ast: &mut Arena, _id: SubprogId, _arg: usize) -> Self::Output {
        Self::Output::default()
    }

    fn visit_stmt(&mut self, ast: &mut Arena, id: StmtId) -> Self::Output {
        dispatch_stmt(self, ast, id)
    }

    fn visit_expr(&mut self, ast: &mut Arena, id: ExprId) -> Self::Output {
        dispatch_expr(self, ast, id)
    }

    fn visit_integer(&mut self, _ast: &mut Arena, _id: ExprId) -> Self::Output {
        Self::Output::default()
    }

    fn visit_string(&mut self, _ast: &mut Arena, _id: ExprId) -> Self::Output {
        Self::Output::default()
    }

    fn visit_stack_mode(&mut self, _ast: &mut Arena, _id: ExprId) -> Self::Output {
        Self::Output::default()
    }

    fn visit_positional_parameter(&mut self, _ast: &mut Arena, _id: ExprId) -> Self::Output {
        Self::Output::default()
    }

    fn visit_identifier(&mut self, _ast: &mut Arena, _id: ExprId) -> Self::Output {
        Self::Output::default()
    }

    fn visit_builtin(&mut self, _ast: &mut Arena, _id: ExprId) -> Self::Output {
        Self::Output::default()
    }

    fn visit_call(&mut self, ast: &mut Arena, id: ExprId) -> Self::Output {
        walk_call(self, ast, id)
    }

    fn visit_sizeof(&mut self, ast: &mut Arena, id: ExprId) -> Self::Output {
        walk_sizeof(self, ast, id)
    }

    fn visit_offsetof(&mut self, ast: &mut Arena, id: ExprId) -> Self::Output {
        walk_offsetof(self, ast, id)
    }

    fn visit_map(&mut self, ast: &mut Arena, id: ExprId) -> Self::Output {
        walk_map(self, ast, id)
    }

    fn visit_variable(&mut self, _ast: &mut Arena, _id: ExprId) -> Self::Output {
        Self::Output::default()
    }

    fn visit_binop(&mut self, ast: &mut Arena, id: ExprId) -> Self::Output {
        walk_binop(self, ast, id)
    }

    fn visit_unop(&mut self, ast: &mut Arena, id: ExprId) -> Self::Output {
        walk_unop(self, ast, id)
    }

    fn visit_ternary(&mut self, ast: &mut Arena, id: ExprId) -> Self::Output {
        walk_ternary(self, ast, id)
    }

    fn visit_field_access(&mut self, ast: &mut Arena, id: ExprId) -> Self::Output {
        walk_field_access(self, ast, id)
    }

    fn visit_array_access(&mut self, ast: &mut Arena, id: ExprId) -> Self::Output {
        walk_array_access(self, ast, id)
    }

    fn visit_cast(&mut self, ast: &mut Arena, id: ExprId) -> Self::Output {
        walk_cast(self, ast, id)
    }

    fn visit_tuple(&mut self, ast: &mut Arena, id: ExprId) -> Self::Output {
        walk_tuple(self, ast, id)
    }

    fn visit_expr_statement(&mut self, ast: &mut Arena, id: StmtId) -> Self::Output {
        walk_expr_statement(self, ast, id)
    }

    fn visit_var_decl(&mut self, ast: &mut Arena, id: StmtId) -> Self::Output {
        walk_var_decl(self, ast, id)
    }

    fn visit_assign_map(&mut self, ast: &mut Arena, id: StmtId) -> Self::Output {
        walk_assign_map(self, ast, id)
    }

    fn visit_assign_var(&mut self, ast: &mut Arena, id: StmtId) -> Self::Output {
        walk_assign_var(self, ast, id)
    }

    fn visit_assign_config_var(&mut self, ast: &mut Arena, id: StmtId) -> Self::Output {
        walk_assign_config_var(self, ast, id)
    }

    fn visit_block(&mut self, ast: &mut Arena, id: StmtId) -> Self::Output {
        walk_block(self, ast, id)
    }

    fn visit_if(&mut self, ast: &mut Arena, id: StmtId) -> Self::Output {
        walk_if(self, ast, id)
    }

    fn visit_unroll(&mut self, ast: &mut Arena, id: StmtId) -> Self::Output {
        walk_unroll(self, ast, id)
    }

    fn visit_jump(&mut self, ast: &mut Arena, id: StmtId) -> Self::Output {
        walk_jump(self, ast, id)
    }

    fn visit_while(&mut self, ast: &mut Arena, id: StmtId) -> Self::Output {
        walk_while(self, ast, id)
    }

    fn visit_for(&mut self, ast: &mut Arena, id: StmtId) -> Self::Output {
        walk_for(self, ast, id)
    }

    fn visit_config(&mut self, ast: &mut Arena, id: StmtId) -> Self::Output {
        walk_config(self, ast, id)
    }
}

/// Runs `visitor` over the whole program.
pub fn visit<V: Visitor>(visitor: &mut V, ast: &mut Arena) -> V::Output {
    visitor.visit_program(ast)
}

pub fn dispatch_expr<V: Visitor>(v: &mut V, ast: &mut Arena, id: ExprId) -> V::Output {
    v.pre_visit(ast, NodeRef::Expr(id));
    match ast[id].tag() {
        ExprTag::Integer => v.visit_integer(ast, id),
        ExprTag::String => v.visit_string(ast, id),
        ExprTag::StackMode => v.visit_stack_mode(ast, id),
        ExprTag::PositionalParameter => v.visit_positional_parameter(ast, id),
        ExprTag::Identifier => v.visit_identifier(ast, id),
        ExprTag::Builtin => v.visit_builtin(ast, id),
        ExprTag::Call => v.visit_call(ast, id),
        ExprTag::Sizeof => v.visit_sizeof(ast, id),
        ExprTag::Offsetof => v.visit_offsetof(ast, id),
        ExprTag::Map => v.visit_map(ast, id),
        ExprTag::Variable => v.visit_variable(ast, id),
        ExprTag::Binop => v.visit_binop(ast, id),
        ExprTag::Unop => v.visit_unop(ast, id),
        ExprTag::Ternary => v.visit_ternary(ast, id),
        ExprTag::FieldAccess => v.visit_field_access(ast, id),
        ExprTag::ArrayAccess => v.visit_array_access(ast, id),
        ExprTag::Cast => v.visit_cast(ast, id),
        ExprTag::Tuple => v.visit_tuple(ast, id),
    }
}

pub fn dispatch_stmt<V: Visitor>(v: &mut V, ast: &mut Arena, id: StmtId) -> V::Output {
    v.pre_visit(ast, NodeRef::Stmt(id));
    match ast[id].tag() {
        StmtTag::Expr => v.visit_expr_statement(ast, id),
        StmtTag::VarDecl => v.visit_var_decl(ast, id),
        StmtTag::AssignMap => v.visit_assign_map(ast, id),
        StmtTag::AssignVar => v.visit_assign_var(ast, id),
        StmtTag::AssignConfigVar => v.visit_assign_config_var(ast, id),
        StmtTag::Block => v.visit_block(ast, id),
        StmtTag::If => v.visit_if(ast, id),
        StmtTag::Unroll => v.visit_unroll(ast, id),
        StmtTag::Jump => v.visit_jump(ast, id),
        StmtTag::While => v.visit_while(ast, id),
        StmtTag::For => v.visit_for(ast, id),
        StmtTag::Config => v.visit_config(ast, id),
    }
}

/// Visits the expression in a slot and returns the (possibly replaced) node
/// to store back, together with the visit result.
pub fn visit_expr_slot<V: Visitor>(v: &mut V, ast: &mut Arena, id: ExprId) -> (ExprId, V::Output) {
    let result = v.visit_expr(ast, id);
    let replaced = v.replace_expr(ast, id, &result);
    if replaced != id {
        ast.types().invalidate();
    }
    (replaced, result)
}

pub fn visit_stmt_slot<V: Visitor>(v: &mut V, ast: &mut Arena, id: StmtId) -> (StmtId, V::Output) {
    let result = v.visit_stmt(ast, id);
    let replaced = v.replace_stmt(ast, id, &result);
    if replaced != id {
        ast.types().invalidate();
    }
    (replaced, result)
}

fn visit_expr_list<V: Visitor>(v: &mut V, ast: &mut Arena, ids: &[ExprId]) -> (Vec<ExprId>, V::Output) {
    let mut replaced = Vec::with_capacity(ids.len());
    let mut results = Vec::with_capacity(ids.len());
    for id in ids {
        let (new_id, result) = visit_expr_slot(v, ast, *id);
        replaced.push(new_id);
        results.push(result);
    }
    (replaced, merge_all(results))
}

fn visit_stmt_list<V: Visitor>(v: &mut V, ast: &mut Arena, ids: &[StmtId]) -> (Vec<StmtId>, V::Output) {
    let mut replaced = Vec::with_capacity(ids.len());
    let mut results = Vec::with_capacity(ids.len());
    for id in ids {
        let (new_id, result) = visit_stmt_slot(v, ast, *id);
        replaced.push(new_id);
        results.push(result);
    }
    (replaced, merge_all(results))
}

/// Functions, then probes, then the config block.
pub fn walk_program<V: Visitor>(v: &mut V, ast: &mut Arena) -> V::Output {
    v.pre_visit(ast, NodeRef::Program);
    let program = ast.program().clone();
    let mut results = Vec::new();
    for func in program.functions {
        v.pre_visit(ast, NodeRef::Subprog(func));
        results.push(v.visit_subprog(ast, func));
    }
    for probe in program.probes {
        v.pre_visit(ast, NodeRef::Probe(probe));
        results.push(v.visit_probe(ast, probe));
    }
    if let Some(config) = program.config {
        let (new_config, result) = visit_stmt_slot(v, ast, config);
        ast.program_mut().config = Some(new_config);
        results.push(result);
    }
    merge_all(results)
}

/// Attach points, predicate, body.
pub fn walk_probe<V: Visitor>(v: &mut V, ast: &mut Arena, id: ProbeId) -> V::Output {
    let probe = ast.probe(id).clone();
    let mut results = Vec::new();
    for ap in probe.attach_points {
        v.pre_visit(ast, NodeRef::AttachPoint(ap));
        results.push(v.visit_attach_point(ast, ap));
    }
    if probe.pred.is_some() {
        v.pre_visit(ast, NodeRef::Predicate(id));
        results.push(v.visit_predicate(ast, id));
    }
    let (block, result) = visit_stmt_slot(v, ast, probe.block);
    ast.probe_mut(id).block = block;
    results.push(result);
    merge_all(results)
}

pub fn walk_predicate<V: Visitor>(v: &mut V, ast: &mut Arena, probe: ProbeId) -> V::Output {
    let Some(pred) = ast.probe(probe).pred.clone() else {
        return V::Output::default();
    };
    let (expr, result) = visit_expr_slot(v, ast, pred.expr);
    if let Some(pred) = ast.probe_mut(probe).pred.as_mut() {
        pred.expr = expr;
    }
    result
}

/// Arguments, then body statements.
pub fn walk_subprog<V: Visitor>(v: &mut V, ast: &mut Arena, id: SubprogId) -> V::Output {
    let subprog = ast.subprog(id).clone();
    let mut results = Vec::new();
    for arg in 0..subprog.args.len() {
        v.pre_visit(ast, NodeRef::SubprogArg(id, arg));
        results.push(v.visit_subprog_arg(ast, id, arg));
    }
    let (stmts, result) = visit_stmt_list(v, ast, &subprog.stmts);
    ast.subprog_mut(id).stmts = stmts;
    results.push(result);
    merge_all(results)
}

pub fn walk_call<V: Visitor>(v: &mut V, ast: &mut Arena, id: ExprId) -> V::Output {
    let call = expect_expr!(ast, id, Call);
    let (args, result) = visit_expr_list(v, ast, &call.args);
    if let ExprKind::Call(call) = &mut ast[id].kind {
        call.args = args;
    }
    result
}

pub fn walk_sizeof<V: Visitor>(v: &mut V, ast: &mut Arena, id: ExprId) -> V::Output {
    let sizeof = expect_expr!(ast, id, Sizeof);
    let SizeofTarget::Expr(expr) = sizeof.target else {
        return V::Output::default();
    };
    let (expr, result) = visit_expr_slot(v, ast, expr);
    if let ExprKind::Sizeof(sizeof) = &mut ast[id].kind {
        sizeof.target = SizeofTarget::Expr(expr);
    }
    result
}

pub fn walk_offsetof<V: Visitor>(v: &mut V, ast: &mut Arena, id: ExprId) -> V::Output {
    let offsetof = expect_expr!(ast, id, Offsetof);
    let SizeofTarget::Expr(expr) = offsetof.record else {
        return V::Output::default();
    };
    let (expr, result) = visit_expr_slot(v, ast, expr);
    if let ExprKind::Offsetof(offsetof) = &mut ast[id].kind {
        offsetof.record = SizeofTarget::Expr(expr);
    }
    result
}

pub fn walk_map<V: Visitor>(v: &mut V, ast: &mut Arena, id: ExprId) -> V::Output {
    let map = expect_expr!(ast, id, Map);
    let Some(key) = map.key else {
        return V::Output::default();
    };
    let (key, result) = visit_expr_slot(v, ast, key);
    if let ExprKind::Map(map) = &mut ast[id].kind {
        map.key = Some(key);
    }
    ast[key].key_for_map = Some(id);
    result
}

pub fn walk_binop<V: Visitor>(v: &mut V, ast: &mut Arena, id: ExprId) -> V::Output {
    let binop = expect_expr!(ast, id, Binop);
    let (left, left_result) = visit_expr_slot(v, ast, binop.left);
    let (right, right_result) = visit_expr_slot(v, ast, binop.right);
    if let ExprKind::Binop(binop) = &mut ast[id].kind {
        binop.left = left;
        binop.right = right;
    }
    left_result.merge(right_result)
}

pub fn walk_unop<V: Visitor>(v: &mut V, ast: &mut Arena, id: ExprId) -> V::Output {
    let unop = expect_expr!(ast, id, Unop);
    let (expr, result) = visit_expr_slot(v, ast, unop.expr);
    if let ExprKind::Unop(unop) = &mut ast[id].kind {
        unop.expr = expr;
    }
    result
}

pub fn walk_ternary<V: Visitor>(v: &mut V, ast: &mut Arena, id: ExprId) -> V::Output {
    let ternary = expect_expr!(ast, id, Ternary);
    let (cond, cond_result) = visit_expr_slot(v, ast, ternary.cond);
    let (left, left_result) = visit_expr_slot(v, ast, ternary.left);
    let (right, right_result) = visit_expr_slot(v, ast, ternary.right);
    if let ExprKind::Ternary(ternary) = &mut ast[id].kind {
        ternary.cond = cond;
        ternary.left = left;
        ternary.right = right;
    }
    merge_all([cond_result, left_result, right_result])
}

pub fn walk_field_access<V: Visitor>(v: &mut V, ast: &mut Arena, id: ExprId) -> V::Output {
    let access = expect_expr!(ast, id, FieldAccess);
    let (expr, result) = visit_expr_slot(v, ast, access.expr);
    if let ExprKind::FieldAccess(access) = &mut ast[id].kind {
        access.expr = expr;
    }
    result
}

pub fn walk_array_access<V: Visitor>(v: &mut V, ast: &mut Arena, id: ExprId) -> V::Output {
    let access = expect_expr!(ast, id, ArrayAccess);
    let (expr, expr_result) = visit_expr_slot(v, ast, access.expr);
    let (index, index_result) = visit_expr_slot(v, ast, access.index);
    if let ExprKind::ArrayAccess(access) = &mut ast[id].kind {
        access.expr = expr;
        access.index = index;
    }
    expr_result.merge(index_result)
}

pub fn walk_cast<V: Visitor>(v: &mut V, ast: &mut Arena, id: ExprId) -> V::Output {
    let cast = expect_expr!(ast, id, Cast);
    let (expr, result) = visit_expr_slot(v, ast, cast.expr);
    if let ExprKind::Cast(cast) = &mut ast[id].kind {
        cast.expr = expr;
    }
    result
}

pub fn walk_tuple<V: Visitor>(v: &mut V, ast: &mut Arena, id: ExprId) -> V::Output {
    let tuple = expect_expr!(ast, id, Tuple);
    let (elems, result) = visit_expr_list(v, ast, &tuple.elems);
    if let ExprKind::Tuple(tuple) = &mut ast[id].kind {
        tuple.elems = elems;
    }
    result
}

pub fn walk_expr_statement<V: Visitor>(v: &mut V, ast: &mut Arena, id: StmtId) -> V::Output {
    let stmt = expect_stmt!(ast, id, Expr);
    let (expr, result) = visit_expr_slot(v, ast, stmt.expr);
    if let StmtKind::Expr(stmt) = &mut ast[id].kind {
        stmt.expr = expr;
    }
    result
}

pub fn walk_var_decl<V: Visitor>(v: &mut V, ast: &mut Arena, id: StmtId) -> V::Output {
    let decl = expect_stmt!(ast, id, VarDecl);
    let (var, result) = visit_expr_slot(v, ast, decl.var);
    if let StmtKind::VarDecl(decl) = &mut ast[id].kind {
        decl.var = var;
    }
    result
}

pub fn walk_assign_map<V: Visitor>(v: &mut V, ast: &mut Arena, id: StmtId) -> V::Output {
    let assign = expect_stmt!(ast, id, AssignMap);
    let (map, map_result) = visit_expr_slot(v, ast, assign.map);
    let (expr, expr_result) = visit_expr_slot(v, ast, assign.expr);
    if let StmtKind::AssignMap(assign) = &mut ast[id].kind {
        assign.map = map;
        assign.expr = expr;
    }
    ast[expr].map = Some(map);
    map_result.merge(expr_result)
}

pub fn walk_assign_var<V: Visitor>(v: &mut V, ast: &mut Arena, id: StmtId) -> V::Output {
    let assign = expect_stmt!(ast, id, AssignVar);
    let (var, var_result) = visit_expr_slot(v, ast, assign.var);
    let (expr, expr_result) = visit_expr_slot(v, ast, assign.expr);
    if let StmtKind::AssignVar(assign) = &mut ast[id].kind {
        assign.var = var;
        assign.expr = expr;
    }
    ast[expr].var = Some(var);
    var_result.merge(expr_result)
}

pub fn walk_assign_config_var<V: Visitor>(v: &mut V, ast: &mut Arena, id: StmtId) -> V::Output {
    let assign = expect_stmt!(ast, id, AssignConfigVar);
    let (expr, result) = visit_expr_slot(v, ast, assign.expr);
    if let StmtKind::AssignConfigVar(assign) = &mut ast[id].kind {
        assign.expr = expr;
    }
    result
}

pub fn walk_block<V: Visitor>(v: &mut V, ast: &mut Arena, id: StmtId) -> V::Output {
    let block = expect_stmt!(ast, id, Block);
    let (stmts, result) = visit_stmt_list(v, ast, &block.stmts);
    if let StmtKind::Block(block) = &mut ast[id].kind {
        block.stmts = stmts;
    }
    result
}

/// Condition, then-block, else-block.
pub fn walk_if<V: Visitor>(v: &mut V, ast: &mut Arena, id: StmtId) -> V::Output {
    let if_stmt = expect_stmt!(ast, id, If);
    let (cond, cond_result) = visit_expr_slot(v, ast, if_stmt.cond);
    let (then_block, then_result) = visit_stmt_slot(v, ast, if_stmt.then_block);
    let (else_block, else_result) = match if_stmt.else_block {
        Some(else_block) => {
            let (else_block, result) = visit_stmt_slot(v, ast, else_block);
            (Some(else_block), result)
        }
        None => (None, V::Output::default()),
    };
    if let StmtKind::If(if_stmt) = &mut ast[id].kind {
        if_stmt.cond = cond;
        if_stmt.then_block = then_block;
        if_stmt.else_block = else_block;
    }
    merge_all([cond_result, then_result, else_result])
}

pub fn walk_unroll<V: Visitor>(v: &mut V, ast: &mut Arena, id: StmtId) -> V::Output {
    let unroll = expect_stmt!(ast, id, Unroll);
    let (expr, expr_result) = visit_expr_slot(v, ast, unroll.expr);
    let (block, block_result) = visit_stmt_slot(v, ast, unroll.block);
    if let StmtKind::Unroll(unroll) = &mut ast[id].kind {
        unroll.expr = expr;
        unroll.block = block;
    }
    expr_result.merge(block_result)
}

pub fn walk_jump<V: Visitor>(v: &mut V, ast: &mut Arena, id: StmtId) -> V::Output {
    let jump = expect_stmt!(ast, id, Jump);
    let Some(value) = jump.return_value else {
        return V::Output::default();
    };
    let (value, result) = visit_expr_slot(v, ast, value);
    if let StmtKind::Jump(jump) = &mut ast[id].kind {
        jump.return_value = Some(value);
    }
    result
}

pub fn walk_while<V: Visitor>(v: &mut V, ast: &mut Arena, id: StmtId) -> V::Output {
    let while_loop = expect_stmt!(ast, id, While);
    let (cond, cond_result) = visit_expr_slot(v, ast, while_loop.cond);
    let (block, block_result) = visit_stmt_slot(v, ast, while_loop.block);
    if let StmtKind::While(while_loop) = &mut ast[id].kind {
        while_loop.cond = cond;
        while_loop.block = block;
    }
    cond_result.merge(block_result)
}

/// Declaration, iterated expression, then body statements.
pub fn walk_for<V: Visitor>(v: &mut V, ast: &mut Arena, id: StmtId) -> V::Output {
    let for_loop = expect_stmt!(ast, id, For);
    let (decl, decl_result) = visit_expr_slot(v, ast, for_loop.decl);
    let (expr, expr_result) = visit_expr_slot(v, ast, for_loop.expr);
    let (stmts, body_result) = visit_stmt_list(v, ast, &for_loop.stmts);
    if let StmtKind::For(for_loop) = &mut ast[id].kind {
        for_loop.decl = decl;
        for_loop.expr = expr;
        for_loop.stmts = stmts;
    }
    merge_all([decl_result, expr_result, body_result])
}

pub fn walk_config<V: Visitor>(v: &mut V, ast: &mut Arena, id: StmtId) -> V::Output {
    let config = expect_stmt!(ast, id, Config);
    let (stmts, result) = visit_stmt_list(v, ast, &config.stmts);
    if let StmtKind::Config(config) = &mut ast[id].kind {
        config.stmts = stmts;
    }
    result
}
