//! Resolves the types of names: builtins, maps, variables, calls, casts and
//! the records they refer to. Record layouts come from the C definitions of
//! the program, per-binary debug info and the kernel type database.

use super::{c_definitions::CDefinitions, Pass, PassContext};
use crate::{
    config::ConfigKeyInt,
    language::{
        ast::*,
        errors::{outcome_from, Diagnostic, Diagnostics},
        functions::{Function, FunctionOrigin, FunctionRegistry, Param},
        span::Location,
        structs::StructRegistry,
        typecheck::TypeSource,
        types::{Record, SizedType},
        visit::{
            expect_expr, expect_stmt, visit, walk_assign_map, walk_assign_var, walk_call,
            walk_cast, walk_field_access, walk_for, walk_map, walk_offsetof, walk_probe,
            walk_sizeof, walk_subprog, walk_unop, walk_var_decl, Visitor,
        },
    },
    providers::Providers,
    RETVAL_FIELD,
};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, trace, warn};

/// Arguments passed in registers; more than this forces stack-passed
/// arguments that `args` cannot reach.
const MAX_REGISTER_ARGS: usize = 6;

/// How deep nested records are completed when a record is first resolved.
const RECORD_COMPLETION_DEPTH: usize = 3;

/// Type names the analysis could not resolve from any source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldInfo {
    pub unresolved: BTreeSet<String>,
}

fn builtin_type(builtin: &Builtin, probe_type: Option<ProbeType>, max_strlen: usize) -> Option<SizedType> {
    let ty = match builtin.ident.as_str() {
        "nsecs" | "elapsed" | "cgroup" | "jiffies" | "kstack" | "ustack" => SizedType::uint64(),
        "pid" | "tid" | "uid" | "gid" | "cpu" | "numaid" | "rand" => SizedType::uint(32),
        "comm" | "username" => SizedType::string(16),
        "probe" => SizedType::string(max_strlen),
        "func" => match probe_type {
            Some(probe_type) if probe_type.is_userspace() => SizedType::Usym,
            _ => SizedType::Ksym,
        },
        ident if builtin.is_argx() && ident.starts_with('s') => SizedType::int64(),
        _ if builtin.is_argx() => SizedType::uint64(),
        _ => return None,
    };
    Some(ty)
}

fn context_record(probe_type: ProbeType, func: &str) -> Option<String> {
    match probe_type {
        ProbeType::Kprobe
        | ProbeType::Kretprobe
        | ProbeType::Uprobe
        | ProbeType::Uretprobe
        | ProbeType::Usdt => Some("struct pt_regs".to_string()),
        ProbeType::Profile | ProbeType::Interval | ProbeType::Software | ProbeType::Hardware => {
            Some("struct bpf_perf_event_data".to_string())
        }
        ProbeType::Iter => Some(format!("struct bpf_iter__{func}")),
        _ => None,
    }
}

/// Types given to maps that first appear in arithmetic, e.g. `@x++` or
/// `@x = @x + 1`.
fn arithmetic_fallback(ast: &Arena, expr: ExprId) -> Option<SizedType> {
    match &ast[expr].kind {
        ExprKind::Binop(binop) if binop.op.is_comparison() || binop.op.is_logical() => {
            Some(SizedType::int64())
        }
        ExprKind::Binop(binop) => [binop.left, binop.right]
            .into_iter()
            .filter_map(|side| ast.resolved_type(side))
            .find(SizedType::is_integer)
            .map(|_| SizedType::int64()),
        ExprKind::Unop(unop)
            if matches!(unop.op, UnaryOp::Increment | UnaryOp::Decrement | UnaryOp::Minus) =>
        {
            Some(SizedType::int64())
        }
        _ => None,
    }
}

/// Probe under analysis.
struct ProbeScope {
    id: ProbeId,
    attach_points: Vec<AttachPoint>,
    args_resolved: bool,
}

pub struct FieldAnalyser<'a> {
    structs: &'a mut StructRegistry,
    functions: &'a mut FunctionRegistry,
    providers: &'a Providers,
    max_strlen: usize,
    probe: Option<ProbeScope>,
    /// Per probe (or function).
    var_types: HashMap<String, SizedType>,
    /// Program wide.
    map_types: HashMap<String, SizedType>,
    map_key_types: HashMap<String, SizedType>,
    registered: HashSet<SubprogId>,
    info: FieldInfo,
    diagnostics: Diagnostics,
}

impl<'a> FieldAnalyser<'a> {
    pub fn new(
        structs: &'a mut StructRegistry,
        functions: &'a mut FunctionRegistry,
        providers: &'a Providers,
        max_strlen: usize,
    ) -> Self {
        Self {
            structs,
            functions,
            providers,
            max_strlen,
            probe: None,
            var_types: HashMap::new(),
            map_types: HashMap::new(),
            map_key_types: HashMap::new(),
            registered: HashSet::new(),
            info: FieldInfo::default(),
            diagnostics: Vec::new(),
        }
    }

    /// Sweeps the program until no new map types are learned, so that a map
    /// read before its assignment (in program order) still gets a type.
    pub fn analyse(&mut self, ast: &mut Arena, max_iterations: u64) {
        let mut iteration = 0u64;
        loop {
            iteration += 1;
            self.info = FieldInfo::default();
            self.diagnostics.clear();
            let known = self.map_types.len();
            visit(self, ast);
            trace!(iteration, maps = self.map_types.len(), "field analysis sweep");
            if self.map_types.len() == known || (max_iterations != 0 && iteration >= max_iterations) {
                break;
            }
        }
    }

    pub fn finish(self) -> (FieldInfo, Diagnostics) {
        (self.info, self.diagnostics)
    }

    fn error(&mut self, message: impl Into<String>, loc: Location) {
        self.diagnostics.push(Diagnostic::error(message).at(loc));
    }

    fn warning(&mut self, message: impl Into<String>, loc: Location) {
        self.diagnostics.push(Diagnostic::warning(message).at(loc));
    }

    fn current_probe_type(&self) -> Option<ProbeType> {
        self.probe
            .as_ref()
            .and_then(|scope| scope.attach_points.last())
            .map(AttachPoint::probe_type)
    }

    fn lookup_record(&mut self, name: &str) -> Option<Record> {
        if let Some(known) = self.structs.get(name).filter(|record| record.is_resolved()) {
            return Some(known.clone());
        }
        let targets: Vec<String> = self
            .probe
            .iter()
            .flat_map(|scope| scope.attach_points.iter().map(|ap| ap.target.clone()))
            .filter(|target| !target.is_empty())
            .collect();
        let from_debug_info = targets
            .iter()
            .find_map(|target| self.providers.debug_info.get_stype(target, name));
        let found = from_debug_info.or_else(|| {
            self.providers
                .kernel
                .as_ref()
                .and_then(|kernel| kernel.get_stype(name))
        });
        match found {
            Some(SizedType::Record(record)) if record.is_resolved() => {
                debug!(record = name, "resolved record from type information");
                self.structs.insert(record.clone());
                Some(record)
            }
            _ => None,
        }
    }

    /// Fills in record layouts reachable from `ty`, recording names that
    /// stay unresolved.
    fn complete(&mut self, ty: &mut SizedType) {
        self.complete_to_depth(ty, RECORD_COMPLETION_DEPTH);
    }

    fn complete_to_depth(&mut self, ty: &mut SizedType, depth: usize) {
        match ty {
            SizedType::Record(record) => {
                if !record.is_resolved() {
                    match self.lookup_record(&record.name) {
                        Some(found) => *record = found,
                        None => {
                            self.info.unresolved.insert(record.name.clone());
                            return;
                        }
                    }
                }
                if depth > 0 {
                    let mut fields = record.fields.clone();
                    for field in &mut fields {
                        self.complete_to_depth(&mut field.ty, depth - 1);
                    }
                    record.fields = fields;
                }
            }
            SizedType::Pointer(inner) | SizedType::Array { element: inner, .. } => {
                self.complete_to_depth(inner, depth)
            }
            SizedType::Tuple(elements) => {
                for elem in elements {
                    self.complete_to_depth(elem, depth);
                }
            }
            _ => {}
        }
    }

    fn args_for_attach_point(&mut self, ap: &AttachPoint, func: &str, target: &str, expanded: bool) -> Option<Record> {
        let probe_type = ap.probe_type();
        match probe_type {
            ProbeType::Fentry | ProbeType::Fexit => {
                let result = match &self.providers.kernel {
                    Some(kernel) => kernel.resolve_args(func, probe_type == ProbeType::Fexit),
                    None => Err(crate::providers::ProviderError::NoTypeInfo(func.to_string())),
                };
                match result {
                    Ok(args) => Some(args),
                    Err(err) if expanded => {
                        warn!(func, %err, "skipping match without argument information");
                        self.warning(format!("fentry:{}: {err}", ap.func), ap.loc);
                        None
                    }
                    Err(err) => {
                        self.error(format!("fentry:{func}: {err}"), ap.loc);
                        None
                    }
                }
            }
            _ => {
                if !self.providers.debug_info.has_target(target) {
                    self.warning(format!("No debuginfo found for {target}"), ap.loc);
                    return None;
                }
                let args = self
                    .providers
                    .debug_info
                    .resolve_args(target, func)
                    .unwrap_or_else(|| Record::with_fields(func, Vec::new()));
                if !expanded && args.fields.len() > MAX_REGISTER_ARGS {
                    self.error(
                        "'args' builtin is not supported for probes with stack-passed arguments.",
                        ap.loc,
                    );
                }
                Some(args)
            }
        }
    }

    /// Loads the probe's arguments into the `struct <probe>_args` record.
    fn resolve_args(&mut self, ast: &Arena) {
        let Some(scope) = self.probe.as_mut() else {
            return;
        };
        if scope.args_resolved {
            return;
        }
        scope.args_resolved = true;
        let probe = scope.id;
        let attach_points = scope.attach_points.clone();
        let typename = ast.probe_args_typename(probe);

        for ap in &attach_points {
            let probe_type = ap.probe_type();
            if !matches!(probe_type, ProbeType::Fentry | ProbeType::Fexit | ProbeType::Uprobe) {
                continue;
            }

            let probe_args = if ap.expansion != ExpansionType::None || ap.has_wildcard() {
                let matches = match self.providers.matcher.get_matches_for_ap(ap) {
                    Ok(matches) => matches,
                    Err(err) => {
                        self.error(err.to_string(), ap.loc);
                        return;
                    }
                };
                let mut shared: Option<Record> = None;
                let mut mixed = false;
                for matched in matches {
                    let concrete = ap.expansion_copy(&matched);
                    let Some(args) =
                        self.args_for_attach_point(ap, &concrete.func, &concrete.target, true)
                    else {
                        continue;
                    };
                    match &shared {
                        None => shared = Some(args),
                        Some(previous) if previous.fields != args.fields => {
                            self.error("Probe has attach points with mixed arguments", ap.loc);
                            mixed = true;
                            break;
                        }
                        Some(_) => {}
                    }
                }
                if mixed {
                    continue;
                }
                shared
            } else {
                self.args_for_attach_point(ap, &ap.func, &ap.target, false)
            };

            let Some(probe_args) = probe_args else {
                continue;
            };
            let record = Record {
                name: typename.clone(),
                ..probe_args
            };
            match self.structs.get(&typename) {
                Some(existing) if existing.fields != record.fields => {
                    self.error("Probe has attach points with mixed arguments", ap.loc);
                }
                _ => self.structs.insert(record),
            }
        }
    }

    fn probe_args(&self, ast: &Arena) -> Option<Record> {
        let scope = self.probe.as_ref()?;
        self.structs
            .get(&ast.probe_args_typename(scope.id))
            .cloned()
    }

    fn assign_type(&mut self, ast: &mut Arena, id: ExprId, mut ty: SizedType) {
        self.complete(&mut ty);
        ast.set_type(id, TypeSource::Fixed(ty));
    }

    /// Type to remember for a map or variable assigned `expr`.
    fn assigned_type(ast: &Arena, expr: ExprId) -> Option<SizedType> {
        ast.resolved_type(expr)
            .or_else(|| arithmetic_fallback(ast, expr))
    }
}

impl Visitor for FieldAnalyser<'_> {
    type Output = ();

    fn visit_probe(&mut self, ast: &mut Arena, id: ProbeId) {
        let attach_points = ast
            .probe(id)
            .attach_points
            .iter()
            .map(|ap| ast.attach_point(*ap).clone())
            .collect();
        self.probe = Some(ProbeScope {
            id,
            attach_points,
            args_resolved: false,
        });
        self.var_types.clear();
        walk_probe(self, ast, id);
        self.probe = None;
    }

    fn visit_subprog(&mut self, ast: &mut Arena, id: SubprogId) {
        self.probe = None;
        self.var_types.clear();
        let subprog = ast.subprog(id).clone();
        if self.registered.insert(id) {
            let params = subprog
                .args
                .iter()
                .map(|arg| Param::new(&arg.name, arg.ty.clone()))
                .collect();
            let added = self.functions.add(Function {
                origin: FunctionOrigin::Script,
                name: subprog.name.clone(),
                return_type: subprog.return_type.clone(),
                params,
                varargs: false,
            });
            if added.is_none() {
                self.error(format!("Function redefined: {}", subprog.name), subprog.loc);
            }
        }
        for arg in &subprog.args {
            let mut ty = arg.ty.clone();
            self.complete(&mut ty);
            self.var_types.insert(arg.name.clone(), ty);
        }
        walk_subprog(self, ast, id);
    }

    fn visit_identifier(&mut self, ast: &mut Arena, id: ExprId) {
        let ident = expect_expr!(ast, id, Identifier).ident;
        match self.lookup_record(&ident) {
            Some(record) => ast.set_type(id, TypeSource::Fixed(SizedType::Record(record))),
            None => {
                self.info.unresolved.insert(ident);
            }
        }
    }

    fn visit_builtin(&mut self, ast: &mut Arena, id: ExprId) {
        let builtin = expect_expr!(ast, id, Builtin);
        let probe_type = self.current_probe_type();
        match builtin.ident.as_str() {
            "ctx" => {
                let Some(scope) = &self.probe else {
                    return;
                };
                let func = scope
                    .attach_points
                    .last()
                    .map(|ap| ap.func.clone())
                    .unwrap_or_default();
                let Some(name) = probe_type.and_then(|ty| context_record(ty, &func)) else {
                    return;
                };
                let record = self.lookup_record(&name).unwrap_or_else(|| Record::named(name));
                self.assign_type(ast, id, SizedType::pointer(SizedType::Record(record)));
            }
            "curtask" => {
                let record = self
                    .lookup_record("struct task_struct")
                    .unwrap_or_else(|| Record::named("struct task_struct"));
                self.assign_type(ast, id, SizedType::pointer(SizedType::Record(record)));
            }
            "args" => {
                if self.probe.is_none() {
                    return;
                }
                self.resolve_args(ast);
                if let Some(args) = self.probe_args(ast) {
                    self.assign_type(ast, id, SizedType::Record(args));
                }
            }
            "retval" => {
                if self.probe.is_none() {
                    return;
                }
                self.resolve_args(ast);
                let from_args = self
                    .probe_args(ast)
                    .and_then(|args| args.field(RETVAL_FIELD).map(|field| field.ty.clone()));
                let ty = from_args.or_else(|| {
                    probe_type
                        .filter(|ty| ty.is_exit())
                        .map(|_| SizedType::uint64())
                });
                if let Some(ty) = ty {
                    self.assign_type(ast, id, ty);
                }
            }
            _ => {
                if let Some(ty) = builtin_type(&builtin, probe_type, self.max_strlen) {
                    ast.set_type(id, TypeSource::Fixed(ty));
                }
            }
        }
    }

    fn visit_map(&mut self, ast: &mut Arena, id: ExprId) {
        walk_map(self, ast, id);
        let map = expect_expr!(ast, id, Map);
        if map.ty == TypeSource::Unset {
            if let Some(ty) = self.map_types.get(&map.ident) {
                ast.set_type(id, TypeSource::Fixed(ty.clone()));
            }
        }
    }

    fn visit_variable(&mut self, ast: &mut Arena, id: ExprId) {
        let var = expect_expr!(ast, id, Variable);
        if var.ty == TypeSource::Unset {
            if let Some(ty) = self.var_types.get(&var.ident) {
                ast.set_type(id, TypeSource::Fixed(ty.clone()));
            }
        }
    }

    fn visit_call(&mut self, ast: &mut Arena, id: ExprId) {
        walk_call(self, ast, id);
        let call = expect_expr!(ast, id, Call);
        let loc = ast[id].loc;
        let arg_types: Option<Vec<SizedType>> =
            call.args.iter().map(|arg| ast.resolved_type(*arg)).collect();
        let Some(arg_types) = arg_types else {
            if !self.functions.contains(&call.func) {
                self.error(format!("Function not found: '{}'", call.func), loc);
            }
            return;
        };
        match self.functions.get(&call.func, &arg_types, loc) {
            Ok(func) => {
                let ty = func.return_type.clone();
                ast.set_type(id, TypeSource::Fixed(ty));
            }
            Err(diagnostics) => self.diagnostics.extend(diagnostics),
        }
    }

    fn visit_cast(&mut self, ast: &mut Arena, id: ExprId) {
        walk_cast(self, ast, id);
        let mut ty = expect_expr!(ast, id, Cast).ty;
        self.complete(&mut ty);
        if let ExprKind::Cast(cast) = &mut ast[id].kind {
            cast.ty = ty;
        }
        ast.types().invalidate();
    }

    fn visit_sizeof(&mut self, ast: &mut Arena, id: ExprId) {
        walk_sizeof(self, ast, id);
        if let SizeofTarget::Type(mut ty) = expect_expr!(ast, id, Sizeof).target {
            self.complete(&mut ty);
            if let ExprKind::Sizeof(sizeof) = &mut ast[id].kind {
                sizeof.target = SizeofTarget::Type(ty);
            }
        }
    }

    fn visit_offsetof(&mut self, ast: &mut Arena, id: ExprId) {
        walk_offsetof(self, ast, id);
        if let SizeofTarget::Type(mut ty) = expect_expr!(ast, id, Offsetof).record {
            self.complete(&mut ty);
            if let ExprKind::Offsetof(offsetof) = &mut ast[id].kind {
                offsetof.record = SizeofTarget::Type(ty);
            }
        }
    }

    fn visit_field_access(&mut self, ast: &mut Arena, id: ExprId) {
        walk_field_access(self, ast, id);
        let access = expect_expr!(ast, id, FieldAccess);
        let Some(base) = ast.resolved_type(access.expr) else {
            return;
        };
        if let Some(record) = base.as_record() {
            if !record.has_field(&access.field) && !self.probe_args_name(ast, &record.name) {
                self.info.unresolved.insert(record.name.clone());
            }
        }
    }

    fn visit_unop(&mut self, ast: &mut Arena, id: ExprId) {
        walk_unop(self, ast, id);
        let unop = expect_expr!(ast, id, Unop);
        if !matches!(unop.op, UnaryOp::Increment | UnaryOp::Decrement) {
            return;
        }
        if let ExprKind::Map(map) = &ast[unop.expr].kind {
            if map.ty == TypeSource::Unset && !self.map_types.contains_key(&map.ident) {
                self.map_types.insert(map.ident.clone(), SizedType::int64());
            }
        }
    }

    fn visit_var_decl(&mut self, ast: &mut Arena, id: StmtId) {
        let decl = expect_stmt!(ast, id, VarDecl);
        if let Some(mut ty) = decl.declared {
            self.complete(&mut ty);
            if let ExprKind::Variable(var) = &ast[decl.var].kind {
                self.var_types.insert(var.ident.clone(), ty.clone());
            }
            ast.set_type(decl.var, TypeSource::Fixed(ty));
        }
        walk_var_decl(self, ast, id);
    }

    fn visit_assign_map(&mut self, ast: &mut Arena, id: StmtId) {
        walk_assign_map(self, ast, id);
        let assign = expect_stmt!(ast, id, AssignMap);
        let map = expect_expr!(ast, assign.map, Map);
        if let Some(key) = map.key {
            if let Some(key_ty) = ast.resolved_type(key) {
                self.map_key_types.entry(map.ident.clone()).or_insert(key_ty);
            }
        }
        if !self.map_types.contains_key(&map.ident) {
            if let Some(ty) = Self::assigned_type(ast, assign.expr) {
                self.map_types.insert(map.ident.clone(), ty);
            }
        }
        if let Some(ty) = self.map_types.get(&map.ident) {
            ast.set_type(assign.map, TypeSource::Fixed(ty.clone()));
        }
    }

    fn visit_assign_var(&mut self, ast: &mut Arena, id: StmtId) {
        walk_assign_var(self, ast, id);
        let assign = expect_stmt!(ast, id, AssignVar);
        let ident = expect_expr!(ast, assign.var, Variable).ident;
        if !self.var_types.contains_key(&ident) {
            if let Some(ty) = Self::assigned_type(ast, assign.expr) {
                self.var_types.insert(ident.clone(), ty);
            }
        }
        if let Some(ty) = self.var_types.get(&ident) {
            ast.set_type(assign.var, TypeSource::Fixed(ty.clone()));
        }
    }

    fn visit_for(&mut self, ast: &mut Arena, id: StmtId) {
        let for_loop = expect_stmt!(ast, id, For);
        if let (ExprKind::Map(map), ExprKind::Variable(var)) =
            (&ast[for_loop.expr].kind, &ast[for_loop.decl].kind)
        {
            let key = self.map_key_types.get(&map.ident).cloned();
            let value = self.map_types.get(&map.ident).cloned();
            if let (Some(key), Some(value)) = (key, value) {
                self.var_types
                    .insert(var.ident.clone(), SizedType::Tuple(vec![key, value]));
            }
        }
        walk_for(self, ast, id);
    }
}

impl FieldAnalyser<'_> {
    fn probe_args_name(&self, ast: &Arena, name: &str) -> bool {
        self.probe
            .as_ref()
            .is_some_and(|scope| ast.probe_args_typename(scope.id) == name)
    }
}

pub fn create_field_analyser_pass() -> Pass {
    Pass::new("FieldAnalyser", |ctx: &mut PassContext| {
        let max_strlen = usize::try_from(ctx.config.get_int(ConfigKeyInt::MaxStrlen))
            .unwrap_or(usize::MAX);
        let max_iterations = ctx.config.get_int(ConfigKeyInt::MaxTypeResIterations);
        ctx.functions.reload_builtins(max_strlen);
        let mut analyser =
            FieldAnalyser::new(&mut ctx.structs, &mut ctx.functions, &ctx.providers, max_strlen);
        analyser.analyse(&mut ctx.ast, max_iterations);
        let (info, diagnostics) = analyser.finish();
        debug!(unresolved = info.unresolved.len(), "field analysis finished");
        let outcome = outcome_from(diagnostics);
        if outcome.ok() {
            ctx.put(info);
        }
        outcome
    })
    .requires::<CDefinitions>()
    .produces::<FieldInfo>()
}
