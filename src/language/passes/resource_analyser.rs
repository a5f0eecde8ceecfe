//! Collects what the generated program needs at runtime: maps with their key
//! and value shapes, the argument layouts of asynchronous print calls, symbol
//! tables and scratch buffers for values too large for the stack.

use super::{field_analyser::FieldInfo, Pass, PassContext};
use crate::{
    config::{ConfigKeyInt, UserSymbolCacheType},
    language::{
        ast::*,
        errors::{outcome_from, Diagnostic, Diagnostics},
        span::Location,
        types::SizedType,
        visit::{
            expect_expr, expect_stmt, visit, walk_assign_var, walk_call, walk_map, walk_probe,
            walk_subprog, walk_tuple, walk_var_decl, Visitor,
        },
    },
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Hard size of the BPF stack.
pub const BPF_STACK_SIZE: usize = 512;

const DEFAULT_TIME_FORMAT: &str = "%H:%M:%S\n";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapInfo {
    /// Position of the map's first use in the program.
    pub id: usize,
    pub key: Option<SizedType>,
    pub value: SizedType,
}

/// Format string and argument types of one asynchronous print call.
pub type FormatArgs = (String, Vec<SizedType>);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequiredResources {
    pub maps: BTreeMap<String, MapInfo>,
    pub printf_args: Vec<FormatArgs>,
    pub system_args: Vec<FormatArgs>,
    pub cat_args: Vec<FormatArgs>,
    pub non_map_print_args: Vec<SizedType>,
    pub time_args: Vec<String>,
    pub needs_elapsed_map: bool,
    pub needs_join_map: bool,
    pub probes_using_usym: BTreeSet<String>,
    pub max_tuple_size: usize,
    pub max_map_key_size: usize,
    pub variables_on_scratch: bool,
    pub map_keys_on_scratch: bool,
    pub tuples_on_scratch: bool,
}

impl RequiredResources {
    pub fn needs_usym_tables(&self) -> bool {
        !self.probes_using_usym.is_empty()
    }
}

/// A map seen so far. The value type stays `None` until some use of the map
/// resolves.
struct PendingMap {
    id: usize,
    key: Option<SizedType>,
    value: Option<SizedType>,
    first_use: Location,
}

pub struct ResourceAnalyser {
    on_stack_limit: usize,
    cache_user_symbols: UserSymbolCacheType,
    probe: Option<ProbeId>,
    maps: BTreeMap<String, PendingMap>,
    resources: RequiredResources,
    diagnostics: Diagnostics,
}

impl ResourceAnalyser {
    pub fn new(on_stack_limit: usize, cache_user_symbols: UserSymbolCacheType) -> Self {
        Self {
            on_stack_limit,
            cache_user_symbols,
            probe: None,
            maps: BTreeMap::new(),
            resources: RequiredResources::default(),
            diagnostics: Vec::new(),
        }
    }

    pub fn analyse(mut self, ast: &mut Arena) -> (RequiredResources, Diagnostics) {
        ast.assign_indices();
        visit(&mut self, ast);

        let mut resources = self.resources;
        for (name, map) in self.maps {
            match map.value {
                Some(value) => {
                    resources.maps.insert(
                        name,
                        MapInfo {
                            id: map.id,
                            key: map.key,
                            value,
                        },
                    );
                }
                None => self.diagnostics.push(
                    Diagnostic::error(format!("Undefined map or unresolved value type: {name}"))
                        .at(map.first_use),
                ),
            }
        }
        (resources, self.diagnostics)
    }

    fn error(&mut self, message: String, loc: Location) {
        self.diagnostics.push(Diagnostic::error(message).at(loc));
    }

    /// Whether a value of `size` bytes can live on the stack; sets `scratch`
    /// otherwise.
    fn place(&mut self, size: usize, loc: Location, scratch: fn(&mut RequiredResources)) {
        if size > self.on_stack_limit {
            scratch(&mut self.resources);
        } else if size > BPF_STACK_SIZE {
            self.error(
                format!("Value of {size} bytes exceeds the BPF stack of {BPF_STACK_SIZE} bytes"),
                loc,
            );
        }
    }

    fn uses_usym(&mut self, ast: &Arena) {
        if self.cache_user_symbols == UserSymbolCacheType::None {
            return;
        }
        if let Some(probe) = self.probe {
            self.resources
                .probes_using_usym
                .insert(ast.probe_name(probe));
        }
    }

    fn in_userspace_probe(&self, ast: &Arena) -> bool {
        self.probe.is_some_and(|probe| {
            [ProbeType::Uprobe, ProbeType::Uretprobe, ProbeType::Usdt]
                .into_iter()
                .any(|probe_type| ast.probe_has_type(probe, probe_type))
        })
    }

    fn update_map_info(&mut self, ast: &Arena, id: ExprId) {
        let map = expect_expr!(ast, id, Map);
        let loc = ast[id].loc;
        let key = map.key.and_then(|key| ast.resolved_type(key));
        let value = ast.resolved_type(id);

        if let Some(key) = &key {
            let size = key.size();
            self.resources.max_map_key_size = self.resources.max_map_key_size.max(size);
            if size > self.on_stack_limit {
                self.resources.map_keys_on_scratch = true;
            }
        }

        let next_id = self.maps.len();
        let entry = self.maps.entry(map.ident.clone()).or_insert(PendingMap {
            id: next_id,
            key: None,
            value: None,
            first_use: loc,
        });
        if entry.value.is_none() {
            entry.value = value;
        }
        let Some(key) = key else {
            return;
        };
        let mismatch = match entry.key.clone() {
            None => {
                entry.key = Some(key);
                None
            }
            Some(known) if key.fits_into(&known) => None,
            Some(known) if known.fits_into(&key) => {
                entry.key = Some(key);
                None
            }
            Some(known) => Some(format!(
                "Argument mismatch for {}: trying to access with arguments: [{key}] when map expects arguments: [{known}]",
                map.ident
            )),
        };
        if let Some(message) = mismatch {
            self.error(message, loc);
        }
    }

    /// Records the argument types of `printf`, `system` or `cat`.
    fn format_args(&mut self, ast: &Arena, call: &Call, loc: Location) -> Option<FormatArgs> {
        let Some((format, args)) = call.args.split_first() else {
            self.error(format!("{}() requires at least one argument", call.func), loc);
            return None;
        };
        let Some(format) = ast[*format].as_string().map(str::to_string) else {
            self.error(
                format!("{}() expects a string literal as the first argument", call.func),
                loc,
            );
            return None;
        };
        let mut types = Vec::with_capacity(args.len());
        for (idx, arg) in args.iter().enumerate() {
            match ast.type_of(*arg).into_result() {
                Ok(ty) => types.push(ty),
                Err(err) => {
                    self.error(
                        format!("{}() argument {} has an unresolved type: {err}", call.func, idx + 1),
                        ast[*arg].loc,
                    );
                    return None;
                }
            }
        }
        Some((format, types))
    }
}

impl Visitor for ResourceAnalyser {
    type Output = ();

    fn visit_probe(&mut self, ast: &mut Arena, id: ProbeId) {
        self.probe = Some(id);
        walk_probe(self, ast, id);
        self.probe = None;
    }

    fn visit_subprog(&mut self, ast: &mut Arena, id: SubprogId) {
        self.probe = None;
        walk_subprog(self, ast, id);
    }

    fn visit_builtin(&mut self, ast: &mut Arena, id: ExprId) {
        let builtin = expect_expr!(ast, id, Builtin);
        match builtin.ident.as_str() {
            "elapsed" => self.resources.needs_elapsed_map = true,
            "ustack" => self.uses_usym(ast),
            "func" if self.in_userspace_probe(ast) => self.uses_usym(ast),
            _ => {}
        }
    }

    fn visit_call(&mut self, ast: &mut Arena, id: ExprId) {
        walk_call(self, ast, id);
        let call = expect_expr!(ast, id, Call);
        let loc = ast[id].loc;
        match call.func.as_str() {
            "printf" => {
                if let Some(args) = self.format_args(ast, &call, loc) {
                    self.resources.printf_args.push(args);
                }
            }
            "system" => {
                if let Some(args) = self.format_args(ast, &call, loc) {
                    self.resources.system_args.push(args);
                }
            }
            "cat" => {
                if let Some(args) = self.format_args(ast, &call, loc) {
                    self.resources.cat_args.push(args);
                }
            }
            "print" => {
                let Some(arg) = call.args.first() else {
                    return;
                };
                if ast[*arg].as_map().is_some() {
                    return;
                }
                match ast.type_of(*arg).into_result() {
                    Ok(ty) => self.resources.non_map_print_args.push(ty),
                    Err(err) => self.error(
                        format!("print() argument has an unresolved type: {err}"),
                        ast[*arg].loc,
                    ),
                }
            }
            "time" => {
                let format = call
                    .args
                    .first()
                    .and_then(|arg| ast[*arg].as_string())
                    .unwrap_or(DEFAULT_TIME_FORMAT);
                self.resources.time_args.push(format.to_string());
            }
            "join" => self.resources.needs_join_map = true,
            "usym" => self.uses_usym(ast),
            _ => {}
        }
    }

    fn visit_map(&mut self, ast: &mut Arena, id: ExprId) {
        walk_map(self, ast, id);
        self.update_map_info(ast, id);
    }

    fn visit_tuple(&mut self, ast: &mut Arena, id: ExprId) {
        walk_tuple(self, ast, id);
        if let Some(ty) = ast.resolved_type(id) {
            let size = ty.size();
            self.resources.max_tuple_size = self.resources.max_tuple_size.max(size);
            self.place(size, ast[id].loc, |resources| resources.tuples_on_scratch = true);
        }
    }

    fn visit_assign_var(&mut self, ast: &mut Arena, id: StmtId) {
        walk_assign_var(self, ast, id);
        let assign = expect_stmt!(ast, id, AssignVar);
        if let Some(ty) = ast.resolved_type(assign.var) {
            self.place(ty.size(), ast[id].loc, |resources| {
                resources.variables_on_scratch = true
            });
        }
    }

    fn visit_var_decl(&mut self, ast: &mut Arena, id: StmtId) {
        walk_var_decl(self, ast, id);
        let decl = expect_stmt!(ast, id, VarDecl);
        if let Some(ty) = decl.declared {
            self.place(ty.size(), ast[id].loc, |resources| {
                resources.variables_on_scratch = true
            });
        }
    }
}

pub fn create_resource_pass() -> Pass {
    Pass::new("ResourceAnalyser", |ctx: &mut PassContext| {
        let on_stack_limit = usize::try_from(ctx.config.get_int(ConfigKeyInt::OnStackLimit))
            .unwrap_or(usize::MAX);
        let analyser = ResourceAnalyser::new(on_stack_limit, ctx.config.user_symbol_cache_type());
        let (resources, diagnostics) = analyser.analyse(&mut ctx.ast);
        debug!(
            maps = resources.maps.len(),
            printf = resources.printf_args.len(),
            "resources collected"
        );
        let outcome = outcome_from(diagnostics);
        if outcome.ok() {
            ctx.put(resources);
        }
        outcome
    })
    .requires::<FieldInfo>()
    .produces::<RequiredResources>()
}

#[cfg(test)]
mod tests;
