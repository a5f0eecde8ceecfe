use crate::language::{
    errors::{Diagnostic, Diagnostics},
    span::Location,
    types::{AggregateKind, SizedType},
};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FunctionOrigin {
    Builtin,
    Script,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    /// `SizedType::None` marks a generic parameter (builtins only).
    pub ty: SizedType,
}

impl Param {
    pub fn new(name: &str, ty: SizedType) -> Self {
        Self {
            name: name.to_string(),
            ty,
        }
    }

    pub fn generic(name: &str) -> Self {
        Self::new(name, SizedType::None)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Function {
    pub origin: FunctionOrigin,
    pub name: String,
    pub return_type: SizedType,
    pub params: Vec<Param>,
    pub varargs: bool,
}

impl Function {
    pub fn is_builtin(&self) -> bool {
        self.origin == FunctionOrigin::Builtin
    }

    fn signature(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|param| {
                if param.ty.is_none() {
                    "T".to_string()
                } else {
                    param.ty.to_string()
                }
            })
            .collect();
        format!("{}({})", self.name, params.join(", "))
    }
}

fn can_implicit_cast(from: &SizedType, to: &SizedType) -> bool {
    if from.fits_into(to) {
        return true;
    }
    match (from, to) {
        // string to int8* / uint8*
        (SizedType::String { .. }, SizedType::Pointer(pointee)) => {
            pointee.is_integer() && pointee.size() == 1
        }
        (SizedType::String { .. }, SizedType::String { .. }) => true,
        _ => false,
    }
}

fn arg_types_str(arg_types: &[SizedType]) -> String {
    let rendered: Vec<String> = arg_types.iter().map(ToString::to_string).collect();
    format!("({})", rendered.join(", "))
}

/// Builtin and script-defined function signatures. Script functions fully
/// shadow builtins of the same name.
#[derive(Clone, Debug, Default)]
pub struct FunctionRegistry {
    by_name: HashMap<String, Vec<Function>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the builtin function signatures. `max_strlen`
    /// sizes the strings produced by `str()`.
    pub fn with_builtins(max_strlen: usize) -> Self {
        let mut registry = Self::new();
        registry.reload_builtins(max_strlen);
        registry
    }

    /// Replaces every builtin signature with one sized for `max_strlen`.
    /// Script functions are kept and still shadow builtins.
    pub fn reload_builtins(&mut self, max_strlen: usize) {
        let scripted: Vec<Function> = self
            .by_name
            .drain()
            .flat_map(|(_, funcs)| funcs)
            .filter(|func| !func.is_builtin())
            .collect();
        for func in builtin_functions(max_strlen).into_iter().chain(scripted) {
            self.add(func);
        }
    }
}

fn builtin_functions(max_strlen: usize) -> Vec<Function> {
    let generic = |name: &str| Param::generic(name);
    let string = || SizedType::string(max_strlen);
    let signed_agg = |kind: fn(bool) -> AggregateKind| SizedType::Aggregate(kind(true));

    let builtins: Vec<(&str, SizedType, Vec<Param>, bool)> = vec![
        ("printf", SizedType::Void, vec![Param::new("fmt", string())], true),
        ("system", SizedType::Void, vec![Param::new("cmd", string())], true),
        ("cat", SizedType::Void, vec![Param::new("path", string())], true),
        ("print", SizedType::Void, vec![generic("value")], true),
        ("time", SizedType::Void, vec![], true),
        ("exit", SizedType::Void, vec![], true),
        ("str", string(), vec![generic("value")], true),
        ("buf", SizedType::Buffer { size: 64 }, vec![generic("value")], true),
        ("path", string(), vec![generic("value")], true),
        ("ntop", SizedType::Inet { size: 16 }, vec![generic("addr")], true),
        ("ksym", SizedType::Ksym, vec![generic("addr")], false),
        ("usym", SizedType::Usym, vec![generic("addr")], false),
        ("kaddr", SizedType::uint64(), vec![Param::new("name", string())], false),
        ("uaddr", SizedType::uint64(), vec![Param::new("name", string())], false),
        ("cgroupid", SizedType::uint64(), vec![Param::new("path", string())], false),
        ("reg", SizedType::uint64(), vec![Param::new("name", string())], false),
        ("kstack", SizedType::uint64(), vec![], true),
        ("ustack", SizedType::uint64(), vec![], true),
        ("strftime", SizedType::Timestamp, vec![Param::new("fmt", string()), generic("ns")], false),
        ("strncmp", SizedType::int64(), vec![generic("a"), generic("b"), generic("n")], false),
        ("strcontains", SizedType::int64(), vec![generic("haystack"), generic("needle")], false),
        ("len", SizedType::int64(), vec![generic("map")], false),
        ("join", SizedType::Void, vec![generic("array")], true),
        ("signal", SizedType::Void, vec![generic("sig")], false),
        ("override", SizedType::Void, vec![generic("rc")], false),
        ("delete", SizedType::Void, vec![generic("map")], true),
        ("clear", SizedType::Void, vec![generic("map")], false),
        ("zero", SizedType::Void, vec![generic("map")], false),
        ("count", SizedType::Aggregate(AggregateKind::Count), vec![], false),
        ("sum", signed_agg(|signed| AggregateKind::Sum { signed }), vec![generic("n")], false),
        ("min", signed_agg(|signed| AggregateKind::Min { signed }), vec![generic("n")], false),
        ("max", signed_agg(|signed| AggregateKind::Max { signed }), vec![generic("n")], false),
        ("avg", signed_agg(|signed| AggregateKind::Avg { signed }), vec![generic("n")], false),
        ("stats", signed_agg(|signed| AggregateKind::Stats { signed }), vec![generic("n")], false),
        ("hist", SizedType::Aggregate(AggregateKind::Hist), vec![generic("n")], true),
        (
            "lhist",
            SizedType::Aggregate(AggregateKind::Lhist),
            vec![generic("n"), generic("min"), generic("max"), generic("step")],
            false,
        ),
    ];
    builtins
        .into_iter()
        .map(|(name, return_type, params, varargs)| Function {
            origin: FunctionOrigin::Builtin,
            name: name.to_string(),
            return_type,
            params,
            varargs,
        })
        .collect()
}

impl FunctionRegistry {

    /// Registers `func`. Builtins may be overloaded; a second script
    /// definition of the same name is refused and `None` returned.
    pub fn add(&mut self, func: Function) -> Option<&Function> {
        let entry = self.by_name.entry(func.name.clone()).or_default();
        if entry.iter().any(|existing| !existing.is_builtin()) {
            return None;
        }
        entry.push(func);
        entry.last()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Finds the function `name` callable with `arg_types`. Script functions
    /// are searched first; a failed match returns an error followed by one
    /// hint per considered candidate.
    pub fn get(
        &self,
        name: &str,
        arg_types: &[SizedType],
        loc: Location,
    ) -> Result<&Function, Diagnostics> {
        let Some(candidates) = self.by_name.get(name) else {
            return Err(vec![
                Diagnostic::error(format!("Function not found: '{name}'")).at(loc)
            ]);
        };

        let mut considered = Vec::new();
        for candidate in candidates.iter().rev() {
            considered.push(candidate);
            let params = &candidate.params;
            let arity_ok = params.len() == arg_types.len()
                || (candidate.varargs && arg_types.len() >= params.len());
            let valid = arity_ok
                && params.iter().zip(arg_types).all(|(param, arg)| {
                    (candidate.is_builtin() && param.ty.is_none())
                        || can_implicit_cast(arg, &param.ty)
                });
            if valid {
                return Ok(candidate);
            }
            if !candidate.is_builtin() {
                break;
            }
        }

        let mut diagnostics = vec![Diagnostic::error(format!(
            "Cannot call function '{name}' using argument types: {}",
            arg_types_str(arg_types)
        ))
        .at(loc)];
        diagnostics.extend(considered.into_iter().map(|func| {
            Diagnostic::hint(format!("Candidate function:\n  {}", func.signature()))
        }));
        Err(diagnostics)
    }
}
