use crate::{
    config::{Config, ConfigKeyInt},
    language::{
        ast::Arena,
        errors::{success_with, Diagnostics, Outcome},
        functions::FunctionRegistry,
        structs::StructRegistry,
    },
    providers::Providers,
};
use std::{
    any::{type_name, Any, TypeId},
    collections::HashMap,
};
use tracing::{debug, info_span};

/// Identity of a value exchanged between passes.
#[derive(Clone, Copy, Debug)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name.rsplit("::").next().unwrap_or(self.name)
    }
}

fn max_strlen(config: &Config) -> usize {
    usize::try_from(config.get_int(ConfigKeyInt::MaxStrlen)).unwrap_or(usize::MAX)
}

/// State shared by every pass of one compilation.
pub struct PassContext {
    pub ast: Arena,
    pub config: Config,
    pub structs: StructRegistry,
    pub functions: FunctionRegistry,
    pub providers: Providers,
    /// Positional parameters, `$1` first.
    pub params: Vec<String>,
    outputs: HashMap<TypeId, Box<dyn Any>>,
}

impl PassContext {
    pub fn new(ast: Arena) -> Self {
        let config = Config::default();
        Self {
            ast,
            functions: FunctionRegistry::with_builtins(max_strlen(&config)),
            config,
            structs: StructRegistry::new(),
            providers: Providers::default(),
            params: Vec::new(),
            outputs: HashMap::new(),
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.functions.reload_builtins(max_strlen(&config));
        self.config = config;
        self
    }

    pub fn with_providers(mut self, providers: Providers) -> Self {
        self.providers = providers;
        self
    }

    pub fn with_params(mut self, params: Vec<String>) -> Self {
        self.params = params;
        self
    }

    /// Value of `$index` (1-based), if one was supplied.
    pub fn param(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|idx| self.params.get(idx))
            .map(String::as_str)
    }

    pub fn put<T: Any>(&mut self, value: T) {
        self.outputs.insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn has<T: Any>(&self) -> bool {
        self.outputs.contains_key(&TypeId::of::<T>())
    }

    pub fn try_get<T: Any>(&self) -> Option<&T> {
        self.outputs
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref())
    }

    /// Output of an earlier pass. Asking for a value nobody produced is a
    /// wiring bug.
    pub fn get<T: Any>(&self) -> &T {
        match self.try_get() {
            Some(value) => value,
            None => panic!(
                "BUG: get<{}> failed; no object available.",
                TypeKey::of::<T>().name()
            ),
        }
    }

    pub fn take<T: Any>(&mut self) -> Option<T> {
        self.outputs
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast().ok())
            .map(|value| *value)
    }
}

type PassFn = Box<dyn FnMut(&mut PassContext) -> Outcome>;

pub struct Pass {
    name: String,
    inputs: Vec<TypeKey>,
    outputs: Vec<TypeKey>,
    run: PassFn,
}

impl Pass {
    pub fn new(name: &str, run: impl FnMut(&mut PassContext) -> Outcome + 'static) -> Self {
        Self {
            name: name.to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            run: Box::new(run),
        }
    }

    /// Declares that the pass reads a `T` produced earlier.
    pub fn requires<T: Any>(mut self) -> Self {
        self.inputs.push(TypeKey::of::<T>());
        self
    }

    /// Declares that the pass stores a `T` in the context.
    pub fn produces<T: Any>(mut self) -> Self {
        self.outputs.push(TypeKey::of::<T>());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &[TypeKey] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TypeKey] {
        &self.outputs
    }

    pub fn run(&mut self, ctx: &mut PassContext) -> Outcome {
        (self.run)(ctx)
    }
}

/// Ordered pipeline of passes with checked producer/consumer wiring.
#[derive(Default)]
pub struct PassManager {
    passes: Vec<Pass>,
    producers: HashMap<TypeId, usize>,
}

impl PassManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, pass: Pass) -> &mut Self {
        for input in pass.inputs() {
            if !self.producers.contains_key(&input.id) {
                panic!(
                    "BUG: Pass {} requires output {}, which is not available.",
                    pass.name(),
                    input.name()
                );
            }
        }
        let pass_id = self.passes.len();
        for output in pass.outputs() {
            if let Some(original) = self.producers.get(&output.id) {
                panic!(
                    "BUG: Pass {} attempting to register output {}, which is already registered by pass {}.",
                    pass.name(),
                    output.name(),
                    self.passes[*original].name()
                );
            }
            self.producers.insert(output.id, pass_id);
        }
        self.passes.push(pass);
        self
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.passes.iter().map(Pass::name)
    }

    /// Runs `f` on every pass in registration order. Stops at the first
    /// failure, which is returned with the warnings of the passes before it.
    pub fn foreach(&mut self, mut f: impl FnMut(&mut Pass) -> Outcome) -> Outcome {
        let mut warnings = Diagnostics::new();
        for pass in &mut self.passes {
            let (result, own_warnings) = f(pass).into_parts();
            warnings.extend(own_warnings);
            if let Err(errors) = result {
                return Outcome::failures(errors, warnings);
            }
        }
        success_with(warnings)
    }

    /// Runs the whole pipeline against `ctx`.
    pub fn run(&mut self, ctx: &mut PassContext) -> Outcome {
        self.foreach(|pass| {
            let span = info_span!("pass", name = %pass.name());
            let _enter = span.enter();
            let outcome = pass.run(ctx);
            if outcome.ok() {
                for output in pass.outputs() {
                    if !ctx.outputs.contains_key(&output.id) {
                        panic!(
                            "BUG: Pass {} did not produce {}",
                            pass.name(),
                            output.name()
                        );
                    }
                }
            }
            debug!(
                ok = outcome.ok(),
                errors = outcome.errors().len(),
                warnings = outcome.warnings().len(),
                "pass finished"
            );
            outcome
        })
    }
}
