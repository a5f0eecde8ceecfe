use super::{Pass, PassContext};
use crate::{
    config::{Config, ConfigError, ConfigKey, ConfigSetter, ConfigSource, ConfigValue},
    language::{
        ast::*,
        errors::{outcome_from, Diagnostic, Diagnostics},
        span::Location,
        types::StackModeKind,
        visit::{expect_stmt, visit, walk_assign_config_var, Visitor},
    },
};
use tracing::debug;

/// Literal value of a config assignment, before it is checked against the
/// key.
enum Literal {
    Integer(i64),
    String(String),
    StackMode(String),
    Positional(PositionalParameter),
}

/// Applies the assignments of the `config = { ... }` block to a [`Config`].
pub struct ConfigAnalyser<'a> {
    config: &'a mut Config,
    params: &'a [String],
    diagnostics: Diagnostics,
}

impl<'a> ConfigAnalyser<'a> {
    pub fn new(config: &'a mut Config, params: &'a [String]) -> Self {
        Self {
            config,
            params,
            diagnostics: Vec::new(),
        }
    }

    pub fn into_diagnostics(self) -> Diagnostics {
        self.diagnostics
    }

    fn error(&mut self, message: String, loc: Location) {
        self.diagnostics.push(Diagnostic::error(message).at(loc));
    }

    fn type_error(&mut self, name: &str, found: &str, expected: &str, loc: Location) {
        self.error(
            format!("Invalid type for {name}. Type: {found}. Expected Type: {expected}"),
            loc,
        );
    }

    fn param_value(&self, param: PositionalParameter) -> String {
        match param {
            PositionalParameter::Param(n) => n
                .checked_sub(1)
                .and_then(|idx| self.params.get(idx))
                .cloned()
                .unwrap_or_default(),
            PositionalParameter::Count => self.params.len().to_string(),
        }
    }

    /// Numeric reading of a literal; failures are reported here.
    fn as_integer(&mut self, name: &str, literal: &Literal, loc: Location) -> Option<i64> {
        match literal {
            Literal::Integer(value) => Some(*value),
            Literal::Positional(param) => {
                let raw = self.param_value(*param);
                if raw.is_empty() {
                    return Some(0);
                }
                match raw.parse::<i64>() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        let PositionalParameter::Param(n) = param else {
                            panic!("BUG: $# is always numeric");
                        };
                        self.error(format!("${n} used numerically but given \"{raw}\""), loc);
                        None
                    }
                }
            }
            Literal::String(_) => {
                self.type_error(name, "string", "integer", loc);
                None
            }
            Literal::StackMode(_) => {
                self.type_error(name, "stack_mode", "integer", loc);
                None
            }
        }
    }

    fn as_string(&mut self, name: &str, literal: &Literal, loc: Location) -> Option<String> {
        match literal {
            Literal::String(value) => Some(value.clone()),
            Literal::Positional(param) => Some(self.param_value(*param)),
            Literal::Integer(_) => {
                self.type_error(name, "integer", "string", loc);
                None
            }
            Literal::StackMode(_) => {
                self.type_error(name, "stack_mode", "string", loc);
                None
            }
        }
    }

    fn record(&mut self, result: Result<(), ConfigError>, loc: Location) {
        match result {
            Ok(()) => {}
            Err(err @ ConfigError::SetByEnv { .. }) => {
                self.diagnostics.push(Diagnostic::warning(err.to_string()).at(loc));
            }
            Err(err) => self.error(err.to_string(), loc),
        }
    }

    fn apply(&mut self, name: &str, key: ConfigKey, literal: Literal, loc: Location) {
        let result = match key {
            ConfigKey::Bool(_) => {
                let Some(value) = self.as_integer(name, &literal, loc) else {
                    return;
                };
                let flag = match value {
                    0 => false,
                    1 => true,
                    _ => {
                        self.error(
                            format!("Invalid value for {name}. Needs to be 0 or 1. Value: {value}"),
                            loc,
                        );
                        return;
                    }
                };
                ConfigSetter::new(&mut *self.config, ConfigSource::Script)
                    .set(key, ConfigValue::Bool(flag))
            }
            ConfigKey::Int(_) => {
                let Some(value) = self.as_integer(name, &literal, loc) else {
                    return;
                };
                let Ok(value) = u64::try_from(value) else {
                    self.error(
                        format!("Invalid value for {name}. Needs to be non-negative. Value: {value}"),
                        loc,
                    );
                    return;
                };
                ConfigSetter::new(&mut *self.config, ConfigSource::Script)
                    .set(key, ConfigValue::Int(value))
            }
            ConfigKey::String(_) => {
                let Some(value) = self.as_string(name, &literal, loc) else {
                    return;
                };
                ConfigSetter::new(&mut *self.config, ConfigSource::Script)
                    .set(key, ConfigValue::String(value))
            }
            ConfigKey::StackMode => {
                let Literal::StackMode(mode) = &literal else {
                    let found = match literal {
                        Literal::String(_) => "string",
                        _ => "integer",
                    };
                    self.type_error(name, found, "stack_mode", loc);
                    return;
                };
                let Some(mode) = StackModeKind::parse(mode) else {
                    self.error(format!("Unknown stack mode: '{mode}'"), loc);
                    return;
                };
                ConfigSetter::new(&mut *self.config, ConfigSource::Script)
                    .set(key, ConfigValue::StackMode(mode))
            }
            ConfigKey::UserSymbolCacheType | ConfigKey::SymbolSource | ConfigKey::MissingProbes => {
                let Some(value) = self.as_string(name, &literal, loc) else {
                    return;
                };
                let mut setter = ConfigSetter::new(&mut *self.config, ConfigSource::Script);
                match key {
                    ConfigKey::UserSymbolCacheType => setter.set_user_symbol_cache_type(&value),
                    ConfigKey::SymbolSource => setter.set_symbol_source(&value),
                    _ => setter.set_missing_probes(&value),
                }
            }
        };
        self.record(result, loc);
    }
}

impl Visitor for ConfigAnalyser<'_> {
    type Output = ();

    fn visit_assign_config_var(&mut self, ast: &mut Arena, id: StmtId) {
        walk_assign_config_var(self, ast, id);
        let assign = expect_stmt!(ast, id, AssignConfigVar);
        let loc = ast[id].loc;
        let name = assign.config_var;

        let key = match Config::get_config_key(&name) {
            Ok(key) => key,
            Err(err) => {
                self.error(err.to_string(), loc);
                return;
            }
        };

        let literal = match &ast[assign.expr].kind {
            ExprKind::Integer(lit) => Literal::Integer(lit.value),
            ExprKind::String(lit) => Literal::String(lit.value.clone()),
            ExprKind::StackMode(lit) => Literal::StackMode(lit.mode.clone()),
            ExprKind::PositionalParameter(param) => Literal::Positional(*param),
            _ => {
                self.error(format!("Assignment for {name} must be literal."), loc);
                return;
            }
        };
        debug!(key = %key, "config assignment");
        self.apply(&name, key, literal, loc);
    }
}

pub fn create_config_pass() -> Pass {
    Pass::new("ConfigAnalyser", |ctx: &mut PassContext| {
        let mut analyser = ConfigAnalyser::new(&mut ctx.config, &ctx.params);
        visit(&mut analyser, &mut ctx.ast);
        outcome_from(analyser.into_diagnostics())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigKeyBool, ConfigKeyInt, ConfigKeyString, MissingProbes};

    fn loc() -> Location {
        Location::line(1, 1, 10)
    }

    fn with_config(build: impl FnOnce(&mut Arena) -> Vec<StmtId>) -> Arena {
        let mut ast = Arena::new();
        let stmts = build(&mut ast);
        let config = ast.config_block(stmts, loc());
        ast.set_root(Program {
            config: Some(config),
            ..Program::default()
        });
        ast
    }

    fn analyse(ast: &mut Arena, config: &mut Config, params: &[String]) -> Vec<String> {
        let mut analyser = ConfigAnalyser::new(config, params);
        visit(&mut analyser, ast);
        analyser
            .into_diagnostics()
            .into_iter()
            .map(|d| d.to_string())
            .collect()
    }

    #[test]
    fn applies_valid_assignments() {
        let mut ast = with_config(|ast| {
            let strlen = ast.integer(128, loc());
            let demangle = ast.integer(0, loc());
            let trailer = ast.string("~", loc());
            let missing = ast.string("error", loc());
            let mode = ast.stack_mode("perf", loc());
            vec![
                ast.assign_config("max_strlen", strlen, loc()),
                ast.assign_config("BPFTRACE_CPP_DEMANGLE", demangle, loc()),
                ast.assign_config("str_trunc_trailer", trailer, loc()),
                ast.assign_config("missing_probes", missing, loc()),
                ast.assign_config("stack_mode", mode, loc()),
            ]
        });
        let mut config = Config::default();
        assert!(analyse(&mut ast, &mut config, &[]).is_empty());
        assert_eq!(config.get_int(ConfigKeyInt::MaxStrlen), 128);
        assert!(!config.get_bool(ConfigKeyBool::CppDemangle));
        assert_eq!(config.get_string(ConfigKeyString::StrTruncTrailer), "~");
        assert_eq!(config.missing_probes(), MissingProbes::Error);
        assert_eq!(config.stack_mode(), StackModeKind::Perf);
        assert_eq!(
            config.source(ConfigKey::Int(ConfigKeyInt::MaxStrlen)),
            ConfigSource::Script
        );
    }

    #[test]
    fn reports_every_bad_assignment() {
        let mut ast = with_config(|ast| {
            let one = ast.integer(1, loc());
            let two = ast.integer(2, loc());
            let sum = ast.binop(one, BinaryOp::Plus, two, loc());
            let five = ast.integer(5, loc());
            let text = ast.string("many", loc());
            let other = ast.integer(1, loc());
            vec![
                ast.assign_config("max_strlen", sum, loc()),
                ast.assign_config("probe_inline", five, loc()),
                ast.assign_config("max_map_keys", text, loc()),
                ast.assign_config("no_such_key", other, loc()),
            ]
        });
        let mut config = Config::default();
        let messages = analyse(&mut ast, &mut config, &[]);
        assert_eq!(
            messages,
            vec![
                "1:1-10: ERROR: Assignment for max_strlen must be literal.",
                "1:1-10: ERROR: Invalid value for probe_inline. Needs to be 0 or 1. Value: 5",
                "1:1-10: ERROR: Invalid type for max_map_keys. Type: string. Expected Type: integer",
                "1:1-10: ERROR: Unrecognized config variable: no_such_key",
            ]
        );
        assert_eq!(config.get_int(ConfigKeyInt::MaxStrlen), 64);
    }

    #[test]
    fn positional_parameters_are_resolved() {
        let params = vec!["256".to_string(), "abc".to_string()];
        let mut ast = with_config(|ast| {
            let first = ast.positional(1, loc());
            let second = ast.positional(2, loc());
            let trailer = ast.positional(2, loc());
            vec![
                ast.assign_config("max_strlen", first, loc()),
                ast.assign_config("max_probes", second, loc()),
                ast.assign_config("str_trunc_trailer", trailer, loc()),
            ]
        });
        let mut config = Config::default();
        let messages = analyse(&mut ast, &mut config, &params);
        assert_eq!(
            messages,
            vec!["1:1-10: ERROR: $2 used numerically but given \"abc\""]
        );
        assert_eq!(config.get_int(ConfigKeyInt::MaxStrlen), 256);
        assert_eq!(config.get_string(ConfigKeyString::StrTruncTrailer), "abc");
    }

    #[test]
    fn environment_wins_over_script() {
        let mut config = Config::default();
        config.load_env([("BPFTRACE_MAX_PROBES", "10")]);
        let mut ast = with_config(|ast| {
            let value = ast.integer(20, loc());
            vec![ast.assign_config("max_probes", value, loc())]
        });
        let mut analyser = ConfigAnalyser::new(&mut config, &[]);
        visit(&mut analyser, &mut ast);
        let outcome = outcome_from(analyser.into_diagnostics());
        assert!(outcome.ok());
        assert_eq!(outcome.warnings().len(), 1);
        assert_eq!(config.get_int(ConfigKeyInt::MaxProbes), 10);
    }

    #[test]
    fn enumerated_values_are_checked() {
        let mut ast = with_config(|ast| {
            let value = ast.string("sometimes", loc());
            vec![ast.assign_config("cache_user_symbols", value, loc())]
        });
        let mut config = Config::default();
        let messages = analyse(&mut ast, &mut config, &[]);
        assert_eq!(
            messages,
            vec!["1:1-10: ERROR: Invalid value for cache_user_symbols: valid values are PER_PID, PER_PROGRAM, NONE"]
        );
    }
}
