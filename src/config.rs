use crate::language::types::StackModeKind;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConfigKeyBool {
    CppDemangle,
    LazySymbolication,
    ProbeInline,
    PrintMapsOnExit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConfigKeyInt {
    LogSize,
    MaxBpfProgs,
    MaxCatBytes,
    MaxMapKeys,
    MaxProbes,
    MaxStrlen,
    MaxTypeResIterations,
    OnStackLimit,
    PerfRbPages,
    MaxAstNodes,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConfigKeyString {
    StrTruncTrailer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    Bool(ConfigKeyBool),
    Int(ConfigKeyInt),
    String(ConfigKeyString),
    StackMode,
    UserSymbolCacheType,
    SymbolSource,
    MissingProbes,
}

const KEYS: &[(&str, ConfigKey)] = &[
    ("cpp_demangle", ConfigKey::Bool(ConfigKeyBool::CppDemangle)),
    ("lazy_symbolication", ConfigKey::Bool(ConfigKeyBool::LazySymbolication)),
    ("probe_inline", ConfigKey::Bool(ConfigKeyBool::ProbeInline)),
    ("print_maps_on_exit", ConfigKey::Bool(ConfigKeyBool::PrintMapsOnExit)),
    ("log_size", ConfigKey::Int(ConfigKeyInt::LogSize)),
    ("max_bpf_progs", ConfigKey::Int(ConfigKeyInt::MaxBpfProgs)),
    ("max_cat_bytes", ConfigKey::Int(ConfigKeyInt::MaxCatBytes)),
    ("max_map_keys", ConfigKey::Int(ConfigKeyInt::MaxMapKeys)),
    ("max_probes", ConfigKey::Int(ConfigKeyInt::MaxProbes)),
    ("max_strlen", ConfigKey::Int(ConfigKeyInt::MaxStrlen)),
    ("max_type_res_iterations", ConfigKey::Int(ConfigKeyInt::MaxTypeResIterations)),
    ("on_stack_limit", ConfigKey::Int(ConfigKeyInt::OnStackLimit)),
    ("perf_rb_pages", ConfigKey::Int(ConfigKeyInt::PerfRbPages)),
    ("max_ast_nodes", ConfigKey::Int(ConfigKeyInt::MaxAstNodes)),
    ("str_trunc_trailer", ConfigKey::String(ConfigKeyString::StrTruncTrailer)),
    ("stack_mode", ConfigKey::StackMode),
    ("cache_user_symbols", ConfigKey::UserSymbolCacheType),
    ("symbol_source", ConfigKey::SymbolSource),
    ("missing_probes", ConfigKey::MissingProbes),
];

impl ConfigKey {
    pub fn name(self) -> &'static str {
        KEYS.iter()
            .find(|(_, key)| *key == self)
            .map(|(name, _)| *name)
            .unwrap_or_else(|| panic!("BUG: config key {self:?} has no name"))
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserSymbolCacheType {
    PerPid,
    PerProgram,
    None,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolSource {
    Dwarf,
    SymbolTable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MissingProbes {
    Ignore,
    Warn,
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigSource {
    Default,
    EnvVar,
    Script,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigValue {
    Bool(bool),
    Int(u64),
    String(String),
    StackMode(StackModeKind),
    UserSymbolCacheType(UserSymbolCacheType),
    SymbolSource(SymbolSource),
    MissingProbes(MissingProbes),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unrecognized config variable: {0}")]
    UnknownKey(String),
    #[error("Invalid value for {key}: valid values are {valid}")]
    InvalidValue { key: ConfigKey, valid: &'static str },
    #[error("Invalid value for {key}: '{value}'")]
    Unparsable { key: ConfigKey, value: String },
    #[error("{key} was set from the environment and cannot be overridden by the script")]
    SetByEnv { key: ConfigKey },
}

#[derive(Clone, Debug)]
pub struct Config {
    values: HashMap<ConfigKey, (ConfigValue, ConfigSource)>,
}

impl Default for Config {
    fn default() -> Self {
        use ConfigKeyBool::*;
        use ConfigKeyInt::*;

        let defaults = [
            (ConfigKey::Bool(CppDemangle), ConfigValue::Bool(true)),
            (ConfigKey::Bool(LazySymbolication), ConfigValue::Bool(false)),
            (ConfigKey::Bool(ProbeInline), ConfigValue::Bool(false)),
            (ConfigKey::Bool(PrintMapsOnExit), ConfigValue::Bool(true)),
            (ConfigKey::Int(LogSize), ConfigValue::Int(1_000_000)),
            (ConfigKey::Int(MaxBpfProgs), ConfigValue::Int(1024)),
            (ConfigKey::Int(MaxCatBytes), ConfigValue::Int(10 * 1024)),
            (ConfigKey::Int(MaxMapKeys), ConfigValue::Int(4096)),
            (ConfigKey::Int(MaxProbes), ConfigValue::Int(1024)),
            (ConfigKey::Int(MaxStrlen), ConfigValue::Int(64)),
            (ConfigKey::Int(MaxTypeResIterations), ConfigValue::Int(0)),
            (ConfigKey::Int(OnStackLimit), ConfigValue::Int(32)),
            (ConfigKey::Int(PerfRbPages), ConfigValue::Int(64)),
            (ConfigKey::Int(MaxAstNodes), ConfigValue::Int(200_000)),
            (
                ConfigKey::String(ConfigKeyString::StrTruncTrailer),
                ConfigValue::String("..".to_string()),
            ),
            (ConfigKey::StackMode, ConfigValue::StackMode(StackModeKind::Bpftrace)),
            (
                ConfigKey::UserSymbolCacheType,
                ConfigValue::UserSymbolCacheType(UserSymbolCacheType::PerProgram),
            ),
            (ConfigKey::SymbolSource, ConfigValue::SymbolSource(SymbolSource::Dwarf)),
            (ConfigKey::MissingProbes, ConfigValue::MissingProbes(MissingProbes::Warn)),
        ];
        Self {
            values: defaults
                .into_iter()
                .map(|(key, value)| (key, (value, ConfigSource::Default)))
                .collect(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves a user-facing name. Case-insensitive; a `bpftrace_` prefix
    /// is accepted.
    pub fn get_config_key(name: &str) -> Result<ConfigKey, ConfigError> {
        let lower = name.to_ascii_lowercase();
        let short = lower.strip_prefix("bpftrace_").unwrap_or(&lower);
        KEYS.iter()
            .find(|(key_name, _)| *key_name == short)
            .map(|(_, key)| *key)
            .ok_or_else(|| ConfigError::UnknownKey(name.to_string()))
    }

    fn value(&self, key: ConfigKey) -> &ConfigValue {
        match self.values.get(&key) {
            Some((value, _)) => value,
            None => panic!("BUG: config key {key} has no value"),
        }
    }

    pub fn source(&self, key: ConfigKey) -> ConfigSource {
        self.values
            .get(&key)
            .map(|(_, source)| *source)
            .unwrap_or(ConfigSource::Default)
    }

    pub fn get_bool(&self, key: ConfigKeyBool) -> bool {
        match self.value(ConfigKey::Bool(key)) {
            ConfigValue::Bool(value) => *value,
            other => panic!("BUG: bool config key holds {other:?}"),
        }
    }

    pub fn get_int(&self, key: ConfigKeyInt) -> u64 {
        match self.value(ConfigKey::Int(key)) {
            ConfigValue::Int(value) => *value,
            other => panic!("BUG: integer config key holds {other:?}"),
        }
    }

    pub fn get_string(&self, key: ConfigKeyString) -> &str {
        match self.value(ConfigKey::String(key)) {
            ConfigValue::String(value) => value,
            other => panic!("BUG: string config key holds {other:?}"),
        }
    }

    pub fn stack_mode(&self) -> StackModeKind {
        match self.value(ConfigKey::StackMode) {
            ConfigValue::StackMode(mode) => *mode,
            other => panic!("BUG: stack_mode holds {other:?}"),
        }
    }

    pub fn user_symbol_cache_type(&self) -> UserSymbolCacheType {
        match self.value(ConfigKey::UserSymbolCacheType) {
            ConfigValue::UserSymbolCacheType(value) => *value,
            other => panic!("BUG: cache_user_symbols holds {other:?}"),
        }
    }

    pub fn symbol_source(&self) -> SymbolSource {
        match self.value(ConfigKey::SymbolSource) {
            ConfigValue::SymbolSource(value) => *value,
            other => panic!("BUG: symbol_source holds {other:?}"),
        }
    }

    pub fn missing_probes(&self) -> MissingProbes {
        match self.value(ConfigKey::MissingProbes) {
            ConfigValue::MissingProbes(value) => *value,
            other => panic!("BUG: missing_probes holds {other:?}"),
        }
    }

    /// Applies `BPFTRACE_*` environment variables. Unknown variables are
    /// ignored; malformed values are returned as errors.
    pub fn load_env<I, K, V>(&mut self, vars: I) -> Vec<ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut errors = Vec::new();
        let mut setter = ConfigSetter::new(self, ConfigSource::EnvVar);
        for (name, value) in vars {
            let name = name.as_ref();
            if !name.starts_with("BPFTRACE_") {
                continue;
            }
            let Ok(key) = Config::get_config_key(name) else {
                continue;
            };
            if let Err(err) = setter.set_from_str(key, value.as_ref()) {
                errors.push(err);
            }
        }
        errors
    }
}

/// Writes config values on behalf of one source.
pub struct ConfigSetter<'a> {
    config: &'a mut Config,
    source: ConfigSource,
}

impl<'a> ConfigSetter<'a> {
    pub fn new(config: &'a mut Config, source: ConfigSource) -> Self {
        Self { config, source }
    }

    /// Stores `value`. A script never overrides a value taken from the
    /// environment.
    pub fn set(&mut self, key: ConfigKey, value: ConfigValue) -> Result<(), ConfigError> {
        let matches_key = matches!(
            (key, &value),
            (ConfigKey::Bool(_), ConfigValue::Bool(_))
                | (ConfigKey::Int(_), ConfigValue::Int(_))
                | (ConfigKey::String(_), ConfigValue::String(_))
                | (ConfigKey::StackMode, ConfigValue::StackMode(_))
                | (ConfigKey::UserSymbolCacheType, ConfigValue::UserSymbolCacheType(_))
                | (ConfigKey::SymbolSource, ConfigValue::SymbolSource(_))
                | (ConfigKey::MissingProbes, ConfigValue::MissingProbes(_))
        );
        if !matches_key {
            panic!("BUG: value {value:?} does not fit config key {key}");
        }
        if self.source == ConfigSource::Script && self.config.source(key) == ConfigSource::EnvVar {
            return Err(ConfigError::SetByEnv { key });
        }
        self.config.values.insert(key, (value, self.source));
        Ok(())
    }

    pub fn set_user_symbol_cache_type(&mut self, value: &str) -> Result<(), ConfigError> {
        let parsed = match value {
            "PER_PID" => UserSymbolCacheType::PerPid,
            "PER_PROGRAM" => UserSymbolCacheType::PerProgram,
            "NONE" => UserSymbolCacheType::None,
            _ => {
                return Err(ConfigError::InvalidValue {
                    key: ConfigKey::UserSymbolCacheType,
                    valid: "PER_PID, PER_PROGRAM, NONE",
                })
            }
        };
        self.set(
            ConfigKey::UserSymbolCacheType,
            ConfigValue::UserSymbolCacheType(parsed),
        )
    }

    pub fn set_symbol_source(&mut self, value: &str) -> Result<(), ConfigError> {
        let parsed = match value {
            "dwarf" => SymbolSource::Dwarf,
            "symbol_table" => SymbolSource::SymbolTable,
            _ => {
                return Err(ConfigError::InvalidValue {
                    key: ConfigKey::SymbolSource,
                    valid: "dwarf, symbol_table",
                })
            }
        };
        self.set(ConfigKey::SymbolSource, ConfigValue::SymbolSource(parsed))
    }

    pub fn set_missing_probes(&mut self, value: &str) -> Result<(), ConfigError> {
        let parsed = match value {
            "ignore" => MissingProbes::Ignore,
            "warn" => MissingProbes::Warn,
            "error" => MissingProbes::Error,
            _ => {
                return Err(ConfigError::InvalidValue {
                    key: ConfigKey::MissingProbes,
                    valid: "ignore, warn, error",
                })
            }
        };
        self.set(ConfigKey::MissingProbes, ConfigValue::MissingProbes(parsed))
    }

    pub fn set_stack_mode(&mut self, value: &str) -> Result<(), ConfigError> {
        let mode = StackModeKind::parse(value).ok_or(ConfigError::InvalidValue {
            key: ConfigKey::StackMode,
            valid: "bpftrace, perf, raw",
        })?;
        self.set(ConfigKey::StackMode, ConfigValue::StackMode(mode))
    }

    /// Parses a textual value (as found in the environment) for `key`.
    pub fn set_from_str(&mut self, key: ConfigKey, raw: &str) -> Result<(), ConfigError> {
        let unparsable = || ConfigError::Unparsable {
            key,
            value: raw.to_string(),
        };
        match key {
            ConfigKey::Bool(_) => {
                let value = match raw {
                    "1" | "true" => true,
                    "0" | "false" => false,
                    _ => return Err(unparsable()),
                };
                self.set(key, ConfigValue::Bool(value))
            }
            ConfigKey::Int(_) => {
                let value = raw.parse::<u64>().map_err(|_| unparsable())?;
                self.set(key, ConfigValue::Int(value))
            }
            ConfigKey::String(_) => self.set(key, ConfigValue::String(raw.to_string())),
            ConfigKey::StackMode => self.set_stack_mode(raw),
            ConfigKey::UserSymbolCacheType => self.set_user_symbol_cache_type(raw),
            ConfigKey::SymbolSource => self.set_symbol_source(raw),
            ConfigKey::MissingProbes => self.set_missing_probes(raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_lookup_is_case_insensitive_with_optional_prefix() {
        let expected = ConfigKey::Int(ConfigKeyInt::MaxStrlen);
        assert_eq!(Config::get_config_key("max_strlen"), Ok(expected));
        assert_eq!(Config::get_config_key("BPFTRACE_MAX_STRLEN"), Ok(expected));
        assert_eq!(
            Config::get_config_key("nope").map_err(|e| e.to_string()),
            Err("Unrecognized config variable: nope".to_string())
        );
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.get_int(ConfigKeyInt::MaxAstNodes), 200_000);
        assert_eq!(config.get_string(ConfigKeyString::StrTruncTrailer), "..");
        assert_eq!(config.user_symbol_cache_type(), UserSymbolCacheType::PerProgram);
        assert!(config.get_bool(ConfigKeyBool::CppDemangle));
        assert_eq!(config.source(ConfigKey::StackMode), ConfigSource::Default);
    }

    #[test]
    fn script_does_not_override_environment() {
        let mut config = Config::default();
        let errors = config.load_env([("BPFTRACE_MAX_STRLEN", "128"), ("HOME", "/root")]);
        assert!(errors.is_empty());
        let key = ConfigKey::Int(ConfigKeyInt::MaxStrlen);
        assert_eq!(config.source(key), ConfigSource::EnvVar);

        let mut setter = ConfigSetter::new(&mut config, ConfigSource::Script);
        assert_eq!(
            setter.set(key, ConfigValue::Int(16)),
            Err(ConfigError::SetByEnv { key })
        );
        assert_eq!(config.get_int(ConfigKeyInt::MaxStrlen), 128);
    }

    #[test]
    fn enumerated_values_are_validated() {
        let mut config = Config::default();
        let mut setter = ConfigSetter::new(&mut config, ConfigSource::Script);
        let err = setter.set_missing_probes("sometimes").expect_err("invalid");
        assert_eq!(
            err.to_string(),
            "Invalid value for missing_probes: valid values are ignore, warn, error"
        );
        setter.set_symbol_source("symbol_table").expect("valid");
        assert_eq!(config.symbol_source(), SymbolSource::SymbolTable);
    }
}
