//! Narrow query interfaces onto the type databases and probe listings that
//! live outside the analysis core, plus in-memory implementations.

use crate::language::{
    ast::{AttachPoint, ProbeType},
    types::{Record, SizedType},
};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("no BTF data for {0}")]
    NoTypeInfo(String),
    #[error("function {0} not found")]
    UnknownFunction(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WildcardError {
    #[error("Invalid wildcard pattern: {0}")]
    InvalidPattern(String),
    #[error("No probes matched {0}")]
    NoMatches(String),
    #[error("Wildcards are not supported for {0} probes")]
    Unsupported(String),
}

/// Kernel type database (BTF).
pub trait KernelTypes {
    /// Type named `name`, e.g. `struct task_struct`. `None` when unknown.
    fn get_stype(&self, name: &str) -> Option<SizedType>;

    /// Fills in the fields of a record type, looking through pointers.
    fn resolve_fields(&self, ty: &mut SizedType);

    /// Argument record of a kernel function. Exit probes also receive a
    /// `$retval` field.
    fn resolve_args(&self, func: &str, is_exit: bool) -> Result<Record, ProviderError>;
}

/// Per-binary debug information (DWARF).
pub trait DebugInfo {
    /// Whether debug information is available for `target`.
    fn has_target(&self, target: &str) -> bool;

    fn get_stype(&self, target: &str, name: &str) -> Option<SizedType>;

    fn resolve_args(&self, target: &str, func: &str) -> Option<Record>;
}

/// Expands wildcard attach points into concrete matches.
pub trait ProbeMatcher {
    /// Matches formatted the way [`AttachPoint::expansion_copy`] consumes
    /// them (e.g. `target:func` for uprobes).
    fn get_matches_for_ap(&self, ap: &AttachPoint) -> Result<BTreeSet<String>, WildcardError>;
}

/// Every collaborator the analysis passes may consult.
pub struct Providers {
    pub kernel: Option<Box<dyn KernelTypes>>,
    pub debug_info: Box<dyn DebugInfo>,
    pub matcher: Box<dyn ProbeMatcher>,
}

impl Default for Providers {
    fn default() -> Self {
        Self {
            kernel: None,
            debug_info: Box::new(StaticDebugInfo::default()),
            matcher: Box::new(StaticProbeMatcher::default()),
        }
    }
}

fn fill_record(ty: &mut SizedType, lookup: impl Fn(&str) -> Option<Record>) {
    match ty {
        SizedType::Record(record) if !record.is_resolved() => {
            if let Some(found) = lookup(&record.name) {
                *record = found;
            }
        }
        SizedType::Pointer(inner) => fill_record(inner, lookup),
        SizedType::Array { element, .. } => fill_record(element, lookup),
        _ => {}
    }
}

/// Kernel types backed by in-memory tables.
#[derive(Clone, Debug, Default)]
pub struct StaticKernelTypes {
    records: HashMap<String, Record>,
    functions: HashMap<String, Record>,
}

impl StaticKernelTypes {
    pub fn with_record(mut self, record: Record) -> Self {
        self.records.insert(record.name.clone(), record);
        self
    }

    /// Registers a kernel function with the given (name, type) parameters
    /// and return type.
    pub fn with_function(
        mut self,
        name: &str,
        params: Vec<(&str, SizedType)>,
        return_type: SizedType,
    ) -> Self {
        let mut fields: Vec<(String, SizedType)> = params
            .into_iter()
            .map(|(param, ty)| (param.to_string(), ty))
            .collect();
        fields.push((crate::RETVAL_FIELD.to_string(), return_type));
        self.functions
            .insert(name.to_string(), Record::with_fields(name, fields));
        self
    }
}

impl KernelTypes for StaticKernelTypes {
    fn get_stype(&self, name: &str) -> Option<SizedType> {
        self.records
            .get(name)
            .map(|record| SizedType::Record(record.clone()))
    }

    fn resolve_fields(&self, ty: &mut SizedType) {
        fill_record(ty, |name| self.records.get(name).cloned());
    }

    fn resolve_args(&self, func: &str, is_exit: bool) -> Result<Record, ProviderError> {
        let record = self
            .functions
            .get(func)
            .ok_or_else(|| ProviderError::UnknownFunction(func.to_string()))?;
        let fields = record
            .fields
            .iter()
            .filter(|field| is_exit || field.name != crate::RETVAL_FIELD)
            .map(|field| (field.name.clone(), field.ty.clone()))
            .collect();
        Ok(Record::with_fields(format!("{func}_args"), fields))
    }
}

#[derive(Clone, Debug, Default)]
pub struct StaticDebugInfo {
    targets: HashMap<String, DebugTarget>,
}

#[derive(Clone, Debug, Default)]
struct DebugTarget {
    records: HashMap<String, Record>,
    functions: HashMap<String, Record>,
}

impl StaticDebugInfo {
    pub fn with_target(mut self, target: &str) -> Self {
        self.targets.entry(target.to_string()).or_default();
        self
    }

    pub fn with_record(mut self, target: &str, record: Record) -> Self {
        self.targets
            .entry(target.to_string())
            .or_default()
            .records
            .insert(record.name.clone(), record);
        self
    }

    pub fn with_function(mut self, target: &str, name: &str, params: Vec<(&str, SizedType)>) -> Self {
        let fields = params
            .into_iter()
            .map(|(param, ty)| (param.to_string(), ty))
            .collect();
        self.targets
            .entry(target.to_string())
            .or_default()
            .functions
            .insert(name.to_string(), Record::with_fields(format!("{name}_args"), fields));
        self
    }
}

impl DebugInfo for StaticDebugInfo {
    fn has_target(&self, target: &str) -> bool {
        self.targets.contains_key(target)
    }

    fn get_stype(&self, target: &str, name: &str) -> Option<SizedType> {
        self.targets
            .get(target)?
            .records
            .get(name)
            .map(|record| SizedType::Record(record.clone()))
    }

    fn resolve_args(&self, target: &str, func: &str) -> Option<Record> {
        self.targets.get(target)?.functions.get(func).cloned()
    }
}

/// Glob match supporting `*` and `?`.
pub fn wildcard_match(pattern: &str, candidate: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let candidate: Vec<char> = candidate.chars().collect();
    let (mut p, mut c) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while c < candidate.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == candidate[c]) {
            p += 1;
            c += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, c));
            p += 1;
        } else if let Some((star_p, star_c)) = star {
            p = star_p + 1;
            c = star_c + 1;
            star = Some((star_p, star_c + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|ch| *ch == '*')
}

/// Matches attach points against fixed symbol lists per probe type.
#[derive(Clone, Debug, Default)]
pub struct StaticProbeMatcher {
    symbols: HashMap<ProbeType, Vec<String>>,
}

impl StaticProbeMatcher {
    /// Adds symbols for `provider`, formatted as the matches are returned.
    pub fn with_symbols(mut self, provider: &str, symbols: &[&str]) -> Self {
        self.symbols
            .entry(ProbeType::from_provider(provider))
            .or_default()
            .extend(symbols.iter().map(ToString::to_string));
        self
    }

    fn search_pattern(ap: &AttachPoint) -> Result<String, WildcardError> {
        let parts: Vec<&str> = match ap.probe_type() {
            ProbeType::Kprobe | ProbeType::Kretprobe | ProbeType::RawTracepoint => {
                if ap.target.is_empty() {
                    vec![&ap.func]
                } else {
                    vec![&ap.target, &ap.func]
                }
            }
            ProbeType::Fentry | ProbeType::Fexit => {
                let module = if ap.target.is_empty() { "*" } else { &ap.target };
                vec![module, &ap.func]
            }
            ProbeType::Uprobe
            | ProbeType::Uretprobe
            | ProbeType::Tracepoint
            | ProbeType::Watchpoint
            | ProbeType::AsyncWatchpoint => vec![&ap.target, &ap.func],
            ProbeType::Usdt => vec![&ap.target, &ap.ns, &ap.func],
            other => return Err(WildcardError::Unsupported(format!("{other:?}"))),
        };
        let pattern = parts.join(":");
        if pattern.contains("**") {
            return Err(WildcardError::InvalidPattern(pattern));
        }
        Ok(pattern)
    }
}

impl ProbeMatcher for StaticProbeMatcher {
    fn get_matches_for_ap(&self, ap: &AttachPoint) -> Result<BTreeSet<String>, WildcardError> {
        let pattern = Self::search_pattern(ap)?;
        let matches: BTreeSet<String> = self
            .symbols
            .get(&ap.probe_type())
            .into_iter()
            .flatten()
            .filter(|symbol| wildcard_match(&pattern, symbol))
            .cloned()
            .collect();
        if matches.is_empty() {
            return Err(WildcardError::NoMatches(ap.name()));
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::span::Location;

    #[test]
    fn glob_matching() {
        assert!(wildcard_match("vfs_*", "vfs_read"));
        assert!(wildcard_match("*read*", "vfs_readv"));
        assert!(wildcard_match("sys_?ead", "sys_read"));
        assert!(!wildcard_match("vfs_*", "do_vfs_read"));
        assert!(wildcard_match("*", ""));
    }

    #[test]
    fn matcher_formats_matches_by_probe_type() {
        let matcher = StaticProbeMatcher::default()
            .with_symbols("uprobe", &["/bin/sh:main", "/bin/sh:readline", "/bin/ls:main"]);
        let ap = AttachPoint::new("uprobe", Location::default())
            .with_target("/bin/sh")
            .with_func("*");
        let matches = matcher.get_matches_for_ap(&ap).expect("matches");
        assert_eq!(
            matches.into_iter().collect::<Vec<_>>(),
            vec!["/bin/sh:main", "/bin/sh:readline"]
        );

        let none = AttachPoint::new("kprobe", Location::default()).with_func("nope*");
        assert_eq!(
            matcher.get_matches_for_ap(&none),
            Err(WildcardError::NoMatches("kprobe:nope*".to_string()))
        );
    }

    #[test]
    fn kernel_args_include_retval_only_on_exit() {
        let kernel = StaticKernelTypes::default().with_function(
            "vfs_read",
            vec![("count", SizedType::uint64())],
            SizedType::int64(),
        );
        let entry = kernel.resolve_args("vfs_read", false).expect("known");
        assert!(entry.field(crate::RETVAL_FIELD).is_none());
        let exit = kernel.resolve_args("vfs_read", true).expect("known");
        assert_eq!(
            exit.field(crate::RETVAL_FIELD).map(|f| &f.ty),
            Some(&SizedType::int64())
        );
        assert_eq!(
            kernel.resolve_args("missing", false),
            Err(ProviderError::UnknownFunction("missing".to_string()))
        );
    }
}
