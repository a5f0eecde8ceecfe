use crate::language::span::Location;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Hint,
}

impl Severity {
    pub fn prefix(self) -> &'static str {
        match self {
            Severity::Error => "ERROR: ",
            Severity::Warning => "WARNING: ",
            Severity::Hint => "HINT: ",
        }
    }
}

/// A single message, optionally anchored to a source location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub loc: Option<Location>,
    pub severity: Severity,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            loc: None,
            severity: Severity::Error,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(message)
        }
    }

    pub fn hint(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Hint,
            ..Self::error(message)
        }
    }

    pub fn at(mut self, loc: Location) -> Self {
        if loc.is_known() {
            self.loc = Some(loc);
        }
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.loc {
            Some(loc) => write!(f, "{loc}: {}{}", self.severity.prefix(), self.message),
            None => write!(f, "{}{}", self.severity.prefix(), self.message),
        }
    }
}

pub type Diagnostics = Vec<Diagnostic>;

/// Either a value or a non-empty list of errors, always with the warnings
/// gathered along the way.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorOr<T> {
    result: Result<T, Diagnostics>,
    warnings: Diagnostics,
}

/// Result of a computation that has no interesting value.
pub type Outcome = ErrorOr<()>;

impl<T> ErrorOr<T> {
    pub fn new(value: T) -> Self {
        Self {
            result: Ok(value),
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(value: T, warnings: Diagnostics) -> Self {
        Self {
            result: Ok(value),
            warnings,
        }
    }

    pub fn fail(error: Diagnostic) -> Self {
        Self::failures(vec![error], Vec::new())
    }

    /// `errors` must not be empty.
    pub fn failures(errors: Diagnostics, warnings: Diagnostics) -> Self {
        if errors.is_empty() {
            panic!("BUG: ErrorOr::failures called without any error");
        }
        Self {
            result: Err(errors),
            warnings,
        }
    }

    pub fn ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn errors(&self) -> &[Diagnostic] {
        match &self.result {
            Ok(_) => &[],
            Err(errors) => errors,
        }
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    pub fn add_warning(&mut self, warning: Diagnostic) {
        self.warnings.push(warning);
    }

    /// Moves the warnings into `sink` and returns the value.
    pub fn unwrap_into(self, sink: &mut Diagnostics) -> T {
        sink.extend(self.warnings);
        match self.result {
            Ok(value) => value,
            Err(errors) => panic!(
                "BUG: unwrap of failed result: {}",
                errors
                    .iter()
                    .map(|e| e.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; ")
            ),
        }
    }

    pub fn into_parts(self) -> (Result<T, Diagnostics>, Diagnostics) {
        (self.result, self.warnings)
    }

    /// Re-types a failure, appending `extra` warnings.
    pub fn propagate<U>(self, extra: Diagnostics) -> ErrorOr<U> {
        let mut warnings = self.warnings;
        warnings.extend(extra);
        match self.result {
            Ok(_) => panic!("BUG: propagate called on a successful result"),
            Err(errors) => ErrorOr {
                result: Err(errors),
                warnings,
            },
        }
    }

    /// Aggregates two independent results: errors and warnings of both sides
    /// are kept, the first value wins when both succeed.
    pub fn merge(self, second: ErrorOr<T>) -> ErrorOr<T> {
        let mut warnings = self.warnings;
        warnings.extend(second.warnings);
        let result = match (self.result, second.result) {
            (Ok(first), Ok(_)) => Ok(first),
            (Ok(_), Err(errors)) | (Err(errors), Ok(_)) => Err(errors),
            (Err(mut errors), Err(other)) => {
                errors.extend(other);
                Err(errors)
            }
        };
        ErrorOr { result, warnings }
    }
}

impl<T: Default> Default for ErrorOr<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

pub fn success() -> Outcome {
    Outcome::new(())
}

pub fn success_with(warnings: Diagnostics) -> Outcome {
    Outcome::with_warnings((), warnings)
}

pub fn failure(message: impl Into<String>) -> Outcome {
    Outcome::fail(Diagnostic::error(message))
}

/// Splits a flat list into errors and warnings and builds an outcome from it.
/// Hints stay next to the errors they explain.
pub fn outcome_from(diagnostics: Diagnostics) -> Outcome {
    let (warnings, errors): (Diagnostics, Diagnostics) = diagnostics
        .into_iter()
        .partition(|diag| diag.severity == Severity::Warning);
    if errors.iter().any(Diagnostic::is_error) {
        Outcome::failures(errors, warnings)
    } else {
        let mut warnings = warnings;
        warnings.extend(errors);
        success_with(warnings)
    }
}
