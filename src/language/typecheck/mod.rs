//! Demand-driven expression typing.
//!
//! `Arena::type_of` hands out a [`FutureType`]; nothing is computed until
//! [`FutureType::valid`] is called. Successful results are memoised per node in
//! the arena's [`TypeTable`]; failures are recomputed on the next request so
//! that a later pass fixing a type is picked up. A node whose type depends on
//! itself resolves to an error instead of recursing forever.

mod rules;

#[cfg(test)]
mod tests;

use crate::language::{
    ast::{Arena, ExprId},
    types::SizedType,
};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

pub const RECURSIVE_INFERENCE: &str = "recursive type inference; cannot be resolved";
pub const UNKNOWN_TYPE: &str = "unknown type";

/// Where a variable-typed expression (identifier, builtin, call, map,
/// variable) gets its type from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum TypeSource {
    #[default]
    Unset,
    Fixed(SizedType),
    /// Same type as another expression, resolved lazily.
    SameAs(ExprId),
}

#[derive(Debug, Default)]
pub struct TypeTable {
    memo: RefCell<HashMap<ExprId, SizedType>>,
    in_progress: RefCell<HashSet<ExprId>>,
    evaluations: Cell<usize>,
}

impl TypeTable {
    /// Number of rule evaluations performed so far (memo hits excluded).
    pub fn evaluations(&self) -> usize {
        self.evaluations.get()
    }

    pub fn is_memoised(&self, id: ExprId) -> bool {
        self.memo.borrow().contains_key(&id)
    }

    /// Drops every memoised result. Called whenever the tree or an assigned
    /// type changes.
    pub fn invalidate(&self) {
        self.memo.borrow_mut().clear();
    }
}

pub(crate) fn resolve(ast: &Arena, id: ExprId) -> Result<SizedType, String> {
    let table = ast.types();
    if let Some(ty) = table.memo.borrow().get(&id) {
        return Ok(ty.clone());
    }
    if !table.in_progress.borrow_mut().insert(id) {
        return Err(RECURSIVE_INFERENCE.to_string());
    }
    table.evaluations.set(table.evaluations.get() + 1);
    let result = rules::compute(ast, id);
    table.in_progress.borrow_mut().remove(&id);
    if let Ok(ty) = &result {
        table.memo.borrow_mut().insert(id, ty.clone());
    }
    result
}

/// Deferred type of one expression.
pub struct FutureType<'a> {
    ast: &'a Arena,
    id: ExprId,
    resolved: Option<Result<SizedType, String>>,
}

impl<'a> FutureType<'a> {
    /// Evaluates the type if needed and reports whether it resolved.
    pub fn valid(&mut self) -> bool {
        if self.resolved.is_none() {
            self.resolved = Some(resolve(self.ast, self.id));
        }
        matches!(self.resolved, Some(Ok(_)))
    }

    /// Resolved type. Only meaningful after `valid()` returned `true`.
    pub fn ty(&self) -> &SizedType {
        match &self.resolved {
            Some(Ok(ty)) => ty,
            Some(Err(err)) => panic!("BUG: type read from a failed resolution: {err}"),
            None => panic!("BUG: type read before valid() was called"),
        }
    }

    /// Resolution error. Only meaningful after `valid()` returned `false`.
    pub fn error(&self) -> &str {
        match &self.resolved {
            Some(Err(err)) => err,
            Some(Ok(ty)) => panic!("BUG: error read from a resolved type: {ty}"),
            None => panic!("BUG: error read before valid() was called"),
        }
    }

    pub fn into_result(mut self) -> Result<SizedType, String> {
        self.valid();
        self.resolved
            .unwrap_or_else(|| Err(RECURSIVE_INFERENCE.to_string()))
    }
}

impl Arena {
    pub fn type_of(&self, id: ExprId) -> FutureType<'_> {
        FutureType {
            ast: self,
            id,
            resolved: None,
        }
    }

    /// Shortcut for consumers that treat an unresolved type as absent.
    pub fn resolved_type(&self, id: ExprId) -> Option<SizedType> {
        self.type_of(id).into_result().ok()
    }

    /// Assigns the type of a variable-typed expression.
    pub fn set_type(&mut self, id: ExprId, source: TypeSource) {
        let tag = self[id].tag();
        match self[id].kind.type_source_mut() {
            Some(slot) => *slot = source,
            None => panic!("BUG: cannot assign a type to a {tag:?} expression"),
        }
        self.types().invalidate();
    }

    pub fn type_source(&self, id: ExprId) -> Option<&TypeSource> {
        self[id].kind.type_source()
    }
}
