use super::{resolve, TypeSource, UNKNOWN_TYPE};
use crate::language::{
    ast::*,
    types::{SizedType, StackModeKind},
};

pub(super) fn compute(ast: &Arena, id: ExprId) -> Result<SizedType, String> {
    match &ast[id].kind {
        ExprKind::Integer(_) => Ok(SizedType::int64()),
        ExprKind::String(lit) => Ok(SizedType::string(lit.value.len() + 1)),
        ExprKind::StackMode(lit) => StackModeKind::parse(&lit.mode)
            .map(SizedType::StackMode)
            .ok_or_else(|| format!("Unknown stack mode: '{}'", lit.mode)),
        ExprKind::PositionalParameter(PositionalParameter::Param(_)) => Ok(SizedType::int64()),
        ExprKind::PositionalParameter(PositionalParameter::Count) => Ok(SizedType::uint64()),
        ExprKind::Identifier(Identifier { ty, .. })
        | ExprKind::Builtin(Builtin { ty, .. })
        | ExprKind::Call(Call { ty, .. })
        | ExprKind::Map(Map { ty, .. })
        | ExprKind::Variable(Variable { ty, .. }) => from_source(ast, ty),
        ExprKind::Sizeof(_) | ExprKind::Offsetof(_) => Ok(SizedType::uint64()),
        ExprKind::Binop(binop) => binop_type(ast, binop),
        ExprKind::Unop(unop) => unop_type(ast, unop),
        ExprKind::Ternary(ternary) => {
            let left = resolve(ast, ternary.left)?;
            let right = resolve(ast, ternary.right)?;
            if left != right {
                return Err(format!(
                    "ternary type mismatch, left type is {left}, right type is {right}"
                ));
            }
            Ok(left)
        }
        ExprKind::FieldAccess(access) => field_type(ast, access),
        ExprKind::ArrayAccess(access) => {
            let ty = resolve(ast, access.expr)?;
            match &ty {
                SizedType::Array { element, .. } => Ok((**element).clone()),
                SizedType::Pointer(pointee) => Ok((**pointee).clone()),
                _ => Err(format!("type {ty} not legal for array access")),
            }
        }
        ExprKind::Cast(cast) => Ok(cast.ty.clone()),
        ExprKind::Tuple(tuple) => {
            let mut elements = Vec::with_capacity(tuple.elems.len());
            for elem in &tuple.elems {
                let ty = resolve(ast, *elem)?;
                if ty.is_map_only() {
                    return Err(format!("map type {ty} cannot exist inside a tuple"));
                }
                elements.push(ty);
            }
            Ok(SizedType::Tuple(elements))
        }
    }
}

fn from_source(ast: &Arena, source: &TypeSource) -> Result<SizedType, String> {
    match source {
        TypeSource::Unset => Err(UNKNOWN_TYPE.to_string()),
        TypeSource::Fixed(ty) => Ok(ty.clone()),
        TypeSource::SameAs(other) => resolve(ast, *other),
    }
}

fn binop_type(ast: &Arena, binop: &Binop) -> Result<SizedType, String> {
    let left = resolve(ast, binop.left)?;
    let right = resolve(ast, binop.right)?;
    let op = binop.op;

    if let (
        SizedType::Array {
            element: left_elem,
            len: left_len,
        },
        SizedType::Array {
            element: right_elem,
            len: right_len,
        },
    ) = (&left, &right)
    {
        if op != BinaryOp::Eq && op != BinaryOp::Ne {
            return Err(format!("The {op} operator cannot be used on arrays."));
        }
        if !left_elem.is_integer() || left_elem != right_elem {
            return Err(
                "Only arrays of same sized integer support comparison operators.".to_string(),
            );
        }
        if left_len != right_len {
            return Err("Only arrays of same size support comparison operators.".to_string());
        }
        return Ok(SizedType::int64());
    }

    if op.is_comparison() || op.is_logical() {
        return Ok(SizedType::int64());
    }

    match (&left, &right) {
        (
            SizedType::Integer {
                bits: left_bits,
                signed: left_signed,
            },
            SizedType::Integer {
                bits: right_bits,
                signed: right_signed,
            },
        ) => {
            if left_signed == right_signed || left_bits >= right_bits {
                Ok(left.clone())
            } else {
                Ok(right.clone())
            }
        }
        (SizedType::Pointer(_), SizedType::Integer { .. })
            if matches!(op, BinaryOp::Plus | BinaryOp::Minus) =>
        {
            Ok(left.clone())
        }
        (SizedType::String { size: left_size }, SizedType::String { size: right_size })
            if op == BinaryOp::Plus =>
        {
            Ok(SizedType::string((left_size + right_size).saturating_sub(1)))
        }
        _ => Err(format!(
            "The {op} operator cannot be used on types {left} and {right}"
        )),
    }
}

fn unop_type(ast: &Arena, unop: &Unop) -> Result<SizedType, String> {
    let ty = resolve(ast, unop.expr)?;
    match unop.op {
        UnaryOp::LNot => Ok(SizedType::boolean()),
        UnaryOp::Deref => match ty {
            SizedType::Pointer(pointee) => Ok(*pointee),
            other => Err(format!("invalid dereference of type {other}")),
        },
        _ => Ok(ty),
    }
}

fn field_type(ast: &Arena, access: &FieldAccess) -> Result<SizedType, String> {
    let ty = resolve(ast, access.expr)?;
    if let SizedType::Tuple(elements) = &ty {
        if let Some(element) = access
            .field
            .parse::<usize>()
            .ok()
            .and_then(|idx| elements.get(idx))
        {
            return Ok(element.clone());
        }
    }
    let Some(record) = ty.as_record() else {
        return Err(format!("field access on non-record type {ty}"));
    };
    match record.field(&access.field) {
        Some(field) => Ok(field.ty.clone()),
        None => Err(format!("field {} not found on type {ty}", access.field)),
    }
}
