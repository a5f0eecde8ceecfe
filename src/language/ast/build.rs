//! Convenience constructors used by the parser front-end, by rewriting passes
//! and by tests.

use super::*;
use crate::language::{span::Location, typecheck::TypeSource, types::SizedType};

impl Arena {
    pub fn expr_node(&mut self, kind: ExprKind, loc: Location) -> ExprId {
        self.make_node(Expr::new(kind, loc))
    }

    pub fn stmt_node(&mut self, kind: StmtKind, loc: Location) -> StmtId {
        self.make_node(Stmt::new(kind, loc))
    }

    pub fn integer(&mut self, value: i64, loc: Location) -> ExprId {
        self.expr_node(ExprKind::Integer(IntegerLiteral { value }), loc)
    }

    pub fn string(&mut self, value: &str, loc: Location) -> ExprId {
        self.expr_node(
            ExprKind::String(StringLiteral {
                value: value.to_string(),
            }),
            loc,
        )
    }

    pub fn stack_mode(&mut self, mode: &str, loc: Location) -> ExprId {
        self.expr_node(
            ExprKind::StackMode(StackModeLiteral {
                mode: mode.to_string(),
            }),
            loc,
        )
    }

    pub fn positional(&mut self, n: usize, loc: Location) -> ExprId {
        self.expr_node(
            ExprKind::PositionalParameter(PositionalParameter::Param(n)),
            loc,
        )
    }

    pub fn param_count(&mut self, loc: Location) -> ExprId {
        self.expr_node(ExprKind::PositionalParameter(PositionalParameter::Count), loc)
    }

    pub fn identifier(&mut self, ident: &str, loc: Location) -> ExprId {
        self.expr_node(
            ExprKind::Identifier(Identifier {
                ident: ident.to_string(),
                ty: TypeSource::Unset,
            }),
            loc,
        )
    }

    pub fn builtin(&mut self, ident: &str, loc: Location) -> ExprId {
        self.expr_node(
            ExprKind::Builtin(Builtin {
                ident: ident.to_string(),
                ty: TypeSource::Unset,
            }),
            loc,
        )
    }

    pub fn call(&mut self, func: &str, args: Vec<ExprId>, loc: Location) -> ExprId {
        self.expr_node(
            ExprKind::Call(Call {
                func: func.to_string(),
                args,
                ty: TypeSource::Unset,
            }),
            loc,
        )
    }

    pub fn sizeof(&mut self, target: SizeofTarget, loc: Location) -> ExprId {
        self.expr_node(ExprKind::Sizeof(Sizeof { target }), loc)
    }

    pub fn offsetof(&mut self, record: SizeofTarget, field: &str, loc: Location) -> ExprId {
        self.expr_node(
            ExprKind::Offsetof(Offsetof {
                record,
                field: field.to_string(),
            }),
            loc,
        )
    }

    /// `@ident` or `@ident[key]`; the key is linked back to the map.
    pub fn map(&mut self, ident: &str, key: Option<ExprId>, loc: Location) -> ExprId {
        let map = self.expr_node(
            ExprKind::Map(Map {
                ident: ident.to_string(),
                key,
                ty: TypeSource::Unset,
            }),
            loc,
        );
        if let Some(key) = key {
            self[key].key_for_map = Some(map);
        }
        map
    }

    pub fn variable(&mut self, ident: &str, loc: Location) -> ExprId {
        self.expr_node(
            ExprKind::Variable(Variable {
                ident: ident.to_string(),
                ty: TypeSource::Unset,
            }),
            loc,
        )
    }

    pub fn binop(&mut self, left: ExprId, op: BinaryOp, right: ExprId, loc: Location) -> ExprId {
        self.expr_node(ExprKind::Binop(Binop { left, op, right }), loc)
    }

    pub fn unop(&mut self, op: UnaryOp, expr: ExprId, loc: Location) -> ExprId {
        self.expr_node(
            ExprKind::Unop(Unop {
                op,
                expr,
                is_post: false,
            }),
            loc,
        )
    }

    pub fn ternary(&mut self, cond: ExprId, left: ExprId, right: ExprId, loc: Location) -> ExprId {
        self.expr_node(ExprKind::Ternary(Ternary { cond, left, right }), loc)
    }

    pub fn field_access(&mut self, expr: ExprId, field: &str, loc: Location) -> ExprId {
        self.expr_node(
            ExprKind::FieldAccess(FieldAccess {
                expr,
                field: field.to_string(),
            }),
            loc,
        )
    }

    pub fn array_access(&mut self, expr: ExprId, index: ExprId, loc: Location) -> ExprId {
        self.expr_node(ExprKind::ArrayAccess(ArrayAccess { expr, index }), loc)
    }

    pub fn cast(&mut self, ty: SizedType, expr: ExprId, loc: Location) -> ExprId {
        self.expr_node(ExprKind::Cast(Cast { ty, expr }), loc)
    }

    pub fn tuple(&mut self, elems: Vec<ExprId>, loc: Location) -> ExprId {
        self.expr_node(ExprKind::Tuple(Tuple { elems }), loc)
    }

    pub fn expr_stmt(&mut self, expr: ExprId, loc: Location) -> StmtId {
        self.stmt_node(StmtKind::Expr(ExprStatement { expr }), loc)
    }

    /// `let $var` or `let $var: type`; a declared type is fixed on the variable.
    pub fn var_decl(&mut self, var: ExprId, declared: Option<SizedType>, loc: Location) -> StmtId {
        if let (Some(ty), Some(slot)) = (&declared, self[var].kind.type_source_mut()) {
            *slot = TypeSource::Fixed(ty.clone());
        }
        self.stmt_node(StmtKind::VarDecl(VarDeclStatement { var, declared }), loc)
    }

    /// `@map[key] = expr`; records the target map on the assigned expression.
    pub fn assign_map(&mut self, map: ExprId, expr: ExprId, loc: Location) -> StmtId {
        self[expr].map = Some(map);
        self.stmt_node(StmtKind::AssignMap(AssignMapStatement { map, expr }), loc)
    }

    /// `$var = expr`; records the target variable on the assigned expression.
    pub fn assign_var(&mut self, var: ExprId, expr: ExprId, loc: Location) -> StmtId {
        self[expr].var = Some(var);
        self.stmt_node(
            StmtKind::AssignVar(AssignVarStatement {
                var,
                expr,
                var_decl: None,
            }),
            loc,
        )
    }

    /// `let $var = expr`
    pub fn assign_var_decl(&mut self, decl: StmtId, expr: ExprId, loc: Location) -> StmtId {
        let var = match &self[decl].kind {
            StmtKind::VarDecl(decl) => decl.var,
            other => panic!("BUG: expected a variable declaration, got {:?}", other.tag()),
        };
        self[expr].var = Some(var);
        self.stmt_node(
            StmtKind::AssignVar(AssignVarStatement {
                var,
                expr,
                var_decl: Some(decl),
            }),
            loc,
        )
    }

    pub fn assign_config(&mut self, config_var: &str, expr: ExprId, loc: Location) -> StmtId {
        self.stmt_node(
            StmtKind::AssignConfigVar(AssignConfigVarStatement {
                config_var: config_var.to_string(),
                expr,
            }),
            loc,
        )
    }

    pub fn block(&mut self, stmts: Vec<StmtId>, loc: Location) -> StmtId {
        self.stmt_node(StmtKind::Block(Block { stmts }), loc)
    }

    pub fn if_stmt(
        &mut self,
        cond: ExprId,
        then_block: StmtId,
        else_block: Option<StmtId>,
        loc: Location,
    ) -> StmtId {
        self.stmt_node(
            StmtKind::If(If {
                cond,
                then_block,
                else_block,
            }),
            loc,
        )
    }

    pub fn unroll(&mut self, expr: ExprId, block: StmtId, loc: Location) -> StmtId {
        self.stmt_node(StmtKind::Unroll(Unroll { expr, block }), loc)
    }

    pub fn jump(&mut self, kind: JumpKind, return_value: Option<ExprId>, loc: Location) -> StmtId {
        self.stmt_node(StmtKind::Jump(Jump { kind, return_value }), loc)
    }

    pub fn while_loop(&mut self, cond: ExprId, block: StmtId, loc: Location) -> StmtId {
        self.stmt_node(StmtKind::While(While { cond, block }), loc)
    }

    pub fn for_loop(&mut self, decl: ExprId, expr: ExprId, stmts: Vec<StmtId>, loc: Location) -> StmtId {
        self.stmt_node(StmtKind::For(For { decl, expr, stmts }), loc)
    }

    pub fn config_block(&mut self, stmts: Vec<StmtId>, loc: Location) -> StmtId {
        self.stmt_node(StmtKind::Config(ConfigBlock { stmts }), loc)
    }

    pub fn new_probe(
        &mut self,
        attach_points: Vec<AttachPoint>,
        pred: Option<ExprId>,
        stmts: Vec<StmtId>,
        loc: Location,
    ) -> ProbeId {
        let attach_points = attach_points
            .into_iter()
            .map(|ap| self.make_node(ap))
            .collect();
        let pred = pred.map(|expr| Predicate {
            loc: self[expr].loc,
            expr,
        });
        let block = self.block(stmts, loc);
        self.make_node(Probe {
            attach_points,
            pred,
            block,
            need_expansion: false,
            index: 0,
            loc,
        })
    }

    pub fn new_subprog(
        &mut self,
        name: &str,
        return_type: SizedType,
        args: Vec<SubprogArg>,
        stmts: Vec<StmtId>,
        loc: Location,
    ) -> SubprogId {
        self.make_node(Subprog {
            name: name.to_string(),
            return_type,
            args,
            stmts,
            loc,
        })
    }
}
