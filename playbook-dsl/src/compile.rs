//! Compilation (§4.4): resolve every `FeatureRef`/`StructRef` to a concrete registry entry,
//! validate operator/operand type compatibility, compute the referenced-feature set that feeds
//! the warmup calculator, and detect circular `SetupRef` cycles with a recursion-visited set.

use crate::ast::{ArithOp, Block, Case, CmpOp, Condition, Expr, Operand, Scalar, WindowOp};
use crate::error::DslError;
use indexmap::IndexMap;
use playbook_instrument::{ActionKind, FeatureDecl, StructureDecl};
use smol_str::SmolStr;
use std::collections::{HashMap, HashSet};

/// A resolved operand, ready for evaluation against a [`playbook_instrument::Snapshot`].
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedOperand {
    Feature { id: SmolStr, field: SmolStr, offset: u8 },
    Struct { key: SmolStr, field: SmolStr, offset: u8 },
    Price(SmolStr),
    Scalar(Scalar),
    Range(f64, f64),
    Arith { op: ArithOp, lhs: Box<ResolvedOperand>, rhs: Box<ResolvedOperand> },
    /// Resolved index into [`CompiledPlay::setups`], evaluated once per tick and cached.
    Setup(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCondition {
    pub lhs: ResolvedOperand,
    pub op: CmpOp,
    pub rhs: ResolvedOperand,
    pub tolerance: Option<ResolvedOperand>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedExpr {
    All(Vec<ResolvedExpr>),
    Any(Vec<ResolvedExpr>),
    Not(Box<ResolvedExpr>),
    Cond(ResolvedCondition),
    Window(ResolvedWindowOp),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedWindowOp {
    /// `id` indexes the evaluator's per-window boolean history ring, assigned by
    /// [`assign_window_ids`] after compilation.
    HoldsFor { id: usize, bars: u32, expr: Box<ResolvedExpr> },
    OccurredWithin { id: usize, bars: u32, expr: Box<ResolvedExpr> },
    CountTrue { id: usize, bars: u32, min_true: u32, expr: Box<ResolvedExpr> },
}

/// Walk a compiled expression tree assigning each window node a unique, stable history-slot id
/// (§4.4 "Windowed conditions" need per-instance history across bars, not a stateless re-scan).
/// Call once per compiled block/setup with a shared counter; the final counter value is the
/// number of history slots the evaluator must allocate for that tree.
pub fn assign_window_ids(expr: &mut ResolvedExpr, counter: &mut usize) {
    match expr {
        ResolvedExpr::All(items) | ResolvedExpr::Any(items) => {
            items.iter_mut().for_each(|e| assign_window_ids(e, counter));
        }
        ResolvedExpr::Not(inner) => assign_window_ids(inner, counter),
        ResolvedExpr::Cond(_) => {}
        ResolvedExpr::Window(w) => {
            let (id, inner) = match w {
                ResolvedWindowOp::HoldsFor { id, expr, .. } => (id, expr),
                ResolvedWindowOp::OccurredWithin { id, expr, .. } => (id, expr),
                ResolvedWindowOp::CountTrue { id, expr, .. } => (id, expr),
            };
            *id = *counter;
            *counter += 1;
            assign_window_ids(inner, counter);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCase {
    pub when: ResolvedExpr,
    pub emit: ActionKind,
    pub metadata: IndexMap<SmolStr, f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledBlock {
    pub id: SmolStr,
    pub when: Option<ResolvedExpr>,
    pub cases: Vec<ResolvedCase>,
    pub else_emit: Option<(ActionKind, IndexMap<SmolStr, f64>)>,
}

/// Registries a Play's blocks compile against: the declared features/structures (keyed by their
/// declared id/key) and the named setups map (sub-expressions referenced via `SetupRef`).
pub struct CompileContext<'a> {
    pub features: &'a IndexMap<SmolStr, FeatureDecl>,
    pub structures: &'a IndexMap<SmolStr, StructureDecl>,
}

/// Compile a Play's raw setups map (`name -> Expr`) into resolution order, detecting cycles via
/// an explicit recursion-visited set carried into the walk (§9 "Circular references in DSL
/// SetupRef").
pub fn compile_setups(
    raw: &IndexMap<SmolStr, Expr>,
    ctx: &CompileContext<'_>,
) -> Result<(Vec<ResolvedExpr>, HashMap<SmolStr, usize>), DslError> {
    let mut resolved = Vec::with_capacity(raw.len());
    let mut index_of: HashMap<SmolStr, usize> = HashMap::new();
    let mut visiting: HashSet<SmolStr> = HashSet::new();

    fn resolve_one(
        name: &SmolStr,
        raw: &IndexMap<SmolStr, Expr>,
        ctx: &CompileContext<'_>,
        resolved: &mut Vec<ResolvedExpr>,
        index_of: &mut HashMap<SmolStr, usize>,
        visiting: &mut HashSet<SmolStr>,
    ) -> Result<usize, DslError> {
        if let Some(&idx) = index_of.get(name) {
            return Ok(idx);
        }
        if !visiting.insert(name.clone()) {
            return Err(DslError::CircularSetupRef(name.to_string()));
        }
        let expr = raw.get(name).ok_or_else(|| DslError::UnresolvedFeatureRef {
            location: "setups".to_string(),
            reference: name.to_string(),
        })?;
        let compiled = compile_expr_inner(expr, ctx, raw, resolved, index_of, visiting)?;
        visiting.remove(name);
        let idx = resolved.len();
        resolved.push(compiled);
        index_of.insert(name.clone(), idx);
        Ok(idx)
    }

    for name in raw.keys() {
        resolve_one(name, raw, ctx, &mut resolved, &mut index_of, &mut visiting)?;
    }

    Ok((resolved, index_of))
}

fn compile_operand(
    operand: &Operand,
    ctx: &CompileContext<'_>,
    raw_setups: &IndexMap<SmolStr, Expr>,
    resolved_setups: &mut Vec<ResolvedExpr>,
    setup_index: &mut HashMap<SmolStr, usize>,
    visiting: &mut HashSet<SmolStr>,
) -> Result<ResolvedOperand, DslError> {
    Ok(match operand {
        Operand::FeatureRef { id, field, offset } => {
            if !ctx.features.contains_key(id) {
                return Err(DslError::UnresolvedFeatureRef {
                    location: String::new(),
                    reference: id.to_string(),
                });
            }
            ResolvedOperand::Feature { id: id.clone(), field: field.clone(), offset: *offset }
        }
        Operand::StructRef { key, field, offset } => {
            if ctx.structures.contains_key(key) {
                ResolvedOperand::Struct { key: key.clone(), field: field.clone(), offset: *offset }
            } else if ctx.features.contains_key(key) {
                ResolvedOperand::Feature { id: key.clone(), field: field.clone(), offset: *offset }
            } else {
                return Err(DslError::UnresolvedStructRef {
                    location: String::new(),
                    reference: key.to_string(),
                });
            }
        }
        Operand::PriceRef(name) => ResolvedOperand::Price(name.clone()),
        Operand::Scalar(s) => ResolvedOperand::Scalar(s.clone()),
        Operand::Range(lo, hi) => ResolvedOperand::Range(*lo, *hi),
        Operand::Arith { op, lhs, rhs } => ResolvedOperand::Arith {
            op: *op,
            lhs: Box::new(compile_operand(lhs, ctx, raw_setups, resolved_setups, setup_index, visiting)?),
            rhs: Box::new(compile_operand(rhs, ctx, raw_setups, resolved_setups, setup_index, visiting)?),
        },
        Operand::SetupRef(name) => {
            if let Some(&idx) = setup_index.get(name) {
                return Ok(ResolvedOperand::Setup(idx));
            }
            if !visiting.insert(name.clone()) {
                return Err(DslError::CircularSetupRef(name.to_string()));
            }
            let expr = raw_setups.get(name).ok_or_else(|| DslError::UnresolvedFeatureRef {
                location: "setups".to_string(),
                reference: name.to_string(),
            })?;
            let compiled = compile_expr_inner(expr, ctx, raw_setups, resolved_setups, setup_index, visiting)?;
            visiting.remove(name);
            let idx = resolved_setups.len();
            resolved_setups.push(compiled);
            setup_index.insert(name.clone(), idx);
            ResolvedOperand::Setup(idx)
        }
    })
}

fn compile_condition(
    cond: &Condition,
    ctx: &CompileContext<'_>,
    raw_setups: &IndexMap<SmolStr, Expr>,
    resolved_setups: &mut Vec<ResolvedExpr>,
    setup_index: &mut HashMap<SmolStr, usize>,
    visiting: &mut HashSet<SmolStr>,
) -> Result<ResolvedCondition, DslError> {
    let lhs = compile_operand(&cond.lhs, ctx, raw_setups, resolved_setups, setup_index, visiting)?;
    let rhs = compile_operand(&cond.rhs, ctx, raw_setups, resolved_setups, setup_index, visiting)?;
    let tolerance = cond
        .tolerance
        .as_ref()
        .map(|t| compile_operand(t, ctx, raw_setups, resolved_setups, setup_index, visiting))
        .transpose()?;

    if matches!(cond.op, CmpOp::Gt | CmpOp::Lt | CmpOp::Ge | CmpOp::Le)
        && (matches!(lhs, ResolvedOperand::Scalar(Scalar::EnumLiteral(_)))
            || matches!(rhs, ResolvedOperand::Scalar(Scalar::EnumLiteral(_))))
    {
        return Err(DslError::IncompatibleOperandTypes {
            location: String::new(),
            op: format!("{:?}", cond.op),
        });
    }

    Ok(ResolvedCondition { lhs, op: cond.op, rhs, tolerance })
}

fn compile_expr_inner(
    expr: &Expr,
    ctx: &CompileContext<'_>,
    raw_setups: &IndexMap<SmolStr, Expr>,
    resolved_setups: &mut Vec<ResolvedExpr>,
    setup_index: &mut HashMap<SmolStr, usize>,
    visiting: &mut HashSet<SmolStr>,
) -> Result<ResolvedExpr, DslError> {
    Ok(match expr {
        Expr::All(items) => ResolvedExpr::All(
            items
                .iter()
                .map(|e| compile_expr_inner(e, ctx, raw_setups, resolved_setups, setup_index, visiting))
                .collect::<Result<_, _>>()?,
        ),
        Expr::Any(items) => ResolvedExpr::Any(
            items
                .iter()
                .map(|e| compile_expr_inner(e, ctx, raw_setups, resolved_setups, setup_index, visiting))
                .collect::<Result<_, _>>()?,
        ),
        Expr::Not(inner) => ResolvedExpr::Not(Box::new(compile_expr_inner(
            inner,
            ctx,
            raw_setups,
            resolved_setups,
            setup_index,
            visiting,
        )?)),
        Expr::Cond(cond) => {
            ResolvedExpr::Cond(compile_condition(cond, ctx, raw_setups, resolved_setups, setup_index, visiting)?)
        }
        Expr::Window(window) => ResolvedExpr::Window(match window {
            WindowOp::HoldsFor { bars, expr } => ResolvedWindowOp::HoldsFor {
                id: 0,
                bars: *bars,
                expr: Box::new(compile_expr_inner(
                    expr,
                    ctx,
                    raw_setups,
                    resolved_setups,
                    setup_index,
                    visiting,
                )?),
            },
            WindowOp::OccurredWithin { bars, expr } => ResolvedWindowOp::OccurredWithin {
                id: 0,
                bars: *bars,
                expr: Box::new(compile_expr_inner(
                    expr,
                    ctx,
                    raw_setups,
                    resolved_setups,
                    setup_index,
                    visiting,
                )?),
            },
            WindowOp::CountTrue { bars, min_true, expr } => ResolvedWindowOp::CountTrue {
                id: 0,
                bars: *bars,
                min_true: *min_true,
                expr: Box::new(compile_expr_inner(
                    expr,
                    ctx,
                    raw_setups,
                    resolved_setups,
                    setup_index,
                    visiting,
                )?),
            },
        }),
    })
}

/// Compile a single [`Expr`] with no setups in scope (the common case for action-block `when`
/// clauses that reference already-compiled setups by index via a shared [`CompileContext`] call).
pub fn compile_expr(expr: &Expr, ctx: &CompileContext<'_>) -> Result<ResolvedExpr, DslError> {
    let empty = IndexMap::new();
    let mut resolved_setups = Vec::new();
    let mut setup_index = HashMap::new();
    let mut visiting = HashSet::new();
    compile_expr_inner(expr, ctx, &empty, &mut resolved_setups, &mut setup_index, &mut visiting)
}

/// Compile a full [`Block`] against the given registries and a pre-resolved setups table
/// (`setup_index` maps setup name to its slot in `resolved_setups`, both produced by
/// [`compile_setups`]).
pub fn compile_block(
    block: &Block,
    ctx: &CompileContext<'_>,
    raw_setups: &IndexMap<SmolStr, Expr>,
    resolved_setups: &mut Vec<ResolvedExpr>,
    setup_index: &mut HashMap<SmolStr, usize>,
) -> Result<CompiledBlock, DslError> {
    let mut visiting = HashSet::new();
    let when = block
        .when
        .as_ref()
        .map(|w| compile_expr_inner(w, ctx, raw_setups, resolved_setups, setup_index, &mut visiting))
        .transpose()?;
    let cases = block
        .cases
        .iter()
        .map(|case| -> Result<ResolvedCase, DslError> {
            Ok(ResolvedCase {
                when: compile_expr_inner(&case.when, ctx, raw_setups, resolved_setups, setup_index, &mut visiting)?,
                emit: case.emit,
                metadata: case.metadata.clone(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CompiledBlock { id: block.id.clone(), when, cases, else_emit: block.else_emit.clone() })
}

/// Collect every feature id referenced (directly or via a struct's co-located feature) by a
/// compiled expression tree, feeding the warmup calculator (§4.4 Compilation).
pub fn referenced_features(expr: &ResolvedExpr, out: &mut HashSet<SmolStr>) {
    match expr {
        ResolvedExpr::All(items) | ResolvedExpr::Any(items) => {
            items.iter().for_each(|e| referenced_features(e, out));
        }
        ResolvedExpr::Not(inner) => referenced_features(inner, out),
        ResolvedExpr::Cond(cond) => {
            referenced_features_operand(&cond.lhs, out);
            referenced_features_operand(&cond.rhs, out);
            if let Some(t) = &cond.tolerance {
                referenced_features_operand(t, out);
            }
        }
        ResolvedExpr::Window(w) => match w {
            ResolvedWindowOp::HoldsFor { expr, .. }
            | ResolvedWindowOp::OccurredWithin { expr, .. }
            | ResolvedWindowOp::CountTrue { expr, .. } => referenced_features(expr, out),
        },
    }
}

fn referenced_features_operand(operand: &ResolvedOperand, out: &mut HashSet<SmolStr>) {
    match operand {
        ResolvedOperand::Feature { id, .. } => {
            out.insert(id.clone());
        }
        ResolvedOperand::Arith { lhs, rhs, .. } => {
            referenced_features_operand(lhs, out);
            referenced_features_operand(rhs, out);
        }
        _ => {}
    }
}

/// Collect every structure key referenced by a compiled expression tree.
pub fn referenced_structures(expr: &ResolvedExpr, out: &mut HashSet<SmolStr>) {
    match expr {
        ResolvedExpr::All(items) | ResolvedExpr::Any(items) => {
            items.iter().for_each(|e| referenced_structures(e, out));
        }
        ResolvedExpr::Not(inner) => referenced_structures(inner, out),
        ResolvedExpr::Cond(cond) => {
            referenced_structures_operand(&cond.lhs, out);
            referenced_structures_operand(&cond.rhs, out);
            if let Some(t) = &cond.tolerance {
                referenced_structures_operand(t, out);
            }
        }
        ResolvedExpr::Window(w) => match w {
            ResolvedWindowOp::HoldsFor { expr, .. }
            | ResolvedWindowOp::OccurredWithin { expr, .. }
            | ResolvedWindowOp::CountTrue { expr, .. } => referenced_structures(expr, out),
        },
    }
}

fn referenced_structures_operand(operand: &ResolvedOperand, out: &mut HashSet<SmolStr>) {
    match operand {
        ResolvedOperand::Struct { key, .. } => {
            out.insert(key.clone());
        }
        ResolvedOperand::Arith { lhs, rhs, .. } => {
            referenced_structures_operand(lhs, out);
            referenced_structures_operand(rhs, out);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::CmpOp;
    use playbook_instrument::TfRole;

    fn feature(id: &str) -> FeatureDecl {
        FeatureDecl {
            id: SmolStr::new(id),
            indicator: SmolStr::new("ema"),
            params: IndexMap::new(),
            tf_role: TfRole::LowTf,
            input: Default::default(),
        }
    }

    #[test]
    fn unresolved_feature_ref_errors() {
        let features = IndexMap::new();
        let structures = IndexMap::new();
        let ctx = CompileContext { features: &features, structures: &structures };
        let expr = Expr::Cond(Condition {
            lhs: Operand::FeatureRef { id: SmolStr::new("ghost"), field: SmolStr::new("value"), offset: 0 },
            op: CmpOp::Gt,
            rhs: Operand::Scalar(Scalar::Number(1.0)),
            tolerance: None,
        });
        assert!(compile_expr(&expr, &ctx).is_err());
    }

    #[test]
    fn resolves_known_feature_ref() {
        let mut features = IndexMap::new();
        features.insert(SmolStr::new("ema_fast"), feature("ema_fast"));
        let structures = IndexMap::new();
        let ctx = CompileContext { features: &features, structures: &structures };
        let expr = Expr::Cond(Condition {
            lhs: Operand::FeatureRef { id: SmolStr::new("ema_fast"), field: SmolStr::new("value"), offset: 0 },
            op: CmpOp::Gt,
            rhs: Operand::Scalar(Scalar::Number(1.0)),
            tolerance: None,
        });
        let resolved = compile_expr(&expr, &ctx).unwrap();
        let mut refs = HashSet::new();
        referenced_features(&resolved, &mut refs);
        assert!(refs.contains("ema_fast"));
    }

    #[test]
    fn self_referencing_setup_is_a_cycle() {
        let features = IndexMap::new();
        let structures = IndexMap::new();
        let ctx = CompileContext { features: &features, structures: &structures };
        let mut raw = IndexMap::new();
        raw.insert(
            SmolStr::new("a"),
            Expr::Cond(Condition {
                lhs: Operand::SetupRef(SmolStr::new("a")),
                op: CmpOp::Eq,
                rhs: Operand::Scalar(Scalar::Bool(true)),
                tolerance: None,
            }),
        );
        assert!(matches!(compile_setups(&raw, &ctx), Err(DslError::CircularSetupRef(_))));
    }
}
