use std::collections::BTreeSet;

use log::trace;

use crate::environment;
use crate::error::{GenError, Result};
use crate::symbol::VarName;
use crate::tree::{Block, Expr, InsertionPoint, PoiId, Program, Skeleton, Stmt};

/// A cursor over exactly one [`Program`] under construction.
///
/// Content handed to [`Builder::update`] is copied into the program, so the
/// caller's skeletons are never touched and may be reused for other
/// candidates.
#[derive(Debug)]
pub struct Builder {
    program: Program,
}

impl Builder {
    /// Start from an empty program: a root point with no statements and no
    /// trailing expression.
    pub fn new(free_vars: Vec<VarName>) -> Self {
        Self { program: Program::new(free_vars) }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn finish(self) -> Program {
        self.program
    }

    /// Number of live insertion points.
    pub fn live_points(&self) -> usize {
        self.program.insertion_points().len()
    }

    /// Handle of the live point with pre-order index `index`, if any.
    pub fn point(&self, index: usize) -> Option<PoiId> {
        self.program.insertion_points().get(index).copied()
    }

    pub fn is_filled(&self, id: PoiId) -> bool {
        self.program[id].is_filled()
    }

    pub fn scope_at(&self, index: usize) -> Result<BTreeSet<VarName>> {
        environment::scope_at(&self.program, index)
    }

    /// Replace the content of point `index` with `stmts` and `tail`.
    ///
    /// The new content is built completely before the point is overwritten.
    /// Holes inside it become live points of the program. Fails with
    /// [`GenError::NoSuchPoint`] if `index` does not address a live point.
    pub fn update(&mut self, index: usize, stmts: &[Stmt<Block>], tail: Option<&Skeleton>) -> Result<PoiId> {
        let id = self
            .point(index)
            .ok_or_else(|| GenError::NoSuchPoint { index, live: self.live_points() })?;

        let stmts: Vec<Stmt> = stmts.iter().map(|s| self.program.embed_stmt(s)).collect();
        let tail: Option<Expr> = tail.map(|t| self.program.embed_expr(t));
        trace!("Update point {index}: {} statements, tail: {}", stmts.len(), tail.is_some());

        *self.program.point_mut(id) = InsertionPoint { stmts, tail, filled: true };
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::ComparisonOp;

    fn x() -> VarName {
        VarName::new("x")
    }

    fn while_j() -> Skeleton {
        Expr::While {
            var: VarName::new("j"),
            condition: Box::new(Expr::comparison(ComparisonOp::LessThan, Expr::var("j"), Expr::Const(1))),
            body: Block::default(),
        }
    }

    fn call_on(var: &str) -> Stmt<Block> {
        Stmt::Assign { to: None, val: Expr::call("inc", vec![Expr::var(var)]) }
    }

    #[test]
    fn update_replaces_the_root() {
        let mut b = Builder::new(vec![x()]);
        let root = b.update(0, &[call_on("x")], Some(&Expr::increment(x()))).unwrap();

        assert!(b.is_filled(root));
        assert_eq!(b.live_points(), 1);
        assert_eq!(
            b.program().to_block(),
            Block::new(vec![call_on("x")], Some(Expr::increment(x())))
        );
    }

    #[test]
    fn nested_holes_become_addressable() {
        let mut b = Builder::new(vec![x()]);
        b.update(0, &[], Some(&while_j())).unwrap();
        assert_eq!(b.live_points(), 2);

        let body = b.point(1).unwrap();
        assert!(!b.is_filled(body));
        assert_eq!(b.scope_at(1).unwrap().len(), 2);

        b.update(1, &[call_on("j")], None).unwrap();
        assert!(b.is_filled(body));
    }

    #[test]
    fn skeletons_are_copied_not_shared() {
        let skeleton = while_j();
        let mut first = Builder::new(vec![x()]);
        let mut second = Builder::new(vec![x()]);
        first.update(0, &[], Some(&skeleton)).unwrap();
        second.update(0, &[], Some(&skeleton)).unwrap();

        first.update(1, &[call_on("x")], None).unwrap();

        assert_eq!(skeleton, while_j());
        let untouched = second.program().block_of(second.point(1).unwrap());
        assert_eq!(untouched, Block::default());
    }

    #[test]
    fn refill_drops_previous_holes() {
        let mut b = Builder::new(vec![x()]);
        b.update(0, &[], Some(&while_j())).unwrap();
        b.update(0, &[call_on("x")], None).unwrap();
        assert_eq!(b.live_points(), 1);
        assert!(b.point(1).is_none());
    }

    #[test]
    fn update_out_of_range_is_fatal() {
        let mut b = Builder::new(Vec::new());
        let err = b.update(3, &[], None).unwrap_err();
        assert!(matches!(err, GenError::NoSuchPoint { index: 3, live: 1 }));
    }
}
