use std::collections::BTreeSet;

use crate::error::{GenError, Result};
use crate::symbol::VarName;
use crate::tree::{Expr, PoiId, Program};

#[derive(Default)]
struct Scope {
    bindings: Vec<VarName>
}

/// Stack of lexical scopes met on the way from the program root to an
/// insertion point.
#[derive(Default)]
pub struct Environment {
    scopes: Vec<Scope>
}

impl Environment {
    pub fn new(globals: &[VarName]) -> Self {
        let mut env = Self::default();
        env.push_scope();
        for v in globals {
            env.bind(v);
        }
        env
    }

    /// List all bindings visible from the innermost scope.
    pub fn enumerate_bindings(&self) -> BTreeSet<VarName> {
        self.scopes
            .iter()
            .flat_map(|scope| scope.bindings.iter().cloned())
            .collect()
    }

    pub fn bind(&mut self, v: &VarName) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.bindings.push(v.clone());
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Walk the subtree rooted at `id` looking for `target`. On success the
    /// environment is left holding exactly the scopes enclosing `target`.
    fn search_point(&mut self, program: &Program, id: PoiId, target: PoiId) -> bool {
        if id == target {
            return true;
        }
        let point = &program[id];
        self.push_scope();
        for stmt in &point.stmts {
            if self.search_expr(program, stmt.expr(), target) {
                return true;
            }
            // visible to whatever follows the statement
            if let Some(to) = stmt.target() {
                self.bind(to);
            }
        }
        if let Some(tail) = &point.tail {
            if self.search_expr(program, tail, target) {
                return true;
            }
        }
        self.pop_scope();
        false
    }

    fn search_expr(&mut self, program: &Program, e: &Expr, target: PoiId) -> bool {
        match e {
            Expr::Const(_) | Expr::Var(_) | Expr::Bool(_) | Expr::None => false,
            Expr::Call { args, .. } => args.iter().any(|a| self.search_expr(program, a, target)),
            Expr::Arithmetic { lhs, rhs, .. } | Expr::Comparison { lhs, rhs, .. } => {
                self.search_expr(program, lhs, target) || self.search_expr(program, rhs, target)
            }
            Expr::If { condition, then, else_ } => {
                self.search_expr(program, condition, target)
                    || self.search_point(program, *then, target)
                    || self.search_point(program, *else_, target)
            }
            Expr::While { condition, body, .. } => {
                self.push_scope();
                for v in e.binders() {
                    self.bind(v);
                }
                if self.search_expr(program, condition, target)
                    || self.search_point(program, *body, target)
                {
                    return true;
                }
                self.pop_scope();
                false
            }
            Expr::For { lbound, ubound, body, .. } => {
                if self.search_expr(program, lbound, target) || self.search_expr(program, ubound, target) {
                    return true;
                }
                self.push_scope();
                for v in e.binders() {
                    self.bind(v);
                }
                if self.search_point(program, *body, target) {
                    return true;
                }
                self.pop_scope();
                false
            }
        }
    }
}

/// Variables visible at the insertion point with pre-order index `index`.
///
/// Free variables are visible everywhere, loop binders inside their loop
/// body, assignment targets after their statement within the enclosing
/// blocks. The point's own statements do not contribute.
pub fn scope_at(program: &Program, index: usize) -> Result<BTreeSet<VarName>> {
    let points = program.insertion_points();
    let target = *points.get(index).ok_or(GenError::NoSuchPoint { index, live: points.len() })?;
    let mut env = Environment::new(program.free_vars());
    let found = env.search_point(program, program.root(), target);
    debug_assert!(found, "live point missed by the scope walk");
    Ok(env.enumerate_bindings())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Block, ComparisonOp, Skeleton, Stmt};

    fn names(scope: &BTreeSet<VarName>) -> Vec<&str> {
        scope.iter().map(|v| v.as_str()).collect()
    }

    fn fill(program: &mut Program, id: PoiId, stmts: &[Stmt<Block>], tail: Skeleton) {
        let stmts = stmts.iter().map(|s| program.embed_stmt(s)).collect();
        let tail = program.embed_expr(&tail);
        let point = program.point_mut(id);
        point.stmts = stmts;
        point.tail = Some(tail);
    }

    fn while_loop(var: &str) -> Skeleton {
        Expr::While {
            var: VarName::new(var),
            condition: Box::new(Expr::comparison(ComparisonOp::LessThan, Expr::var(var), Expr::Const(1))),
            body: Block::default(),
        }
    }

    #[test]
    fn root_sees_only_free_variables() {
        let p = Program::new(vec![VarName::new("x"), VarName::new("y")]);
        assert_eq!(names(&scope_at(&p, 0).unwrap()), vec!["x", "y"]);
    }

    #[test]
    fn loop_binders_and_preceding_assignments_are_visible() {
        let mut p = Program::new(vec![VarName::new("x")]);
        let root = p.root();
        let assign = Stmt::Assign { to: Some(VarName::new("a")), val: Expr::Const(0) };
        fill(&mut p, root, &[assign], while_loop("j"));

        assert_eq!(names(&scope_at(&p, 0).unwrap()), vec!["x"]);
        assert_eq!(names(&scope_at(&p, 1).unwrap()), vec!["a", "j", "x"]);
    }

    #[test]
    fn sibling_bodies_do_not_leak() {
        let mut p = Program::new(Vec::new());
        let root = p.root();
        let cond: Skeleton = Expr::If {
            condition: Box::new(Expr::Bool(true)),
            then: Block::new(Vec::new(), Some(while_loop("i"))),
            else_: Block::default(),
        };
        fill(&mut p, root, &[], cond);

        // root, then, while body, else
        assert_eq!(p.insertion_points().len(), 4);
        assert_eq!(names(&scope_at(&p, 2).unwrap()), vec!["i"]);
        assert!(scope_at(&p, 3).unwrap().is_empty());
    }

    #[test]
    fn for_state_is_bound_in_body() {
        let mut p = Program::new(Vec::new());
        let root = p.root();
        let for_loop: Skeleton = Expr::For {
            var: VarName::new("k1"),
            lbound: Box::new(Expr::Const(0)),
            ubound: Box::new(Expr::Const(1)),
            body: Block::default(),
            state: Some(VarName::new("k2")),
        };
        fill(&mut p, root, &[], for_loop);
        assert_eq!(names(&scope_at(&p, 1).unwrap()), vec!["k1", "k2"]);
    }

    #[test]
    fn missing_point_is_an_error() {
        let p = Program::new(Vec::new());
        assert!(matches!(scope_at(&p, 1), Err(GenError::NoSuchPoint { index: 1, live: 1 })));
    }

    #[test]
    fn scope_stack_bookkeeping() {
        let mut env = Environment::new(&[VarName::new("g")]);
        env.push_scope();
        env.bind(&VarName::new("l"));
        assert_eq!(names(&env.enumerate_bindings()), vec!["g", "l"]);
        env.pop_scope();
        assert_eq!(names(&env.enumerate_bindings()), vec!["g"]);
    }
}
