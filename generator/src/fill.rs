use crate::tree::{Block, Expr, Skeleton, Stmt};

pub trait Fillable: Sized {
    /// Return a new version of yourself whose first dangling hole (pre-order)
    /// carries `tail` as its trailing expression, consuming yourself in the
    /// process. Also returns how many holes were filled.
    fn saturate(self, tail: &Skeleton) -> (usize, Self);
}

impl Fillable for Skeleton {
    fn saturate(self, tail: &Skeleton) -> (usize, Skeleton) {
        let mut todo = 1;
        let e = fill(self, tail, &mut todo);
        (1 - todo, e)
    }
}

fn fill(e: Skeleton, tail: &Skeleton, todo: &mut usize) -> Skeleton {
    if *todo == 0 {
        return e;
    }
    match e {
        Expr::Const(_) | Expr::Var(_) | Expr::Bool(_) | Expr::None => e,
        Expr::Call { func, args } => {
            let args = args.into_iter().map(|a| fill(a, tail, todo)).collect();
            Expr::Call { func, args }
        }
        Expr::Arithmetic { op, lhs, rhs } => {
            let lhs = Box::new(fill(*lhs, tail, todo));
            let rhs = Box::new(fill(*rhs, tail, todo));
            Expr::Arithmetic { op, lhs, rhs }
        }
        Expr::Comparison { op, lhs, rhs } => {
            let lhs = Box::new(fill(*lhs, tail, todo));
            let rhs = Box::new(fill(*rhs, tail, todo));
            Expr::Comparison { op, lhs, rhs }
        }
        Expr::If { condition, then, else_ } => {
            let condition = Box::new(fill(*condition, tail, todo));
            let then = fill_block(then, tail, todo);
            let else_ = fill_block(else_, tail, todo);
            Expr::If { condition, then, else_ }
        }
        Expr::While { var, condition, body } => {
            let condition = Box::new(fill(*condition, tail, todo));
            let body = fill_block(body, tail, todo);
            Expr::While { var, condition, body }
        }
        Expr::For { var, lbound, ubound, body, state } => {
            let lbound = Box::new(fill(*lbound, tail, todo));
            let ubound = Box::new(fill(*ubound, tail, todo));
            let body = fill_block(body, tail, todo);
            Expr::For { var, lbound, ubound, body, state }
        }
    }
}

fn fill_block(b: Block, tail: &Skeleton, todo: &mut usize) -> Block {
    if *todo == 0 {
        return b;
    }
    if b.is_dangling() {
        *todo -= 1;
        return Block { stmts: b.stmts, tail: Some(Box::new(tail.clone())) };
    }
    let stmts = b
        .stmts
        .into_iter()
        .map(|s| match s {
            Stmt::Assign { to, val } => Stmt::Assign { to, val: fill(val, tail, todo) },
            Stmt::Return(e) => Stmt::Return(fill(e, tail, todo)),
        })
        .collect();
    let tail = b.tail.map(|t| Box::new(fill(*t, tail, todo)));
    Block { stmts, tail }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::VarName;

    fn while_loop(body: Block) -> Skeleton {
        Expr::While { var: VarName::new("j"), condition: Box::new(Expr::Bool(true)), body }
    }

    #[test]
    fn fills_the_first_dangling_hole() {
        let inc = Expr::increment(VarName::new("x"));
        let (n, e) = while_loop(Block::default()).saturate(&inc);
        assert_eq!(n, 1);
        assert_eq!(e, while_loop(Block::new(Vec::new(), Some(inc))));
    }

    #[test]
    fn only_one_hole_is_filled() {
        let cond: Skeleton = Expr::If {
            condition: Box::new(Expr::Bool(false)),
            then: Block::default(),
            else_: Block::default(),
        };
        let (n, e) = cond.saturate(&Expr::Const(7));
        assert_eq!(n, 1);
        let Expr::If { then, else_, .. } = e else { panic!("shape changed") };
        assert_eq!(then.tail.as_deref(), Some(&Expr::Const(7)));
        assert!(else_.is_dangling());
    }

    #[test]
    fn nested_holes_are_reached_through_tails() {
        let inner = while_loop(Block::default());
        let outer = while_loop(Block::new(Vec::new(), Some(inner)));
        let (n, e) = outer.saturate(&Expr::Const(0));
        assert_eq!(n, 1);
        assert!(e.insertion_points().iter().all(|b| !b.is_dangling()));
    }

    #[test]
    fn saturated_skeleton_is_left_alone() {
        let full = while_loop(Block::new(Vec::new(), Some(Expr::None)));
        let (n, e) = full.clone().saturate(&Expr::Const(0));
        assert_eq!(n, 0);
        assert_eq!(e, full);
    }
}
