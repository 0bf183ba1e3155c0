use std::collections::BTreeSet;
use std::fmt;
use std::ops::Index;

use la_arena::{Arena, Idx};
use serde::{Deserialize, Serialize};

use crate::symbol::{FuncName, VarName};

/// Handle of an insertion point inside a [`Program`] arena.
pub type PoiId = Idx<InsertionPoint>;

/// A control-flow template. Its holes are inline [`Block`]s, so the whole
/// skeleton is a plain value: cloning it is a deep copy.
pub type Skeleton = Expr<Block>;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Shape {
    Any,
    Concrete(String),
}

impl From<String> for Shape {
    fn from(s: String) -> Self {
        if s == "*" {
            Shape::Any
        } else {
            Shape::Concrete(s)
        }
    }
}

impl From<Shape> for String {
    fn from(s: Shape) -> Self {
        match s {
            Shape::Any => "*".to_string(),
            Shape::Concrete(tag) => tag,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    pub args: Vec<Shape>,
    pub ret: Shape,
    /// Number of trailing argument slots that carry a default value.
    #[serde(default)]
    pub defaulted: usize,
}

impl Signature {
    pub fn new(args: Vec<Shape>, ret: Shape) -> Self {
        Self { args, ret, defaulted: 0 }
    }

    /// A signature taking `n` wildcard arguments and returning anything.
    pub fn wildcard(n: usize) -> Self {
        Self::new(vec![Shape::Any; n], Shape::Any)
    }

    fn returning(tag: &str) -> Self {
        Self::new(Vec::new(), Shape::Concrete(tag.to_string()))
    }

    /// Number of argument slots a call has to supply.
    pub fn required_arity(&self) -> usize {
        self.args.len().saturating_sub(self.defaulted)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArithmeticOp {
    Plus,
    Minus,
    Multiply,
    Divide,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOp {
    LessThan,
    LessThanEqual,
    Equal,
}

/// Expression tree, generic over the representation `H` of its holes.
///
/// Library skeletons use `H = Block`, expressions living in a [`Program`]
/// use `H = PoiId`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(bound(serialize = "H: Serialize", deserialize = "H: Deserialize<'de>"))]
pub enum Expr<H = PoiId> {
    Const(i64),
    Var(VarName),
    Call {
        func: FuncName,
        #[serde(default)]
        args: Vec<Expr<H>>,
    },
    Arithmetic {
        op: ArithmeticOp,
        lhs: Box<Expr<H>>,
        rhs: Box<Expr<H>>,
    },
    Comparison {
        op: ComparisonOp,
        lhs: Box<Expr<H>>,
        rhs: Box<Expr<H>>,
    },
    If {
        condition: Box<Expr<H>>,
        then: H,
        else_: H,
    },
    While {
        var: VarName,
        condition: Box<Expr<H>>,
        body: H,
    },
    For {
        var: VarName,
        lbound: Box<Expr<H>>,
        ubound: Box<Expr<H>>,
        body: H,
        /// Loop-carried variable, visible inside the body.
        #[serde(default)]
        state: Option<VarName>,
    },
    Bool(bool),
    None,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(bound(serialize = "H: Serialize", deserialize = "H: Deserialize<'de>"))]
pub enum Stmt<H = PoiId> {
    /// `to = val`, or a call made for its effect when `to` is `None`.
    Assign {
        #[serde(default)]
        to: Option<VarName>,
        val: Expr<H>,
    },
    Return(Expr<H>),
}

/// Value form of an insertion point.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Block {
    pub stmts: Vec<Stmt<Block>>,
    pub tail: Option<Box<Expr<Block>>>,
}

impl Block {
    pub fn new(stmts: Vec<Stmt<Block>>, tail: Option<Expr<Block>>) -> Self {
        Self { stmts, tail: tail.map(Box::new) }
    }

    /// A hole nothing has been put into yet.
    pub fn is_dangling(&self) -> bool {
        self.tail.is_none()
    }
}

/// Arena node of a [`Program`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InsertionPoint {
    pub stmts: Vec<Stmt>,
    pub tail: Option<Expr>,
    pub(crate) filled: bool,
}

impl InsertionPoint {
    pub fn is_filled(&self) -> bool {
        self.filled
    }
}

impl<H> Expr<H> {
    pub fn var(name: &str) -> Self {
        Expr::Var(VarName::new(name))
    }

    pub fn call(func: &str, args: Vec<Expr<H>>) -> Self {
        Expr::Call { func: FuncName::new(func), args }
    }

    pub fn arithmetic(op: ArithmeticOp, lhs: Expr<H>, rhs: Expr<H>) -> Self {
        Expr::Arithmetic { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }
    }

    pub fn comparison(op: ComparisonOp, lhs: Expr<H>, rhs: Expr<H>) -> Self {
        Expr::Comparison { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }
    }

    /// `var + 1`
    pub fn increment(var: VarName) -> Self {
        Self::arithmetic(ArithmeticOp::Plus, Expr::Var(var), Expr::Const(1))
    }

    /// Holes directly owned by this expression or its sub-expressions, in
    /// pre-order. Does not look inside the holes themselves.
    pub fn for_each_hole<'a, F: FnMut(&'a H)>(&'a self, f: &mut F) {
        match self {
            Expr::Const(_) | Expr::Var(_) | Expr::Bool(_) | Expr::None => {}
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.for_each_hole(f);
                }
            }
            Expr::Arithmetic { lhs, rhs, .. } | Expr::Comparison { lhs, rhs, .. } => {
                lhs.for_each_hole(f);
                rhs.for_each_hole(f);
            }
            Expr::If { condition, then, else_ } => {
                condition.for_each_hole(f);
                f(then);
                f(else_);
            }
            Expr::While { condition, body, .. } => {
                condition.for_each_hole(f);
                f(body);
            }
            Expr::For { lbound, ubound, body, .. } => {
                lbound.for_each_hole(f);
                ubound.for_each_hole(f);
                f(body);
            }
        }
    }

    /// Rebuild the expression with every hole replaced by `f(hole)`.
    pub fn map_holes<G, F: FnMut(&H) -> G>(&self, f: &mut F) -> Expr<G> {
        let sub = |e: &Expr<H>, f: &mut F| Box::new(e.map_holes(f));
        match self {
            Expr::Const(c) => Expr::Const(*c),
            Expr::Var(v) => Expr::Var(v.clone()),
            Expr::Bool(b) => Expr::Bool(*b),
            Expr::None => Expr::None,
            Expr::Call { func, args } => Expr::Call {
                func: func.clone(),
                args: args.iter().map(|a| a.map_holes(f)).collect(),
            },
            Expr::Arithmetic { op, lhs, rhs } => Expr::Arithmetic {
                op: *op,
                lhs: sub(lhs, f),
                rhs: sub(rhs, f),
            },
            Expr::Comparison { op, lhs, rhs } => Expr::Comparison {
                op: *op,
                lhs: sub(lhs, f),
                rhs: sub(rhs, f),
            },
            Expr::If { condition, then, else_ } => {
                let condition = sub(condition, f);
                let then = f(then);
                let else_ = f(else_);
                Expr::If { condition, then, else_ }
            }
            Expr::While { var, condition, body } => {
                let condition = sub(condition, f);
                Expr::While { var: var.clone(), condition, body: f(body) }
            }
            Expr::For { var, lbound, ubound, body, state } => {
                let lbound = sub(lbound, f);
                let ubound = sub(ubound, f);
                Expr::For {
                    var: var.clone(),
                    lbound,
                    ubound,
                    body: f(body),
                    state: state.clone(),
                }
            }
        }
    }

    /// Variables introduced for the holes of this expression.
    pub fn binders(&self) -> Vec<&VarName> {
        match self {
            Expr::While { var, .. } => vec![var],
            Expr::For { var, state, .. } => std::iter::once(var).chain(state.as_ref()).collect(),
            _ => Vec::new(),
        }
    }

    /// Implied arity of the expression when it is used as an embedding.
    pub fn signature(&self) -> Signature {
        match self {
            Expr::Call { args, .. } => Signature::wildcard(args.len()),
            // the variable threaded into the saturated hole
            Expr::If { .. } | Expr::While { .. } | Expr::For { .. } => Signature::wildcard(1),
            Expr::Const(_) | Expr::Arithmetic { .. } => Signature::returning("int"),
            Expr::Comparison { .. } | Expr::Bool(_) => Signature::returning("bool"),
            Expr::None => Signature::returning("none"),
            Expr::Var(_) => Signature::wildcard(0),
        }
    }
}

impl<H> Stmt<H> {
    pub fn expr(&self) -> &Expr<H> {
        match self {
            Stmt::Assign { val, .. } => val,
            Stmt::Return(e) => e,
        }
    }

    pub fn target(&self) -> Option<&VarName> {
        match self {
            Stmt::Assign { to, .. } => to.as_ref(),
            Stmt::Return(_) => None,
        }
    }

    pub fn map_holes<G, F: FnMut(&H) -> G>(&self, f: &mut F) -> Stmt<G> {
        match self {
            Stmt::Assign { to, val } => Stmt::Assign { to: to.clone(), val: val.map_holes(f) },
            Stmt::Return(e) => Stmt::Return(e.map_holes(f)),
        }
    }
}

impl Expr<Block> {
    /// Every insertion point reachable within the skeleton, in pre-order.
    pub fn insertion_points(&self) -> Vec<&Block> {
        let mut out = Vec::new();
        collect_blocks(self, &mut out);
        out
    }

    /// Variables referenced but not bound within the skeleton.
    pub fn free_variables(&self) -> BTreeSet<VarName> {
        let mut free = BTreeSet::new();
        expr_free_vars(self, &mut Vec::new(), &mut free);
        free
    }

    /// Every variable the skeleton names, binders included, in order of
    /// first appearance.
    pub fn variables(&self) -> Vec<VarName> {
        let mut out = Vec::new();
        expr_variables(self, &mut out);
        out
    }
}

fn collect_blocks<'a>(e: &'a Expr<Block>, out: &mut Vec<&'a Block>) {
    e.for_each_hole(&mut |b: &'a Block| {
        out.push(b);
        for stmt in &b.stmts {
            collect_blocks(stmt.expr(), out);
        }
        if let Some(tail) = &b.tail {
            collect_blocks(tail, out);
        }
    });
}

fn expr_free_vars(e: &Expr<Block>, bound: &mut Vec<VarName>, free: &mut BTreeSet<VarName>) {
    match e {
        Expr::Var(v) => {
            if !bound.contains(v) {
                free.insert(v.clone());
            }
        }
        Expr::Const(_) | Expr::Bool(_) | Expr::None => {}
        Expr::Call { args, .. } => {
            for arg in args {
                expr_free_vars(arg, bound, free);
            }
        }
        Expr::Arithmetic { lhs, rhs, .. } | Expr::Comparison { lhs, rhs, .. } => {
            expr_free_vars(lhs, bound, free);
            expr_free_vars(rhs, bound, free);
        }
        Expr::If { condition, then, else_ } => {
            expr_free_vars(condition, bound, free);
            block_free_vars(then, bound, free);
            block_free_vars(else_, bound, free);
        }
        Expr::While { var, condition, body } => {
            let mark = bound.len();
            bound.push(var.clone());
            expr_free_vars(condition, bound, free);
            block_free_vars(body, bound, free);
            bound.truncate(mark);
        }
        Expr::For { lbound, ubound, body, .. } => {
            expr_free_vars(lbound, bound, free);
            expr_free_vars(ubound, bound, free);
            let mark = bound.len();
            bound.extend(e.binders().into_iter().cloned());
            block_free_vars(body, bound, free);
            bound.truncate(mark);
        }
    }
}

fn block_free_vars(b: &Block, bound: &mut Vec<VarName>, free: &mut BTreeSet<VarName>) {
    let mark = bound.len();
    for stmt in &b.stmts {
        expr_free_vars(stmt.expr(), bound, free);
        if let Some(to) = stmt.target() {
            bound.push(to.clone());
        }
    }
    if let Some(tail) = &b.tail {
        expr_free_vars(tail, bound, free);
    }
    bound.truncate(mark);
}

fn expr_variables(e: &Expr<Block>, out: &mut Vec<VarName>) {
    let note = |v: &VarName, out: &mut Vec<VarName>| {
        if !out.contains(v) {
            out.push(v.clone());
        }
    };
    for binder in e.binders() {
        note(binder, out);
    }
    match e {
        Expr::Var(v) => note(v, out),
        Expr::Const(_) | Expr::Bool(_) | Expr::None => {}
        Expr::Call { args, .. } => args.iter().for_each(|a| expr_variables(a, out)),
        Expr::Arithmetic { lhs, rhs, .. } | Expr::Comparison { lhs, rhs, .. } => {
            expr_variables(lhs, out);
            expr_variables(rhs, out);
        }
        Expr::If { condition, .. } | Expr::While { condition, .. } => expr_variables(condition, out),
        Expr::For { lbound, ubound, .. } => {
            expr_variables(lbound, out);
            expr_variables(ubound, out);
        }
    }
    e.for_each_hole(&mut |b: &Block| {
        for stmt in &b.stmts {
            if let Some(to) = stmt.target() {
                note(to, out);
            }
            expr_variables(stmt.expr(), out);
        }
        if let Some(tail) = &b.tail {
            expr_variables(tail, out);
        }
    });
}

/// A program under construction: an arena of insertion points reachable from
/// `root`, plus the variables in scope everywhere.
///
/// Content replaced by an update stays in the arena but is no longer
/// reachable; only reachable points are live.
#[derive(Clone, Debug)]
pub struct Program {
    points: Arena<InsertionPoint>,
    root: PoiId,
    free_vars: Vec<VarName>,
}

impl Program {
    pub fn new(free_vars: Vec<VarName>) -> Self {
        let mut points = Arena::new();
        let root = points.alloc(InsertionPoint::default());
        Self { points, root, free_vars }
    }

    pub fn root(&self) -> PoiId {
        self.root
    }

    pub fn free_vars(&self) -> &[VarName] {
        &self.free_vars
    }

    pub fn point(&self, id: PoiId) -> &InsertionPoint {
        &self.points[id]
    }

    pub(crate) fn point_mut(&mut self, id: PoiId) -> &mut InsertionPoint {
        &mut self.points[id]
    }

    /// Live insertion points in pre-order, root first. A point's position in
    /// this list is its index for the current program state.
    pub fn insertion_points(&self) -> Vec<PoiId> {
        let mut out = Vec::new();
        self.collect_points(self.root, &mut out);
        out
    }

    fn collect_points(&self, id: PoiId, out: &mut Vec<PoiId>) {
        out.push(id);
        let point = &self.points[id];
        for stmt in &point.stmts {
            stmt.expr().for_each_hole(&mut |h| self.collect_points(*h, out));
        }
        if let Some(tail) = &point.tail {
            tail.for_each_hole(&mut |h| self.collect_points(*h, out));
        }
    }

    /// Copy a value-form expression into the arena, allocating a fresh point
    /// for every hole it contains.
    pub(crate) fn embed_expr(&mut self, e: &Expr<Block>) -> Expr {
        e.map_holes(&mut |b| self.embed_block(b))
    }

    pub(crate) fn embed_stmt(&mut self, s: &Stmt<Block>) -> Stmt {
        s.map_holes(&mut |b| self.embed_block(b))
    }

    fn embed_block(&mut self, b: &Block) -> PoiId {
        let mut stmts = Vec::with_capacity(b.stmts.len());
        for stmt in &b.stmts {
            stmts.push(self.embed_stmt(stmt));
        }
        let tail = match &b.tail {
            Some(tail) => Some(self.embed_expr(tail)),
            None => None,
        };
        self.points.alloc(InsertionPoint { stmts, tail, filled: false })
    }

    /// Collapse the reachable part of the program back into value form.
    pub fn to_block(&self) -> Block {
        self.block_of(self.root)
    }

    pub fn block_of(&self, id: PoiId) -> Block {
        let point = &self.points[id];
        Block {
            stmts: point
                .stmts
                .iter()
                .map(|s| s.map_holes(&mut |h| self.block_of(*h)))
                .collect(),
            tail: point
                .tail
                .as_ref()
                .map(|t| Box::new(t.map_holes(&mut |h| self.block_of(*h)))),
        }
    }
}

impl Index<PoiId> for Program {
    type Output = InsertionPoint;

    fn index(&self, id: PoiId) -> &InsertionPoint {
        &self.points[id]
    }
}

impl PartialEq for Program {
    fn eq(&self, other: &Self) -> bool {
        self.free_vars == other.free_vars && self.to_block() == other.to_block()
    }
}

impl Eq for Program {}

impl fmt::Display for ArithmeticOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArithmeticOp::Plus => "+",
            ArithmeticOp::Minus => "-",
            ArithmeticOp::Multiply => "*",
            ArithmeticOp::Divide => "/",
        })
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ComparisonOp::LessThan => "<",
            ComparisonOp::LessThanEqual => "<=",
            ComparisonOp::Equal => "==",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn while_j() -> Skeleton {
        Expr::While {
            var: VarName::new("j"),
            condition: Box::new(Expr::comparison(ComparisonOp::LessThan, Expr::var("j"), Expr::Const(1))),
            body: Block::default(),
        }
    }

    #[test]
    fn skeleton_holes_are_collected_in_preorder() {
        let nested = Expr::If {
            condition: Box::new(Expr::Bool(true)),
            then: Block::new(Vec::new(), Some(while_j())),
            else_: Block::default(),
        };
        let points = nested.insertion_points();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].tail.as_deref(), Some(&while_j()));
        assert!(points[1].is_dangling());
        assert!(points[2].is_dangling());
    }

    #[test]
    fn loop_variables_are_not_free() {
        let body = Block::new(
            vec![Stmt::Assign { to: Some(VarName::new("t")), val: Expr::var("n") }],
            Some(Expr::arithmetic(ArithmeticOp::Plus, Expr::var("t"), Expr::var("k"))),
        );
        let e = Expr::For {
            var: VarName::new("k"),
            lbound: Box::new(Expr::Const(0)),
            ubound: Box::new(Expr::var("m")),
            body,
            state: None,
        };
        let free: Vec<_> = e.free_variables().into_iter().map(|v| v.to_string()).collect();
        assert_eq!(free, vec!["m", "n"]);
        assert!(while_j().free_variables().is_empty());
    }

    #[test]
    fn variables_lists_binders_first() {
        let e = Expr::For {
            var: VarName::new("k1"),
            lbound: Box::new(Expr::Const(0)),
            ubound: Box::new(Expr::Const(1)),
            body: Block::default(),
            state: Some(VarName::new("k2")),
        };
        assert_eq!(e.variables(), vec![VarName::new("k1"), VarName::new("k2")]);
        assert_eq!(while_j().variables(), vec![VarName::new("j")]);
    }

    #[test]
    fn signatures() {
        assert_eq!(while_j().signature().required_arity(), 1);
        let call: Skeleton = Expr::call("f", vec![Expr::var("a"), Expr::var("b")]);
        assert_eq!(call.signature().required_arity(), 2);
        assert_eq!(Skeleton::Const(3).signature().ret, Shape::Concrete("int".into()));

        let mut sig = Signature::wildcard(3);
        sig.defaulted = 1;
        assert_eq!(sig.required_arity(), 2);
    }

    #[test]
    fn blocks_deserialize_with_statements() {
        let b: Block = toml::from_str(
            r#"
stmts = [{ Assign = { val = { Call = { func = "reset" } } } }, { Return = { Var = "x" } }]
tail = { For = { var = "k", lbound = { Const = 0 }, ubound = { Var = "n" }, body = {} } }
"#,
        )
        .unwrap();
        assert_eq!(b.stmts[0], Stmt::Assign { to: None, val: Expr::call("reset", Vec::new()) });
        assert_eq!(b.stmts[1], Stmt::Return(Expr::var("x")));
        let Some(tail) = &b.tail else { panic!("tail missing") };
        assert_eq!(tail.free_variables().into_iter().collect::<Vec<_>>(), vec![VarName::new("n")]);
        assert_eq!(tail.binders(), vec![&VarName::new("k")]);
    }

    #[test]
    fn embedding_roundtrips_through_the_arena() {
        let mut p = Program::new(vec![VarName::new("x")]);
        let tail = p.embed_expr(&while_j());
        let root = p.root();
        p.point_mut(root).tail = Some(tail);

        assert_eq!(p.insertion_points().len(), 2);
        assert_eq!(p.to_block(), Block::new(Vec::new(), Some(while_j())));
    }
}
