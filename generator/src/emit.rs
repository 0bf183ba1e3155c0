use crate::tree::{Expr, PoiId, Program, Stmt};

pub struct Emitter {
    indent: usize,
    output: String
}

impl Emitter {
    pub fn new() -> Self {
        Self {
            indent: 0,
            output: String::new()
        }
    }

    pub fn emit_inline(&mut self, s: &str) {
        self.output.push_str(s);
    }

    pub fn emit_block(&mut self, s: &str) {
        if !self.output.is_empty() {
            self.output.push('\n');
        }
        for _ in 0..self.indent {
            self.output.push_str("    ");
        }
        self.output.push_str(s);
    }

    pub fn enter_block(&mut self) {
        self.indent += 1
    }

    pub fn exit_block(&mut self) {
        self.indent -= 1
    }

    pub fn finish(self) -> String {
        self.output
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

pub trait Emit {
    fn emit(&self, e: &mut Emitter, program: &Program);
}

/// Render a program as pseudo-Python source.
pub fn render(program: &Program) -> String {
    let mut e = Emitter::new();
    program.emit(&mut e, program);
    e.finish()
}

impl Emit for Program {
    fn emit(&self, e: &mut Emitter, _program: &Program) {
        let params: Vec<&str> = self.free_vars().iter().map(|v| v.as_str()).collect();
        e.emit_block(&format!("def main({}):", params.join(", ")));
        e.enter_block();
        self.root().emit(e, self);
        e.exit_block();
    }
}

impl Emit for PoiId {
    fn emit(&self, e: &mut Emitter, program: &Program) {
        let point = &program[*self];
        if point.stmts.is_empty() && point.tail.is_none() {
            e.emit_block("pass");
            return;
        }
        for stmt in &point.stmts {
            stmt.emit(e, program);
        }
        if let Some(tail) = &point.tail {
            tail.emit(e, program);
        }
    }
}

impl Emit for Stmt {
    fn emit(&self, e: &mut Emitter, program: &Program) {
        match self {
            Stmt::Assign { to: None, val } => val.emit(e, program),
            Stmt::Assign { to: Some(to), val } => {
                e.emit_block(&format!("{to} = "));
                e.emit_inline(&inline(val, program));
            }
            Stmt::Return(val) => {
                e.emit_block("return ");
                e.emit_inline(&inline(val, program));
            }
        }
    }
}

impl Emit for Expr {
    /// Expression in statement position: control flow opens a block,
    /// anything else goes on its own line.
    fn emit(&self, e: &mut Emitter, program: &Program) {
        match self {
            Expr::If { condition, then, else_ } => {
                e.emit_block(&format!("if {}:", inline(condition, program)));
                body(e, program, *then);
                e.emit_block("else:");
                body(e, program, *else_);
            }
            Expr::While { condition, body: b, .. } => {
                e.emit_block(&format!("while {}:", inline(condition, program)));
                body(e, program, *b);
            }
            Expr::For { var, lbound, ubound, body: b, state } => {
                let mut header = format!(
                    "for {var} in range({}, {}):",
                    inline(lbound, program),
                    inline(ubound, program)
                );
                if let Some(state) = state {
                    header.push_str(&format!("  # state: {state}"));
                }
                e.emit_block(&header);
                body(e, program, *b);
            }
            _ => e.emit_block(&inline(self, program)),
        }
    }
}

fn body(e: &mut Emitter, program: &Program, id: PoiId) {
    e.enter_block();
    id.emit(e, program);
    e.exit_block();
}

/// Single-line form of an expression. Control flow nested in expression
/// position uses a compact call-like notation.
fn inline(expr: &Expr, program: &Program) -> String {
    match expr {
        Expr::Const(c) => c.to_string(),
        Expr::Var(v) => v.to_string(),
        Expr::Bool(true) => "True".to_string(),
        Expr::Bool(false) => "False".to_string(),
        Expr::None => "None".to_string(),
        Expr::Call { func, args } => {
            let args: Vec<String> = args.iter().map(|a| inline(a, program)).collect();
            format!("{func}({})", args.join(", "))
        }
        Expr::Arithmetic { op, lhs, rhs } => {
            format!("{} {op} {}", operand(lhs, program), operand(rhs, program))
        }
        Expr::Comparison { op, lhs, rhs } => {
            format!("{} {op} {}", operand(lhs, program), operand(rhs, program))
        }
        Expr::If { condition, then, else_ } => format!(
            "cond({}, {}, {})",
            inline(condition, program),
            inline_block(*then, program),
            inline_block(*else_, program)
        ),
        Expr::While { var, condition, body } => format!(
            "while_loop({var}, {}, {})",
            inline(condition, program),
            inline_block(*body, program)
        ),
        Expr::For { var, lbound, ubound, body, .. } => format!(
            "for_loop({var}, {}, {}, {})",
            inline(lbound, program),
            inline(ubound, program),
            inline_block(*body, program)
        ),
    }
}

fn operand(expr: &Expr, program: &Program) -> String {
    match expr {
        Expr::Arithmetic { .. } | Expr::Comparison { .. } => format!("({})", inline(expr, program)),
        _ => inline(expr, program),
    }
}

fn inline_block(id: PoiId, program: &Program) -> String {
    let point = &program[id];
    let mut parts: Vec<String> = point
        .stmts
        .iter()
        .map(|s| match s {
            Stmt::Assign { to: None, val } => inline(val, program),
            Stmt::Assign { to: Some(to), val } => format!("{to} = {}", inline(val, program)),
            Stmt::Return(val) => format!("return {}", inline(val, program)),
        })
        .collect();
    if let Some(tail) = &point.tail {
        parts.push(inline(tail, program));
    }
    format!("{{{}}}", parts.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::symbol::VarName;
    use crate::tree::{Block, ComparisonOp};

    fn call_on(var: &str) -> Stmt<Block> {
        Stmt::Assign { to: None, val: Expr::call("inc", vec![Expr::var(var)]) }
    }

    #[test]
    fn empty_program_renders_pass() {
        let p = Program::new(vec![VarName::new("x")]);
        assert_eq!(render(&p), "def main(x):\n    pass");
    }

    #[test]
    fn loops_open_indented_blocks() {
        let mut b = Builder::new(vec![VarName::new("x")]);
        let skeleton = Expr::While {
            var: VarName::new("j"),
            condition: Box::new(Expr::comparison(ComparisonOp::LessThan, Expr::var("j"), Expr::Const(1))),
            body: Block::default(),
        };
        b.update(0, &[call_on("x")], Some(&skeleton)).unwrap();
        b.update(1, &[call_on("j")], Some(&Expr::increment(VarName::new("x")))).unwrap();

        let expected = "\
def main(x):
    inc(x)
    while j < 1:
        inc(j)
        x + 1";
        assert_eq!(render(b.program()), expected);
    }

    #[test]
    fn nested_control_flow_in_expression_position() {
        let mut b = Builder::new(Vec::new());
        let value = Expr::For {
            var: VarName::new("k"),
            lbound: Box::new(Expr::Const(0)),
            ubound: Box::new(Expr::Const(2)),
            body: Block::new(Vec::new(), Some(Expr::var("k"))),
            state: None,
        };
        b.update(0, &[Stmt::Assign { to: Some(VarName::new("t")), val: value }], None).unwrap();
        assert_eq!(render(b.program()), "def main():\n    t = for_loop(k, 0, 2, {k})");
    }
}
