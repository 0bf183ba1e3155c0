use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GenError, Result};
use crate::symbol::{FuncName, VarName};
use crate::tree::{Block, ComparisonOp, Expr, Signature, Skeleton};

/// A callable the enumerator inserts as a statement.
///
/// A call receives the first `signature.required_arity()` variables chosen
/// for its slot. An operator whose slots are all defaulted is called with no
/// arguments; the slot's variables then only reach the trailing increment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    pub name: FuncName,
    pub signature: Signature,
}

impl Operator {
    pub fn new(name: &str, signature: Signature) -> Self {
        Self { name: FuncName::new(name), signature }
    }
}

/// Everything the enumerator draws from: variables in scope everywhere, the
/// operators to call and the control-flow skeletons to embed.
///
/// ```toml
/// free_vars = ["X"]
///
/// [[operators]]
/// name = "qml.X"
/// signature = { args = ["*"], ret = "*" }
///
/// [[skeletons]]
/// While = { var = "j", condition = { Var = "j" }, body = {} }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Library {
    pub free_vars: Vec<VarName>,
    pub operators: Vec<Operator>,
    pub skeletons: Vec<Skeleton>,
}

impl Library {
    pub fn new(free_vars: Vec<VarName>, operators: Vec<Operator>, skeletons: Vec<Skeleton>) -> Self {
        Self { free_vars, operators, skeletons }
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| GenError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// A small library of two loops and two single-qubit gates.
    pub fn sample() -> Self {
        let j = VarName::new("j");
        let while_j = Expr::While {
            var: j.clone(),
            condition: Box::new(Expr::comparison(ComparisonOp::LessThan, Expr::Var(j), Expr::Const(1))),
            body: Block::default(),
        };
        let for_k = Expr::For {
            var: VarName::new("k1"),
            lbound: Box::new(Expr::Const(0)),
            ubound: Box::new(Expr::Const(1)),
            body: Block::default(),
            state: Some(VarName::new("k2")),
        };
        Self::new(
            vec![VarName::new("X")],
            vec![
                Operator::new("qml.X", Signature::wildcard(1)),
                Operator::new("qml.H", Signature::wildcard(1)),
            ],
            vec![while_j, for_k],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Shape;

    const SAMPLE: &str = include_str!("../libraries/sample.toml");

    #[test]
    fn sample_library_parses_from_toml() {
        let lib = Library::from_toml_str(SAMPLE).unwrap();
        assert_eq!(lib, Library::sample());
    }

    #[test]
    fn shapes_and_defaults() {
        let lib = Library::from_toml_str(
            r#"
[[operators]]
name = "rot"
signature = { args = ["float", "*", "*"], ret = "*", defaulted = 2 }
"#,
        )
        .unwrap();
        let sig = &lib.operators[0].signature;
        assert_eq!(sig.args[0], Shape::Concrete("float".to_string()));
        assert_eq!(sig.args[1], Shape::Any);
        assert_eq!(sig.required_arity(), 1);
        assert!(lib.free_vars.is_empty());
        assert!(lib.skeletons.is_empty());
    }

    #[test]
    fn nested_blocks_and_unit_variants() {
        let lib = Library::from_toml_str(
            r#"
[[skeletons]]
[skeletons.If]
condition = "None"
then = { tail = { While = { var = "i", condition = { Bool = true }, body = {} } } }
else_ = { stmts = [{ Assign = { to = "t", val = { Const = 2 } } }] }
"#,
        )
        .unwrap();
        let skeleton = &lib.skeletons[0];
        assert_eq!(skeleton.insertion_points().len(), 3);
        assert_eq!(skeleton.variables(), vec![VarName::new("i"), VarName::new("t")]);
    }

    #[test]
    fn malformed_library_is_a_config_error() {
        let err = Library::from_toml_str("operators = 3").unwrap_err();
        assert!(matches!(err, GenError::Config(_)));
    }
}
