use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Name of a variable. Cheap to clone and compared by value.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VarName(Arc<str>);

/// Name of a function or operator. Lives in its own namespace, so a
/// `FuncName` never compares equal to a `VarName` with the same spelling.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FuncName(Arc<str>);

macro_rules! name_impls {
    ($name:ident) => {
	impl $name {
	    pub fn new(s: &str) -> Self {
		Self(Arc::from(s))
	    }

	    pub fn as_str(&self) -> &str {
		&self.0
	    }
	}

	impl From<&str> for $name {
	    fn from(s: &str) -> Self {
		Self::new(s)
	    }
	}

	impl From<String> for $name {
	    fn from(s: String) -> Self {
		Self(Arc::from(s))
	    }
	}

	impl fmt::Display for $name {
	    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	    }
	}
    };
}

name_impls!(VarName);
name_impls!(FuncName);
