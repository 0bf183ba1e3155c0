use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use cf_gen::{Enumerator, Library};
use log::info;

/// `I/N`: the `I`-th of `N` slices of the combination space, zero based.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Partition {
    pub part: usize,
    pub parts: usize,
}

impl FromStr for Partition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (part, parts) = s.split_once('/').ok_or(format!("expected I/N, got `{s}`"))?;
        let part = part.trim().parse().map_err(|e| format!("bad partition index: {e}"))?;
        let parts = parts.trim().parse().map_err(|e| format!("bad partition count: {e}"))?;
        Ok(Self { part, parts })
    }
}

/// Library from `path`, or the bundled sample when no path is given.
pub fn load_library(path: Option<&Path>) -> Result<Library> {
    match path {
        Some(path) => {
            let library = Library::load(path).with_context(|| format!("loading {}", path.display()))?;
            info!(
                "Loaded {}: {} free variables, {} operators, {} skeletons",
                path.display(),
                library.free_vars.len(),
                library.operators.len(),
                library.skeletons.len()
            );
            Ok(library)
        }
        None => {
            info!("No library given, using the sample library");
            Ok(Library::sample())
        }
    }
}

pub fn enumerator(library: &Library, partition: Option<Partition>) -> Result<Enumerator<'_>> {
    Ok(match partition {
        Some(Partition { part, parts }) => Enumerator::partition(library, part, parts)?,
        None => Enumerator::new(library),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_parses() {
        assert_eq!("2/8".parse(), Ok(Partition { part: 2, parts: 8 }));
        assert_eq!(" 0 / 1 ".parse(), Ok(Partition { part: 0, parts: 1 }));
        assert!("3".parse::<Partition>().is_err());
        assert!("a/2".parse::<Partition>().is_err());
    }

    #[test]
    fn missing_library_falls_back_to_sample() {
        assert_eq!(load_library(None).unwrap(), Library::sample());
    }
}
