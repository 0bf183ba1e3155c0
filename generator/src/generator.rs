use log::{debug, info, trace};

use crate::builder::Builder;
use crate::config::Library;
use crate::error::{GenError, Result};
use crate::fill::Fillable;
use crate::symbol::VarName;
use crate::tree::{Expr, Program, Skeleton, Stmt};

/// Every insertion consumes one variable for the operator call and one for
/// the trailing increment.
pub const MIN_BINDING_ARITY: usize = 2;

/// Why a combination did not produce a program.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// The point ordering reaches an index that does not exist yet.
    PointNotLive { index: usize },
    /// The index now addresses a point an earlier slot already filled.
    PointAlreadyFilled { index: usize },
    /// A chosen variable is not visible at the point.
    OutOfScope { index: usize, var: VarName },
    /// The slot's skeleton references a variable not visible at the point.
    SkeletonOutOfScope { index: usize, var: VarName },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub visited: u64,
    pub accepted: u64,
    pub not_live: u64,
    pub already_filled: u64,
    pub out_of_scope: u64,
    pub skeleton_out_of_scope: u64,
}

impl Stats {
    fn reject(&mut self, rejection: &Rejection) {
        match rejection {
            Rejection::PointNotLive { .. } => self.not_live += 1,
            Rejection::PointAlreadyFilled { .. } => self.already_filled += 1,
            Rejection::OutOfScope { .. } => self.out_of_scope += 1,
            Rejection::SkeletonOutOfScope { .. } => self.skeleton_out_of_scope += 1,
        }
    }

    pub fn rejected(&self) -> u64 {
        self.visited - self.accepted
    }
}

/// Odometer over a mixed-radix number, last digit fastest.
#[derive(Clone, Debug)]
struct Cursor {
    radices: Vec<usize>,
    digits: Vec<usize>,
    limit_reached: bool,
}

impl Cursor {
    fn new(radices: Vec<usize>) -> Self {
        Self {
            limit_reached: radices.contains(&0),
            digits: vec![0; radices.len()],
            radices,
        }
    }

    fn count(&self) -> Option<u128> {
        self.radices
            .iter()
            .try_fold(1u128, |acc, r| acc.checked_mul(*r as u128))
    }

    fn seek(&mut self, mut index: u128) {
        if self.count().is_some_and(|n| index >= n) {
            self.limit_reached = true;
            return;
        }
        for (digit, radix) in self.digits.iter_mut().zip(&self.radices).rev() {
            let radix = *radix as u128;
            *digit = (index % radix) as usize;
            index /= radix;
        }
    }

    fn increment(&mut self) {
        if self.limit_reached {
            return;
        }

        for (digit, radix) in self.digits.iter_mut().zip(&self.radices).rev() {
            if *digit + 1 < *radix {
                *digit += 1;
                return;
            }

            *digit = 0;
        }

        self.limit_reached = true;
    }
}

/// Decode a Lehmer code into the permutation of `0..code.len()` it ranks.
fn permutation(code: &[usize]) -> Vec<usize> {
    let mut pool: Vec<usize> = (0..code.len()).collect();
    code.iter().map(|d| pool.remove(*d)).collect()
}

/// Radices of the Lehmer code of a permutation of `n` elements.
fn lehmer_radices(n: usize) -> impl Iterator<Item = usize> {
    (1..=n).rev()
}

/// One fully specified candidate.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Combination {
    /// Permutation of the skeleton library.
    skeletons: Vec<usize>,
    /// Permutation of point indices, one per slot.
    points: Vec<usize>,
    /// Operator per slot.
    operators: Vec<usize>,
    /// `arity` pool indices per slot, flattened.
    bindings: Vec<usize>,
}

/// Lazily enumerates every scope-valid program that can be built from a
/// [`Library`].
///
/// The order is lexicographic over (skeleton permutation, point permutation,
/// operator per slot, variable tuple per slot) and depends only on the
/// library, so two runs over the same library agree element by element.
pub struct Enumerator<'a> {
    library: &'a Library,
    pool: Vec<VarName>,
    points: usize,
    arity: usize,
    cursor: Cursor,
    position: u128,
    end: Option<u128>,
    stats: Stats,
    done: bool,
}

impl<'a> Enumerator<'a> {
    pub fn new(library: &'a Library) -> Self {
        let points = 1 + library
            .skeletons
            .iter()
            .map(|s| s.insertion_points().len())
            .sum::<usize>();

        let mut pool = library.free_vars.clone();
        for skeleton in &library.skeletons {
            pool.extend(skeleton.variables());
        }

        let max_op = library
            .operators
            .iter()
            .map(|o| o.signature.required_arity())
            .max()
            .unwrap_or(0);
        let max_skeleton = library
            .skeletons
            .iter()
            .map(|s| s.signature().required_arity())
            .max()
            .unwrap_or(0);
        let arity = (max_op + max_skeleton).max(MIN_BINDING_ARITY);

        let radices = lehmer_radices(library.skeletons.len())
            .chain(lehmer_radices(points))
            .chain(std::iter::repeat(library.operators.len()).take(points))
            .chain(std::iter::repeat(pool.len()).take(points * arity))
            .collect();
        let cursor = Cursor::new(radices);

        info!(
            "Enumerating {} skeletons, {} operators: {points} points, {} pool variables, arity {arity}, {} combinations",
            library.skeletons.len(),
            library.operators.len(),
            pool.len(),
            cursor
                .count()
                .map_or_else(|| "unbounded".to_string(), |n| n.to_string()),
        );

        Self {
            library,
            pool,
            points,
            arity,
            cursor,
            position: 0,
            end: None,
            stats: Stats::default(),
            done: false,
        }
    }

    /// The `part`-th of `parts` contiguous slices of the combination space.
    /// Concatenating every slice in order gives the full sequence.
    pub fn partition(library: &'a Library, part: usize, parts: usize) -> Result<Self> {
        if part >= parts {
            return Err(GenError::PartitionOutOfRange { part, parts });
        }
        let mut e = Self::new(library);
        let count = e.combination_count().ok_or(GenError::UnboundedSpace)?;
        let chunk = count.div_ceil(parts as u128);
        let start = chunk.saturating_mul(part as u128).min(count);
        let end = start.saturating_add(chunk).min(count);
        debug!("Partition {part}/{parts}: combinations {start}..{end}");

        e.cursor.seek(start);
        e.position = start;
        e.end = Some(end);
        Ok(e)
    }

    /// Total insertion points: one per skeleton hole plus the root.
    pub fn points(&self) -> usize {
        self.points
    }

    /// Candidate variables, free variables first.
    pub fn pool(&self) -> &[VarName] {
        &self.pool
    }

    /// Variables chosen per slot.
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Size of the combination space, `None` if it does not fit in a `u128`.
    pub fn combination_count(&self) -> Option<u128> {
        self.cursor.count()
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    fn combination(&self) -> Combination {
        let digits = &self.cursor.digits;
        let (skeletons, rest) = digits.split_at(self.library.skeletons.len());
        let (points, rest) = rest.split_at(self.points);
        let (operators, bindings) = rest.split_at(self.points);
        Combination {
            skeletons: permutation(skeletons),
            points: permutation(points),
            operators: operators.to_vec(),
            bindings: bindings.to_vec(),
        }
    }

    fn attempt(&self, c: &Combination) -> Result<Result<Program, Rejection>> {
        let library = self.library;
        let mut builder = Builder::new(library.free_vars.clone());

        for (slot, &index) in c.points.iter().enumerate() {
            let operator = &library.operators[c.operators[slot]];
            let binding: Vec<&VarName> = c.bindings[slot * self.arity..(slot + 1) * self.arity]
                .iter()
                .map(|v| &self.pool[*v])
                .collect();
            let skeleton = c.skeletons.get(slot).map(|s| &library.skeletons[*s]);

            if let Err(rejection) = validate(&builder, index, &binding, skeleton)? {
                return Ok(Err(rejection));
            }

            let n_args = operator.signature.required_arity();
            debug_assert!(n_args <= binding.len(), "binding narrower than `{}`", operator.name);
            let call = Expr::Call {
                func: operator.name.clone(),
                args: binding[..n_args].iter().map(|v| Expr::Var((*v).clone())).collect(),
            };
            let stmt = Stmt::Assign { to: None, val: call };

            let increment = Expr::increment(binding[1].clone());
            let tail = match skeleton {
                Some(s) => s.clone().saturate(&increment).1,
                None => increment,
            };

            builder.update(index, &[stmt], Some(&tail))?;
        }

        Ok(Ok(builder.finish()))
    }
}

/// Check that slot content may go into point `index` of the builder's
/// current program.
///
/// The outer `Result` carries contract violations, the inner one the
/// expected rejections of blind enumeration.
pub fn validate(
    builder: &Builder,
    index: usize,
    binding: &[&VarName],
    skeleton: Option<&Skeleton>,
) -> Result<Result<(), Rejection>> {
    let Some(id) = builder.point(index) else {
        return Ok(Err(Rejection::PointNotLive { index }));
    };
    if builder.is_filled(id) {
        return Ok(Err(Rejection::PointAlreadyFilled { index }));
    }

    let scope = builder.scope_at(index)?;
    if let Some(var) = binding.iter().find(|v| !scope.contains(**v)) {
        return Ok(Err(Rejection::OutOfScope { index, var: (*var).clone() }));
    }
    if let Some(var) = skeleton.and_then(|s| s.free_variables().into_iter().find(|v| !scope.contains(v))) {
        return Ok(Err(Rejection::SkeletonOutOfScope { index, var }));
    }

    Ok(Ok(()))
}

impl Iterator for Enumerator<'_> {
    type Item = Result<Program>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let past_end = self.end.is_some_and(|end| self.position >= end);
            if self.cursor.limit_reached || past_end {
                self.done = true;
                debug!("Enumeration finished: {:?}", self.stats);
                return None;
            }

            let combination = self.combination();
            self.cursor.increment();
            self.position = self.position.saturating_add(1);
            self.stats.visited += 1;

            match self.attempt(&combination) {
                Ok(Ok(program)) => {
                    self.stats.accepted += 1;
                    debug!("Accept: {combination:?}");
                    return Some(Ok(program));
                }
                Ok(Err(rejection)) => {
                    trace!("Reject: {rejection:?}");
                    self.stats.reject(&rejection);
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
