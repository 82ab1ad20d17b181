// Copyright 2025 Irreducible Inc.
use std::{
	cell::{RefCell, RefMut},
	rc::Rc,
};

use ark_ff::PrimeField;
use trellis_core::ConstraintSystem;

use crate::{
	compiler::{
		circuit::Circuit,
		emitter::GateEmitter,
		equivalence::EquivalenceEngine,
		expr::ExprArena,
		gate::Relation,
		lincom::LinearCombination,
		namespace::{Namespace, NamespaceTree},
		optimize::{GateList, PassContext, Pipeline},
		safety::SafetyCheck,
		var_arena::{Var, VarArena},
	},
	error::CompileError,
};

pub mod circuit;
mod dump;
mod emitter;
mod equivalence;
pub mod export;
mod expr;
mod gate;
mod lincom;
mod namespace;
pub mod optimize;
mod packing;
mod safety;
mod solver;
#[cfg(test)]
mod tests;
mod var_arena;

pub use expr::Expr;
pub use optimize::{OptimizationLevel, PassKind};
pub use var_arena::VarKind;

/// Options for the compiler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Options {
	/// Which passes the optimization pipeline runs.
	pub level: OptimizationLevel,
	/// Lets two independent linear halves over at most two variables share a row.
	pub enable_batching: bool,
	/// Upper bound on the number of iterations over the pass list.
	pub max_passes: usize,
	/// Compare the optimized gate list with the recorded one on random assignments.
	pub enable_safety_check: bool,
	/// Random assignments per direction of the safety check.
	pub safety_samples: usize,
	/// Seed of the safety check RNG.
	pub safety_seed: u64,
}

impl Default for Options {
	fn default() -> Self {
		Self {
			level: OptimizationLevel::Aggressive,
			enable_batching: true,
			max_passes: 8,
			enable_safety_check: true,
			safety_samples: 4,
			safety_seed: 42,
		}
	}
}

impl Options {
	/// Default options, overridden by the `TRELLIS_*` environment variables.
	///
	/// - `TRELLIS_OPT_LEVEL`: `none`, `basic` or `aggressive`.
	/// - `TRELLIS_NO_BATCHING`: disables batching when set.
	/// - `TRELLIS_MAX_PASSES`: iteration bound of the pipeline.
	/// - `TRELLIS_NO_SAFETY_CHECK`: disables the safety check when set.
	///
	/// Unparsable values are ignored with a warning.
	pub fn from_env() -> Self {
		let mut opts = Self::default();
		if let Ok(level) = std::env::var("TRELLIS_OPT_LEVEL") {
			match level.parse() {
				Ok(level) => opts.level = level,
				Err(err) => tracing::warn!(%err, "ignoring TRELLIS_OPT_LEVEL"),
			}
		}
		if std::env::var("TRELLIS_NO_BATCHING").is_ok() {
			opts.enable_batching = false;
		}
		if let Ok(max_passes) = std::env::var("TRELLIS_MAX_PASSES") {
			match max_passes.parse() {
				Ok(max_passes) => opts.max_passes = max_passes,
				Err(err) => tracing::warn!(%err, %max_passes, "ignoring TRELLIS_MAX_PASSES"),
			}
		}
		if std::env::var("TRELLIS_NO_SAFETY_CHECK").is_ok() {
			opts.enable_safety_check = false;
		}
		opts
	}
}

pub(crate) struct Shared<F: PrimeField> {
	arena: VarArena,
	exprs: ExprArena<F>,
	equivalence: EquivalenceEngine<F>,
	emitter: GateEmitter<F>,
	namespaces: NamespaceTree,
	opts: Options,
	pipeline: Pipeline<F>,
	/// The first contradiction found while recording. Reported by [`CircuitBuilder::build`].
	error: Option<CompileError>,
}

impl<F: PrimeField> Shared<F> {
	fn fresh(&mut self) -> Var {
		self.arena.allocate(VarKind::Internal)
	}

	fn record(&mut self, err: CompileError) {
		tracing::debug!(%err, "contradiction recorded");
		if self.error.is_none() {
			self.error = Some(err);
		}
	}

	/// Placeholder result of an operation that failed. The build will fail anyway.
	fn poisoned(&mut self, err: CompileError) -> Expr {
		self.record(err);
		self.exprs.constant(F::zero())
	}

	fn qualified(&self, origin: Namespace, name: &str) -> String {
		let path = self.namespaces.full_name(origin);
		if path.is_empty() {
			name.to_string()
		} else {
			format!("{path}.{name}")
		}
	}

	/// The canonical combination an expression denotes.
	fn lincom(&mut self, expr: Expr) -> LinearCombination<F> {
		let lc = self.exprs.reduce(expr);
		self.equivalence.canonicalize(&lc)
	}

	/// Like [`lincom`](Self::lincom) for a multiplication operand. Constant annotations of the
	/// operand's variables are revoked first, so the product keeps constraining them.
	fn operand(&mut self, expr: Expr) -> LinearCombination<F> {
		let lc = self.exprs.reduce(expr);
		for var in lc.vars() {
			self.equivalence.revoke(var);
		}
		self.equivalence.canonicalize(&lc)
	}

	/// Reduces `lc` to at most one variable, introducing an internal variable for it if needed.
	fn affine(
		&mut self,
		origin: Namespace,
		lc: LinearCombination<F>,
	) -> Result<LinearCombination<F>, CompileError> {
		if lc.n_vars() <= 1 {
			return Ok(lc);
		}
		let sealed = self.materialize(origin, &lc)?;
		Ok(LinearCombination::var(sealed))
	}

	/// Emits `lc - s = 0` for a fresh internal `s`.
	fn materialize(
		&mut self,
		origin: Namespace,
		lc: &LinearCombination<F>,
	) -> Result<Var, CompileError> {
		let sealed = self.fresh();
		let relation = Relation::linear(lc.sub(&LinearCombination::var(sealed)));
		self.emit(origin, &relation)?;
		Ok(sealed)
	}

	fn emit(&mut self, origin: Namespace, relation: &Relation<F>) -> Result<usize, CompileError> {
		let arena = &mut self.arena;
		self.emitter
			.emit_relation(origin, relation, || arena.allocate(VarKind::Internal))
	}

	/// Emits `a·b = rhs` where `a` and `b` are affine in one variable each.
	///
	/// `rhs` is sealed first when the relation would otherwise not fit one half.
	fn emit_product(
		&mut self,
		origin: Namespace,
		a: &LinearCombination<F>,
		b: &LinearCombination<F>,
		rhs: LinearCombination<F>,
	) -> Result<(), CompileError> {
		let rhs = if product_relation(a, b, &rhs).fits() {
			rhs
		} else {
			LinearCombination::var(self.materialize(origin, &rhs)?)
		};
		if let (Some(x), Some(y)) = (a.as_var(), b.as_var()) {
			return self.emitter.emit_bilinear(origin, x, y, &rhs);
		}
		self.emit(origin, &product_relation(a, b, &rhs))?;
		Ok(())
	}

	fn mul(&mut self, origin: Namespace, a: Expr, b: Expr) -> Result<Expr, CompileError> {
		// A literal constant operand makes this a linear operation.
		if let Some(k) = self.exprs.reduce(a).as_constant() {
			return Ok(self.exprs.scale(k, b));
		}
		if let Some(k) = self.exprs.reduce(b).as_constant() {
			return Ok(self.exprs.scale(k, a));
		}

		let la = self.operand(a);
		let lb = self.operand(b);
		if let Some(k) = la.as_constant() {
			return Ok(self.exprs.from_lincom(&lb.scale(k)));
		}
		if let Some(k) = lb.as_constant() {
			return Ok(self.exprs.from_lincom(&la.scale(k)));
		}
		let la = self.affine(origin, la)?;
		let lb = self.affine(origin, lb)?;
		let product = self.fresh();
		self.emit_product(origin, &la, &lb, LinearCombination::var(product))?;
		Ok(self.exprs.var(product))
	}

	fn inv(&mut self, origin: Namespace, a: Expr) -> Result<Expr, CompileError> {
		let la = self.operand(a);
		if let Some(k) = la.as_constant() {
			return match k.inverse() {
				Some(inv) => Ok(self.exprs.constant(inv)),
				None => Err(CompileError::UnsatisfiableConstraint {
					name: self.qualified(origin, "inv"),
				}),
			};
		}
		let la = self.affine(origin, la)?;
		let inverse = self.fresh();
		self.emit_product(
			origin,
			&la,
			&LinearCombination::var(inverse),
			LinearCombination::constant(F::one()),
		)?;
		Ok(self.exprs.var(inverse))
	}

	fn div(&mut self, origin: Namespace, a: Expr, b: Expr) -> Result<Expr, CompileError> {
		let lb = self.operand(b);
		if let Some(k) = lb.as_constant() {
			return match k.inverse() {
				Some(inv) => Ok(self.exprs.scale(inv, a)),
				None => Err(CompileError::UnsatisfiableConstraint {
					name: self.qualified(origin, "div"),
				}),
			};
		}
		let la = self.lincom(a);
		let lb = self.affine(origin, lb)?;
		let quotient = self.fresh();
		self.emit_product(origin, &lb, &LinearCombination::var(quotient), la)?;
		Ok(self.exprs.var(quotient))
	}

	fn seal(&mut self, origin: Namespace, a: Expr) -> Result<Expr, CompileError> {
		let lc = self.lincom(a);
		if let Some(k) = lc.as_constant() {
			return Ok(self.exprs.constant(k));
		}
		if let Some(var) = lc.as_var() {
			return Ok(self.exprs.var(var));
		}
		let sealed = self.materialize(origin, &lc)?;
		Ok(self.exprs.var(sealed))
	}

	/// Records `d = 0` on behalf of the assertion `ns`.
	fn assert_zero(&mut self, ns: Namespace, d: LinearCombination<F>) -> Result<(), CompileError> {
		if let Some(k) = d.as_constant() {
			if k.is_zero() {
				return Ok(());
			}
			return Err(CompileError::UnsatisfiableConstraint {
				name: self.namespaces.full_name(ns),
			});
		}

		if let Some((coeff, var, k)) = d.as_affine() {
			let value = coeff.inverse().map(|inv| -k * inv);
			if value.is_some_and(|value| !self.equivalence.annotate(var, value)) {
				return Err(CompileError::UnsatisfiableConstraint {
					name: self.namespaces.full_name(ns),
				});
			}
			self.emit(ns, &Relation::linear(d))?;
			return Ok(());
		}

		// A scalar multiple of `a - b` normalizes to exactly `a - b`, the only shape `union`
		// accepts.
		let normalized = d.normalized();
		self.emit(ns, &Relation::linear(d))?;
		if normalized.as_alias().is_some() {
			self.equivalence.union(&normalized)?;
		}
		Ok(())
	}

	fn assert_mul(&mut self, ns: Namespace, a: Expr, b: Expr, c: Expr) -> Result<(), CompileError> {
		let la = self.operand(a);
		let lb = self.operand(b);
		let lc = self.lincom(c);
		if let Some(k) = la.as_constant() {
			return self.assert_zero(ns, lb.scale(k).sub(&lc));
		}
		if let Some(k) = lb.as_constant() {
			return self.assert_zero(ns, la.scale(k).sub(&lc));
		}
		let la = self.affine(ns, la)?;
		let lb = self.affine(ns, lb)?;
		self.emit_product(ns, &la, &lb, lc)
	}
}

/// `a·b - rhs = 0` for `a = c1·x + k1` and `b = c2·y + k2`:
///
/// ```text
/// c1·c2·x·y + c1·k2·x + k1·c2·y + k1·k2 - rhs = 0
/// ```
fn product_relation<F: PrimeField>(
	a: &LinearCombination<F>,
	b: &LinearCombination<F>,
	rhs: &LinearCombination<F>,
) -> Relation<F> {
	match (a.as_affine(), b.as_affine()) {
		(Some((c1, x, k1)), Some((c2, y, k2))) => {
			let linear = LinearCombination::from_terms([(x, c1 * k2), (y, k1 * c2)], k1 * k2);
			Relation::bilinear(c1 * c2, x, y, linear.sub(rhs))
		}
		// Constant operands never reach here, but the product is linear in that case.
		_ => {
			let product = match (a.as_constant(), b.as_constant()) {
				(Some(k), _) => b.scale(k),
				(_, Some(k)) => a.scale(k),
				_ => LinearCombination::zero(),
			};
			Relation::linear(product.sub(rhs))
		}
	}
}

/// Circuit builder for constructing arithmetic circuits over a prime field `F`.
///
/// `CircuitBuilder` records field operations and equality assertions and compiles them into a
/// [`ConstraintSystem`] of generic gates:
///
/// ```text
/// sl·l + sr·r + so·o + sm·l·r + sc = 0
/// ```
///
/// # Expressions
///
/// Every operation returns an [`Expr`], a handle to a field value that only exists at proving
/// time. There are a few kinds of values.
///
/// **Public inputs** are part of the proven statement and occupy the first variable indices.
/// They must be declared before anything else. Created with [`add_public_input`].
///
/// **Witnesses** are private inputs of the prover. Created with [`add_witness`].
///
/// **Constants** are known at compile time and cost nothing. Created with [`add_constant`].
///
/// **Internal variables** are introduced by the compiler for products, inverses and sealed
/// combinations.
///
/// # Costs
///
/// Linear operations ([`add`], [`sub`], [`neg`], [`scale`]) are free: they only record nodes in
/// an expression arena. Multiplying two non-constant values costs one half-row, and an operand
/// that spans more than one variable is sealed into a fresh internal variable first. An
/// assertion costs one half-row per three variables it relates, roughly. Assertions that
/// identify two variables are remembered, and later uses of either are rewritten to one
/// representative.
///
/// # Compilation
///
/// The builder uses reference-counted sharing internally. [`subcircuit`] returns a builder
/// referencing the same state under a nested namespace, which names assertions and groups
/// halves in [`Circuit::simple_json_dump`].
///
/// [`build`] runs the optimization pipeline, cross-checks its result, packs the halves into
/// rows and hashes the outcome. It consumes the internal state and can only be called once per
/// builder instance.
///
/// A contradiction found while recording (for example asserting `5 = 6`) does not panic. It is
/// reported by [`build`].
///
/// [`add`]: Self::add
/// [`add_constant`]: Self::add_constant
/// [`add_public_input`]: Self::add_public_input
/// [`add_witness`]: Self::add_witness
/// [`build`]: Self::build
/// [`neg`]: Self::neg
/// [`scale`]: Self::scale
/// [`sub`]: Self::sub
/// [`subcircuit`]: Self::subcircuit
#[derive(Clone)]
pub struct CircuitBuilder<F: PrimeField> {
	/// Namespace at which this circuit builder is positioned.
	current_path: Namespace,
	shared: Rc<RefCell<Option<Shared<F>>>>,
}

impl<F: PrimeField> Default for CircuitBuilder<F> {
	fn default() -> Self {
		CircuitBuilder::new()
	}
}

#[warn(missing_docs)]
impl<F: PrimeField> CircuitBuilder<F> {
	/// Create a new circuit builder with options read from the environment.
	pub fn new() -> Self {
		Self::with_options(Options::from_env())
	}

	/// Create a new circuit builder with the given options.
	///
	/// The optimization strategy is fixed here for the lifetime of the builder.
	pub fn with_options(opts: Options) -> Self {
		let namespaces = NamespaceTree::new();
		let root = namespaces.root();
		let pipeline = Pipeline::new(&opts);
		CircuitBuilder {
			current_path: root,
			shared: Rc::new(RefCell::new(Some(Shared {
				arena: VarArena::new(),
				exprs: ExprArena::new(),
				equivalence: EquivalenceEngine::new(),
				emitter: GateEmitter::new(),
				namespaces,
				opts,
				pipeline,
				error: None,
			}))),
		}
	}

	/// Compiles the recorded operations into a circuit.
	///
	/// Note that cloning the circuit builder only clones the reference and as such is treated
	/// as a shallow copy.
	///
	/// # Errors
	///
	/// - [`CompileError::UnsatisfiableConstraint`] if an assertion was found to be a
	///   contradiction.
	/// - [`CompileError::OptimizerUnsoundness`] if the safety check caught an optimization pass
	///   changing the solutions of the circuit.
	///
	/// No partially built circuit is observable in either case.
	///
	/// # Panics
	///
	/// Panics if called more than once.
	pub fn build(&self) -> Result<Circuit<F>, CompileError> {
		let shared = self.shared.borrow_mut().take();
		let Some(shared) = shared else {
			panic!("CircuitBuilder::build called twice");
		};
		let Shared {
			arena,
			exprs,
			mut equivalence,
			emitter,
			namespaces,
			opts,
			pipeline,
			error,
		} = shared;
		if let Some(err) = error {
			return Err(err);
		}

		let (halves, origins) = emitter.into_parts();
		let raw = GateList::new(halves, arena.len());
		let classes = equivalence.classes(arena.len());
		let cx = PassContext {
			arena: &arena,
			classes: &classes,
		};
		let (optimized, pipeline_stat) = pipeline.run(raw.clone(), &cx)?;
		if opts.enable_safety_check {
			safety::cross_check(
				&pipeline,
				&raw,
				&optimized,
				&cx,
				SafetyCheck {
					samples: opts.safety_samples,
					seed: opts.safety_seed,
				},
			)?;
		}

		let gates = packing::pack_rows(&optimized.halves, &arena, opts.enable_batching);
		let cs = ConstraintSystem::new(gates, arena.n_public(), optimized.n_vars)?;
		tracing::debug!(
			recorded = raw.halves.len(),
			halves = cs.n_halves(),
			gates = cs.n_gates(),
			public_inputs = cs.public_input_size(),
			variables = cs.variable_count(),
			witnesses = arena.count(VarKind::Witness),
			unions = equivalence.n_unions(),
			iterations = pipeline_stat.iterations,
			"built constraint system"
		);

		let recorded = dump::Recorded::new(namespaces, &raw.halves, origins);
		Ok(Circuit::new(
			cs,
			optimized.halves,
			raw.halves,
			arena,
			exprs,
			recorded,
			pipeline_stat,
		))
	}

	/// Creates a reference to the same underlying circuit builder that is namespaced to the
	/// given name.
	///
	/// Note that this is the same builder instance, but with a different namespace, and that means
	/// calling [`Self::build`] on the returned builder is going to build the whole circuit.
	pub fn subcircuit(&self, name: impl Into<String>) -> CircuitBuilder<F> {
		let nested_path = self
			.shared_mut()
			.namespaces
			.extend(self.current_path, name);
		CircuitBuilder {
			current_path: nested_path,
			shared: self.shared.clone(),
		}
	}

	fn shared_mut(&self) -> RefMut<'_, Shared<F>> {
		RefMut::map(self.shared.borrow_mut(), |shared| match shared {
			Some(shared) => shared,
			None => panic!("CircuitBuilder used after build"),
		})
	}

	/// Declares a public input.
	///
	/// # Panics
	///
	/// Panics if a variable of another kind has already been allocated. Public inputs occupy the
	/// first variable indices.
	pub fn add_public_input(&self) -> Expr {
		let mut shared = self.shared_mut();
		let var = shared.arena.allocate(VarKind::Public);
		shared.exprs.var(var)
	}

	/// Declares a private witness.
	pub fn add_witness(&self) -> Expr {
		let mut shared = self.shared_mut();
		let var = shared.arena.allocate(VarKind::Witness);
		shared.exprs.var(var)
	}

	/// Creates a constant.
	///
	/// # Cost
	///
	/// Constants are folded into gate coefficients and cost nothing.
	pub fn add_constant(&self, value: F) -> Expr {
		self.shared_mut().exprs.constant(value)
	}

	/// Creates a constant from a small integer.
	pub fn add_constant_u64(&self, value: u64) -> Expr {
		self.add_constant(F::from(value))
	}

	/// `a + b`. Free.
	pub fn add(&self, a: Expr, b: Expr) -> Expr {
		self.shared_mut().exprs.add(a, b)
	}

	/// `a - b`. Free.
	pub fn sub(&self, a: Expr, b: Expr) -> Expr {
		let mut shared = self.shared_mut();
		let neg_b = shared.exprs.scale(-F::one(), b);
		shared.exprs.add(a, neg_b)
	}

	/// `-a`. Free.
	pub fn neg(&self, a: Expr) -> Expr {
		self.scale(-F::one(), a)
	}

	/// `c·a`. Free.
	pub fn scale(&self, c: F, a: Expr) -> Expr {
		self.shared_mut().exprs.scale(c, a)
	}

	/// `a·b`.
	///
	/// # Cost
	///
	/// Free if either operand is constant. Otherwise one half-row, plus the sealing of any
	/// operand spanning more than one variable.
	pub fn mul(&self, a: Expr, b: Expr) -> Expr {
		let mut shared = self.shared_mut();
		match shared.mul(self.current_path, a, b) {
			Ok(expr) => expr,
			Err(err) => shared.poisoned(err),
		}
	}

	/// `a²`.
	pub fn square(&self, a: Expr) -> Expr {
		self.mul(a, a)
	}

	/// `1/a`. Proves that `a` is nonzero.
	///
	/// Inverting the constant zero makes [`build`](Self::build) fail with
	/// [`CompileError::UnsatisfiableConstraint`].
	pub fn inv(&self, a: Expr) -> Expr {
		let mut shared = self.shared_mut();
		match shared.inv(self.current_path, a) {
			Ok(expr) => expr,
			Err(err) => shared.poisoned(err),
		}
	}

	/// `a/b`. Proves that `b` is nonzero unless `a` is zero.
	///
	/// Dividing by the constant zero makes [`build`](Self::build) fail with
	/// [`CompileError::UnsatisfiableConstraint`].
	pub fn div(&self, a: Expr, b: Expr) -> Expr {
		let mut shared = self.shared_mut();
		match shared.div(self.current_path, a, b) {
			Ok(expr) => expr,
			Err(err) => shared.poisoned(err),
		}
	}

	/// Materializes `a` as a single variable.
	///
	/// Bare variables and constants are returned as they are. Anything else gets a fresh
	/// internal variable and the halves defining it.
	pub fn seal(&self, a: Expr) -> Expr {
		let mut shared = self.shared_mut();
		match shared.seal(self.current_path, a) {
			Ok(expr) => expr,
			Err(err) => shared.poisoned(err),
		}
	}

	/// Equality assertion.
	///
	/// Asserts that `a = b`.
	///
	/// # Cost
	///
	/// Free if the difference folds to zero. An assertion identifying two variables costs one
	/// half-row the first time, and later assertions between the same classes are free.
	pub fn assert_eq(&self, name: impl Into<String>, a: Expr, b: Expr) {
		let mut shared = self.shared_mut();
		let ns = shared.namespaces.extend(self.current_path, name);
		let d = {
			let la = shared.lincom(a);
			let lb = shared.lincom(b);
			la.sub(&lb)
		};
		if let Err(err) = shared.assert_zero(ns, d) {
			shared.record(err);
		}
	}

	/// Asserts that `a·b = c`.
	///
	/// # Cost
	///
	/// One half-row, plus the sealing of operands spanning more than one variable.
	pub fn assert_mul(&self, name: impl Into<String>, a: Expr, b: Expr, c: Expr) {
		let mut shared = self.shared_mut();
		let ns = shared.namespaces.extend(self.current_path, name);
		if let Err(err) = shared.assert_mul(ns, a, b, c) {
			shared.record(err);
		}
	}

	/// Asserts that `a² = b`.
	pub fn assert_square(&self, name: impl Into<String>, a: Expr, b: Expr) {
		self.assert_mul(name, a, a, b);
	}

	/// Asserts that `a` is either zero or one, as `a·(a - 1) = 0`.
	pub fn assert_boolean(&self, name: impl Into<String>, a: Expr) {
		let one = self.add_constant(F::one());
		let a_minus_one = self.sub(a, one);
		let zero = self.add_constant(F::zero());
		self.assert_mul(name, a, a_minus_one, zero);
	}
}
