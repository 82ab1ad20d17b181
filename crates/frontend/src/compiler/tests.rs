// Copyright 2025 Irreducible Inc.
use ark_bn254::Fr;
use ark_ff::{Field, One, Zero};
use proptest::prelude::*;
use trellis_core::verify::verify_constraints;

use super::*;
use crate::{CircuitStat, error::CompileError};

fn builder() -> CircuitBuilder<Fr> {
	CircuitBuilder::with_options(Options::default())
}

fn f(n: u64) -> Fr {
	Fr::from(n)
}

/// Runs the pipeline on the recorded halves, then once more on its own output.
fn optimize_twice(builder: &CircuitBuilder<Fr>) -> (GateList<Fr>, GateList<Fr>) {
	let Some(Shared {
		arena,
		mut equivalence,
		emitter,
		pipeline,
		..
	}) = builder.shared.borrow_mut().take()
	else {
		panic!("builder already built");
	};
	let (halves, _) = emitter.into_parts();
	let raw = GateList::new(halves, arena.len());
	let classes = equivalence.classes(arena.len());
	let cx = PassContext {
		arena: &arena,
		classes: &classes,
	};
	let (once, _) = pipeline.run(raw, &cx).unwrap();
	let (twice, stat) = pipeline.run(once.clone(), &cx).unwrap();
	assert!(stat.reached_fixpoint);
	assert!(stat.by_pass.values().all(|counters| counters.changes == 0));
	(once, twice)
}

#[test]
fn test_equal_constants_compile_to_nothing() {
	let b = builder();
	let two = b.add_constant_u64(2);
	let three = b.add_constant_u64(3);
	let five = b.add_constant_u64(5);
	b.assert_eq("five", b.add(two, three), five);
	let circuit = b.build().unwrap();
	assert_eq!(circuit.n_gates(), 0);
	assert_eq!(circuit.n_halves(), 0);
}

#[test]
fn test_unequal_constants_are_unsatisfiable() {
	let b = builder();
	let five = b.add_constant_u64(5);
	let six = b.add_constant_u64(6);
	b.subcircuit("outer").assert_eq("five_is_six", five, six);
	match b.build() {
		Err(CompileError::UnsatisfiableConstraint { name }) => {
			assert_eq!(name, "outer.five_is_six")
		}
		Err(err) => panic!("unexpected error: {err}"),
		Ok(_) => panic!("contradiction was not reported"),
	}
}

#[test]
fn test_conflicting_constant_assertions_are_unsatisfiable() {
	let b = builder();
	let x = b.add_witness();
	b.assert_eq("x_is_3", x, b.add_constant_u64(3));
	b.assert_eq("x_is_4", x, b.add_constant_u64(4));
	assert!(matches!(
		b.build(),
		Err(CompileError::UnsatisfiableConstraint { name }) if name == "x_is_4"
	));
}

#[test]
fn test_identity_operations_are_free() {
	let direct = builder();
	let (w, x, y) = (direct.add_witness(), direct.add_witness(), direct.add_witness());
	direct.assert_mul("m", x, w, y);
	let direct = direct.build().unwrap();

	let padded = builder();
	let (w, x, y) = (padded.add_witness(), padded.add_witness(), padded.add_witness());
	let zero = padded.add_constant(Fr::zero());
	let one = padded.add_constant(Fr::one());
	let x_plus_zero = padded.add(x, zero);
	let x_times_one = padded.mul(x_plus_zero, one);
	padded.assert_mul("m", x_times_one, w, y);
	let padded = padded.build().unwrap();

	assert_eq!(direct.n_halves(), padded.n_halves());
	assert_eq!(direct.digest(), padded.digest());
}

#[test]
fn test_four_term_sum_takes_one_row() {
	let b = builder();
	let [a, c, d, e] = [(); 4].map(|_| b.add_witness());
	let sum = b.add(b.add(a, c), d);
	b.assert_eq("sum", sum, e);
	let circuit = b.build().unwrap();
	assert_eq!(circuit.n_halves(), 2);
	assert_eq!(circuit.n_gates(), 1);
}

#[test]
fn test_six_term_sum_takes_two_rows() {
	let b = builder();
	let vars = [(); 6].map(|_| b.add_witness());
	let sum = vars[..5].iter().fold(b.add_constant(Fr::zero()), |acc, &v| b.add(acc, v));
	b.assert_eq("sum", sum, vars[5]);
	let circuit = b.build().unwrap();
	assert_eq!(circuit.n_halves(), 4);
	assert_eq!(circuit.n_gates(), 2);
}

#[test]
fn test_repeated_equality_emits_one_gate() {
	let b = builder();
	let x = b.add_witness();
	let y = b.add_witness();
	b.assert_eq("x_eq_y", x, y);
	b.assert_eq("y_eq_x", y, x);
	let circuit = b.build().unwrap();
	assert_eq!(circuit.n_halves(), 1);
	assert_eq!(circuit.n_gates(), 1);
}

#[test]
fn test_product_of_witnesses_equal_to_constant() {
	let b = builder();
	let w1 = b.add_witness();
	let w2 = b.add_witness();
	let product = b.mul(w1, w2);
	b.assert_eq("product", product, b.add_constant_u64(12));
	let circuit = b.build().unwrap();

	assert_eq!(circuit.n_gates(), 1);
	assert_eq!(circuit.n_halves(), 1);
	assert_eq!(circuit.public_input_size(), 0);
	let gate = &circuit.constraint_system().gates()[0];
	assert!(!gate.first.is_linear());

	let mut w = circuit.new_witness_filler();
	w.set(w1, f(3));
	w.set(w2, f(4));
	circuit.populate_witness(&mut w).unwrap();
	// The product variable only survives in the recorded halves.
	assert_eq!(w.value(product), Some(f(12)));

	let mut w = circuit.new_witness_filler();
	w.set(w1, f(3));
	w.set(w2, f(5));
	assert!(circuit.populate_witness(&mut w).is_err());
}

#[test]
fn test_witness_plus_one_equal_to_public_input() {
	let b = builder();
	let public = b.add_public_input();
	let private = b.add_witness();
	let one = b.add_constant(Fr::one());
	b.assert_eq("increment", b.add(private, one), public);
	let circuit = b.build().unwrap();

	assert_eq!(circuit.n_gates(), 1);
	assert_eq!(circuit.n_halves(), 1);
	assert_eq!(circuit.public_input_size(), 1);
	assert!(circuit.constraint_system().gates()[0].first.is_linear());

	let cs = circuit.constraint_system();
	let index = |expr| circuit.var_index(expr).unwrap().0 as usize;
	for (v, p) in [(4, 5), (4, 6), (0, 1), (1, 1)] {
		let mut values = vec![Fr::zero(); cs.variable_count()];
		values[index(private)] = f(v);
		values[index(public)] = f(p);
		assert_eq!(verify_constraints(cs, &values).is_ok(), v + 1 == p);
	}
}

#[test]
#[should_panic(expected = "public inputs must be declared before any other variable")]
fn test_public_input_after_witness_panics() {
	let b = builder();
	b.add_witness();
	b.add_public_input();
}

#[test]
#[should_panic(expected = "CircuitBuilder::build called twice")]
fn test_build_twice_panics() {
	let b = builder();
	b.add_witness();
	let _ = b.build();
	let _ = b.build();
}

#[test]
fn test_inverse_of_zero_is_unsatisfiable() {
	let b = builder();
	let zero = b.add_constant(Fr::zero());
	b.subcircuit("gadget").inv(zero);
	assert!(matches!(
		b.build(),
		Err(CompileError::UnsatisfiableConstraint { name }) if name == "gadget.inv"
	));
}

#[test]
fn test_redundant_product_is_merged() {
	// x·(1/x) = 1 restates the inverse gate itself.
	let b = builder();
	let x = b.add_witness();
	let x_inv = b.inv(x);
	b.assert_eq("unit", b.mul(x, x_inv), b.add_constant(Fr::one()));
	let circuit = b.build().unwrap();
	assert_eq!(circuit.n_recorded_halves(), 3);
	assert_eq!(circuit.n_halves(), 1);

	let mut w = circuit.new_witness_filler();
	w.set(x, f(7));
	circuit.populate_witness(&mut w).unwrap();
	assert_eq!(w.value(x_inv).unwrap() * f(7), Fr::one());
}

#[test]
fn test_boolean_assertion() {
	let b = builder();
	let bit = b.add_witness();
	b.assert_boolean("bit", bit);
	let circuit = b.build().unwrap();
	assert_eq!(circuit.n_halves(), 1);

	for (value, ok) in [(0, true), (1, true), (2, false)] {
		let mut w = circuit.new_witness_filler();
		w.set(bit, f(value));
		assert_eq!(circuit.populate_witness(&mut w).is_ok(), ok);
	}
}

#[test]
fn test_multi_term_operand_is_sealed() {
	let b = builder();
	let out = b.add_public_input();
	let [x, y, z] = [(); 3].map(|_| b.add_witness());
	let product = b.mul(b.add(x, y), z);
	b.assert_eq("out", product, out);
	let circuit = b.build().unwrap();
	// x + y - s = 0 and s·z - out = 0.
	assert_eq!(circuit.n_halves(), 2);

	let mut w = circuit.new_witness_filler();
	w.set(x, f(2));
	w.set(y, f(3));
	w.set(z, f(4));
	circuit.populate_witness(&mut w).unwrap();
	assert_eq!(w.value(out), Some(f(20)));
}

#[test]
fn test_division() {
	let b = builder();
	let out = b.add_public_input();
	let num = b.add_witness();
	let den = b.add_witness();
	b.assert_eq("quotient", b.div(num, den), out);
	let circuit = b.build().unwrap();
	assert_eq!(circuit.n_halves(), 1);

	let mut w = circuit.new_witness_filler();
	w.set(num, f(12));
	w.set(den, f(4));
	circuit.populate_witness(&mut w).unwrap();
	assert_eq!(w.value(out), Some(f(3)));
}

#[test]
fn test_square_assertion() {
	let b = builder();
	let x = b.add_witness();
	let y = b.add_witness();
	b.assert_square("square", x, y);
	let circuit = b.build().unwrap();
	assert_eq!(circuit.n_halves(), 1);

	let mut w = circuit.new_witness_filler();
	w.set(x, f(9));
	circuit.populate_witness(&mut w).unwrap();
	assert_eq!(w.value(y), Some(f(81)));
}

#[test]
fn test_eliminated_variables_are_solved() {
	let b = builder();
	let [x, y, z] = [(); 3].map(|_| b.add_witness());
	let s = b.seal(b.add(x, y));
	b.assert_eq("s", s, z);
	let circuit = b.build().unwrap();
	assert_eq!(circuit.n_halves(), 1);

	let mut w = circuit.new_witness_filler();
	w.set(x, f(3));
	w.set(y, f(4));
	assert_eq!(w.value(s), None);
	circuit.populate_witness(&mut w).unwrap();
	assert_eq!(w.value(z), Some(f(7)));
	assert_eq!(w.value(s), Some(f(7)));
	assert_eq!(w.value(b.add(s, x)), Some(f(10)));
}

#[test]
fn test_inverse_of_square_plus_sum_keeps_every_constraint() {
	// y·y - p = 0, p + 2·x - s = 0, s·i - 1 = 0. Folding `p` into the square would need four
	// wires, so all three halves stay.
	for (level, enable_safety_check) in [
		(OptimizationLevel::Basic, false),
		(OptimizationLevel::Basic, true),
		(OptimizationLevel::Aggressive, true),
	] {
		let b = CircuitBuilder::<Fr>::with_options(Options {
			level,
			enable_safety_check,
			..Options::default()
		});
		let x = b.add_witness();
		let y = b.add_witness();
		let t = b.add(b.square(y), b.add(x, x));
		let t_inv = b.inv(t);
		let circuit = b.build().unwrap();
		assert_eq!(circuit.n_recorded_halves(), 3);
		assert_eq!(circuit.n_halves(), 3);

		let mut w = circuit.new_witness_filler();
		w.set(y, f(1));
		w.set(x, f(1));
		circuit.populate_witness(&mut w).unwrap();
		assert_eq!(w.value(t_inv), f(3).inverse());

		// y² + 2·x = 0 has no inverse.
		let mut w = circuit.new_witness_filler();
		w.set(y, f(1));
		w.set(x, -f(2).inverse().unwrap());
		assert!(circuit.populate_witness(&mut w).is_err());
	}
}

#[test]
fn test_scaled_alias_is_unified() {
	let b = builder();
	let x = b.add_witness();
	let y = b.add_witness();
	b.assert_eq("scaled", b.scale(f(2), x), b.scale(f(2), y));
	{
		let shared = b.shared.borrow();
		let shared = shared.as_ref().unwrap();
		assert_eq!(shared.equivalence.n_unions(), 1);
		assert!(shared.error.is_none());
	}
	let circuit = b.build().unwrap();
	assert_eq!(circuit.n_halves(), 1);
}

#[test]
fn test_batching_only_changes_rows() {
	let build = |enable_batching| {
		let b = CircuitBuilder::<Fr>::with_options(Options {
			enable_batching,
			..Options::default()
		});
		let x = b.add_witness();
		let y = b.add_witness();
		b.assert_eq("x", x, b.add_constant_u64(3));
		b.assert_eq("y", y, b.add_constant_u64(4));
		b.build().unwrap()
	};
	let batched = build(true);
	let unbatched = build(false);
	assert_eq!(batched.n_halves(), 2);
	assert_eq!(unbatched.n_halves(), 2);
	assert_eq!(batched.n_gates(), 1);
	assert_eq!(unbatched.n_gates(), 2);
}

#[test]
fn test_level_none_keeps_recorded_halves() {
	let b = CircuitBuilder::<Fr>::with_options(Options {
		level: OptimizationLevel::None,
		..Options::default()
	});
	let w1 = b.add_witness();
	let w2 = b.add_witness();
	b.assert_eq("product", b.mul(w1, w2), b.add_constant_u64(12));
	let circuit = b.build().unwrap();
	assert_eq!(circuit.n_halves(), 2);
	assert!(circuit.pipeline_stat().by_pass.is_empty());
}

#[test]
fn test_unification_rewrites_later_uses() {
	let b = builder();
	let p = b.add_public_input();
	let x = b.add_witness();
	let y = b.add_witness();
	let z = b.add_witness();
	// Recorded before the alias is known, so the product still mentions `x`.
	b.assert_mul("m", y, z, x);
	b.assert_eq("alias", x, p);

	let (once, twice) = optimize_twice(&b);
	assert_eq!(once, twice);
	assert_eq!(once.halves.len(), 2);
	let p = Var::from_u32(0);
	let product = once.halves.iter().find(|half| !half.is_linear()).unwrap();
	assert!(product.vars().contains(&p));
}

#[test]
fn test_composition_dump() {
	let b = builder();
	let x = b.add_witness();
	let y = b.add_witness();
	let hasher = b.subcircuit("hasher");
	let round = hasher.subcircuit("round");
	round.assert_mul("m", x, y, b.add_constant_u64(6));
	hasher.assert_eq("x", x, b.add_constant_u64(2));
	let circuit = b.build().unwrap();

	let dump: serde_json::Value = serde_json::from_str(&circuit.simple_json_dump()).unwrap();
	assert_eq!(dump["n_halves"], 2);
	let hasher = &dump["children"][0];
	assert_eq!(hasher["name"], "hasher");
	assert_eq!(hasher["breakdown"]["by_kind"]["bilinear"], 1);
	assert_eq!(hasher["breakdown"]["by_kind"]["linear"], 1);
}

#[test]
fn test_stat_report() {
	let b = builder();
	let w1 = b.add_witness();
	let w2 = b.add_witness();
	b.assert_eq("product", b.mul(w1, w2), b.add_constant_u64(12));
	let circuit = b.build().unwrap();

	let stat = CircuitStat::collect(&circuit);
	assert_eq!(stat.n_gates, 1);
	assert_eq!(stat.n_bilinear_halves, 1);
	assert_eq!(stat.n_recorded_halves, 2);
	assert!(stat.reached_fixpoint);
	assert_eq!(stat.by_pass[&PassKind::AdditionChainCollapse], (1, 0));
	let report = stat.to_string();
	assert!(report.contains("Rows: 1"));
	assert!(report.contains("AdditionChainCollapse: -1 +0"));
}

#[test]
fn test_optimization_level_parsing() {
	assert_eq!("none".parse::<OptimizationLevel>(), Ok(OptimizationLevel::None));
	assert_eq!("Basic".parse::<OptimizationLevel>(), Ok(OptimizationLevel::Basic));
	assert_eq!("2".parse::<OptimizationLevel>(), Ok(OptimizationLevel::Aggressive));
	assert!("fast".parse::<OptimizationLevel>().is_err());
}

/// One step of a random program over the values recorded so far.
#[derive(Clone, Debug)]
enum Op {
	Add(usize, usize),
	Sub(usize, usize),
	Scale(u64, usize),
	Mul(usize, usize),
	Square(usize),
	/// Skipped when the value is zero.
	Inv(usize),
	/// Skipped when the divisor is zero.
	Div(usize, usize),
	Seal(usize),
	/// Asserts a value equal to the constant it evaluates to.
	Pin(usize),
	/// Asserts a value equal to itself through a different expression.
	Restate(usize),
	/// Asserts the product of two values equal to the constant it evaluates to.
	AssertMul(usize, usize),
	/// A fresh witness asserted to be a bit.
	Bit(bool),
	/// A fresh witness asserted equal to an existing value.
	Alias(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
	prop_oneof![
		(any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::Add(a, b)),
		(any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::Sub(a, b)),
		(1u64..100, any::<usize>()).prop_map(|(c, a)| Op::Scale(c, a)),
		(any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::Mul(a, b)),
		any::<usize>().prop_map(Op::Square),
		any::<usize>().prop_map(Op::Inv),
		(any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::Div(a, b)),
		any::<usize>().prop_map(Op::Seal),
		any::<usize>().prop_map(Op::Pin),
		any::<usize>().prop_map(Op::Restate),
		(any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::AssertMul(a, b)),
		any::<bool>().prop_map(Op::Bit),
		any::<usize>().prop_map(Op::Alias),
	]
}

/// A recorded random program with one public output equal to its last value.
struct Program {
	builder: CircuitBuilder<Fr>,
	/// Every witness with its value in the honest assignment.
	witnesses: Vec<(Expr, Fr)>,
	out: Expr,
	expected: Fr,
}

impl Program {
	fn record(inputs: &[u64; 4], ops: &[Op], opts: Options) -> Self {
		let b = CircuitBuilder::with_options(opts);
		let out = b.add_public_input();
		let mut nodes = Vec::new();
		let mut values = Vec::new();
		for &input in inputs {
			nodes.push(b.add_witness());
			values.push(f(input));
		}
		let mut witnesses = nodes
			.iter()
			.copied()
			.zip(values.iter().copied())
			.collect::<Vec<_>>();

		for (step, op) in ops.iter().enumerate() {
			let n = nodes.len();
			let (node, value) = match *op {
				Op::Add(a, c) => (b.add(nodes[a % n], nodes[c % n]), values[a % n] + values[c % n]),
				Op::Sub(a, c) => (b.sub(nodes[a % n], nodes[c % n]), values[a % n] - values[c % n]),
				Op::Scale(k, a) => (b.scale(f(k), nodes[a % n]), f(k) * values[a % n]),
				Op::Mul(a, c) => (b.mul(nodes[a % n], nodes[c % n]), values[a % n] * values[c % n]),
				Op::Square(a) => (b.square(nodes[a % n]), values[a % n].square()),
				Op::Inv(a) => {
					let Some(inverse) = values[a % n].inverse() else {
						continue;
					};
					(b.inv(nodes[a % n]), inverse)
				}
				Op::Div(a, c) => {
					let Some(inverse) = values[c % n].inverse() else {
						continue;
					};
					(b.div(nodes[a % n], nodes[c % n]), values[a % n] * inverse)
				}
				Op::Seal(a) => (b.seal(nodes[a % n]), values[a % n]),
				Op::Pin(a) => {
					b.assert_eq(format!("pin_{step}"), nodes[a % n], b.add_constant(values[a % n]));
					continue;
				}
				Op::Restate(a) => {
					let zero = b.add_constant(Fr::zero());
					b.assert_eq(format!("restate_{step}"), b.add(nodes[a % n], zero), nodes[a % n]);
					continue;
				}
				Op::AssertMul(a, c) => {
					let product = b.add_constant(values[a % n] * values[c % n]);
					b.assert_mul(format!("mul_{step}"), nodes[a % n], nodes[c % n], product);
					continue;
				}
				Op::Bit(bit) => {
					let w = b.add_witness();
					let value = if bit { Fr::one() } else { Fr::zero() };
					b.assert_boolean(format!("bit_{step}"), w);
					witnesses.push((w, value));
					(w, value)
				}
				Op::Alias(a) => {
					let w = b.add_witness();
					b.assert_eq(format!("alias_{step}"), w, nodes[a % n]);
					witnesses.push((w, values[a % n]));
					(w, values[a % n])
				}
			};
			nodes.push(node);
			values.push(value);
		}

		let last = nodes.len() - 1;
		b.assert_eq("out", nodes[last], out);
		Self {
			builder: b,
			witnesses,
			out,
			expected: values[last],
		}
	}

	/// A witness filler holding every witness value, plus `out` if given.
	fn fill<'a>(&self, circuit: &'a Circuit<Fr>, out: Option<Fr>) -> circuit::WitnessFiller<'a, Fr> {
		let mut w = circuit.new_witness_filler();
		for &(expr, value) in &self.witnesses {
			w.set(expr, value);
		}
		if let Some(out) = out {
			w.set(self.out, out);
		}
		w
	}
}

proptest! {
	#![proptest_config(ProptestConfig::with_cases(64))]

	#[test]
	fn prop_honest_assignment_satisfies_optimized_circuit(
		inputs in any::<[u64; 4]>(),
		ops in prop::collection::vec(op_strategy(), 1..24),
	) {
		let program = Program::record(&inputs, &ops, Options::default());
		let circuit = program.builder.build().unwrap();
		prop_assert!(circuit.n_halves() <= circuit.n_recorded_halves());

		// The public output is left for the solver.
		let mut w = program.fill(&circuit, None);
		circuit.populate_witness(&mut w).unwrap();
		prop_assert_eq!(w.value(program.out), Some(program.expected));

		let values = w.into_values();
		prop_assert!(verify_constraints(circuit.constraint_system(), &values).is_ok());
	}

	#[test]
	fn prop_wrong_output_is_rejected(
		inputs in any::<[u64; 4]>(),
		ops in prop::collection::vec(op_strategy(), 1..24),
	) {
		let program = Program::record(&inputs, &ops, Options::default());
		let circuit = program.builder.build().unwrap();
		let mut w = program.fill(&circuit, Some(program.expected + Fr::one()));
		prop_assert!(circuit.populate_witness(&mut w).is_err());
	}

	#[test]
	fn prop_build_is_deterministic(
		inputs in any::<[u64; 4]>(),
		ops in prop::collection::vec(op_strategy(), 1..24),
	) {
		let first = Program::record(&inputs, &ops, Options::default()).builder.build().unwrap();
		let second = Program::record(&inputs, &ops, Options::default()).builder.build().unwrap();
		prop_assert_eq!(first.digest(), second.digest());
		prop_assert_eq!(first.export_json(), second.export_json());
	}

	#[test]
	fn prop_pipeline_is_idempotent(
		inputs in any::<[u64; 4]>(),
		ops in prop::collection::vec(op_strategy(), 1..24),
	) {
		let opts = Options { max_passes: 64, ..Options::default() };
		let program = Program::record(&inputs, &ops, opts);
		let (once, twice) = optimize_twice(&program.builder);
		prop_assert_eq!(once, twice);
	}

	#[test]
	fn prop_levels_agree_on_satisfiability(
		inputs in any::<[u64; 4]>(),
		ops in prop::collection::vec(op_strategy(), 1..24),
	) {
		for level in [OptimizationLevel::None, OptimizationLevel::Basic] {
			let opts = Options { level, ..Options::default() };
			let program = Program::record(&inputs, &ops, opts);
			let circuit = program.builder.build().unwrap();
			let mut w = program.fill(&circuit, Some(program.expected));
			prop_assert!(circuit.populate_witness(&mut w).is_ok());
		}
	}
}
