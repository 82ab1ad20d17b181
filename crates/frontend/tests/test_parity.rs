// Copyright 2025 Irreducible Inc.
use ark_bn254::Fr;
use trellis_core::verify::verify_constraints;
use trellis_frontend::{
	Circuit, CircuitBuilder, CircuitStat, Expr, Options,
	export::{self, ExportedSystem, GENERIC_GATE_TYPE, Mismatch},
};

/// `out = (a + b)·c + d` with `d` boolean. Returns the circuit and `[out, a, b, c, d]`.
fn affine_product_with_inputs(opts: Options) -> (Circuit<Fr>, [Expr; 5]) {
	let builder = CircuitBuilder::with_options(opts);
	let out = builder.add_public_input();
	let a = builder.add_witness();
	let b = builder.add_witness();
	let c = builder.add_witness();
	let d = builder.add_witness();

	let gadget = builder.subcircuit("gadget");
	let product = gadget.mul(gadget.add(a, b), c);
	gadget.assert_boolean("d_is_bit", d);
	gadget.assert_eq("out", gadget.add(product, d), out);
	(builder.build().unwrap(), [out, a, b, c, d])
}

fn affine_product(opts: Options) -> Circuit<Fr> {
	affine_product_with_inputs(opts).0
}

#[test]
fn test_identical_builds_are_at_parity() {
	let first = affine_product(Options::default());
	let second = affine_product(Options::default());
	assert_eq!(first.digest(), second.digest());

	let report = export::compare(&first.export(), &second.export());
	assert!(report.is_match(), "{report}");
}

#[test]
fn test_export_survives_json() {
	let circuit = affine_product(Options::default());
	let exported = circuit.export();
	let json = circuit.export_json();
	let parsed = ExportedSystem::from_json(&json).unwrap();
	assert_eq!(parsed, exported);

	assert_eq!(parsed.public_input_size, 1);
	assert_eq!(parsed.gates.len(), circuit.n_gates());
	assert!(parsed.gates.iter().all(|gate| gate.typ == GENERIC_GATE_TYPE));
	assert!(
		parsed
			.gates
			.iter()
			.all(|gate| gate.wires.len() == 3 * gate.coeffs.len() / 5)
	);
}

#[test]
fn test_batching_shows_up_as_gate_count_mismatch() {
	let build = |enable_batching| {
		let builder = CircuitBuilder::<Fr>::with_options(Options {
			enable_batching,
			..Options::default()
		});
		let x = builder.add_witness();
		let y = builder.add_witness();
		builder.assert_eq("x", x, builder.add_constant_u64(3));
		builder.assert_eq("y", y, builder.add_constant_u64(4));
		builder.build().unwrap()
	};
	let batched = build(true).export();
	let unbatched = build(false).export();

	let report = export::compare(&batched, &unbatched);
	assert!(!report.is_match());
	assert_eq!(report.mismatches[0], Mismatch::GateCount { lhs: 1, rhs: 2 });
	assert!(report.to_string().contains("gate count: 1 vs 2"));
}

#[test]
fn test_populated_witness_satisfies_constraint_system() {
	let (circuit, [out, a, b, c, d]) = affine_product_with_inputs(Options::default());
	let mut filler = circuit.new_witness_filler();
	filler.set(a, Fr::from(2u64));
	filler.set(b, Fr::from(3u64));
	filler.set(c, Fr::from(4u64));
	filler.set(d, Fr::from(1u64));
	circuit.populate_witness(&mut filler).unwrap();
	assert_eq!(filler.value(out), Some(Fr::from(21u64)));

	// Public inputs come first in the assignment.
	assert_eq!(circuit.var_index(out).map(|index| index.0), Some(0));
	let values = filler.into_values();
	assert_eq!(values[0], Fr::from(21u64));
	assert!(verify_constraints(circuit.constraint_system(), &values).is_ok());
}

#[test]
fn test_stat_matches_export() {
	let circuit = affine_product(Options::default());
	let stat = CircuitStat::collect(&circuit);
	let exported = circuit.export();
	assert_eq!(stat.n_gates, exported.gates.len());
	assert_eq!(stat.public_input_size, exported.public_input_size);
	assert_eq!(stat.variable_count, exported.variable_count);
	assert_eq!(
		stat.n_halves,
		exported.gates.iter().map(|gate| gate.coeffs.len() / 5).sum::<usize>()
	);
	assert!(stat.n_halves <= stat.n_recorded_halves);
}
