//! Property-based tests for the parameter genome.
//!
//! Verifies that bounded set and mutation never leave a gene outside its
//! declared [min, max], and that the binary form round-trips byte-wise for
//! arbitrary genomes.

use melvin_core::{Gene, Genome};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

// ============================================================================
// Strategies
// ============================================================================

fn arb_gene() -> impl Strategy<Value = Gene> {
    (
        -100.0f32..100.0,
        0.0f32..10.0,
        0.0f32..=1.0,
        0.0f32..=1.0,
        any::<bool>(),
        -1.0f32..=1.0,
        0i32..1000,
    )
        .prop_map(|(min, span, rate, mag, critical, fitness, gen)| Gene {
            value: min + span * 0.5,
            min,
            max: min + span,
            mutation_rate: rate,
            mutation_magnitude: mag,
            critical,
            fitness,
            generation_created: gen,
        })
}

fn arb_genome() -> impl Strategy<Value = Genome> {
    proptest::collection::btree_map("[a-z_]{1,16}", arb_gene(), 0..12).prop_map(|genes| {
        let g = Genome::new();
        for (name, gene) in genes {
            g.define(&name, gene);
        }
        g
    })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_set_always_in_range(genome in arb_genome(), value in -1e6f32..1e6) {
        for (name, _) in genome.snapshot() {
            genome.set(&name, value);
        }
        for (name, gene) in genome.snapshot() {
            prop_assert!(gene.min <= gene.value && gene.value <= gene.max,
                "{} = {} outside [{}, {}]", name, gene.value, gene.min, gene.max);
        }
    }

    #[test]
    fn prop_mutation_always_in_range(genome in arb_genome(), seed in any::<u64>(), sweeps in 1usize..20) {
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..sweeps {
            genome.mutate(&mut rng);
        }
        for (name, gene) in genome.snapshot() {
            prop_assert!(gene.min <= gene.value && gene.value <= gene.max,
                "{} = {} outside [{}, {}]", name, gene.value, gene.min, gene.max);
        }
        prop_assert_eq!(genome.generation(), sweeps as i32);
    }

    #[test]
    fn prop_critical_genes_never_mutate(genome in arb_genome(), seed in any::<u64>()) {
        let before: Vec<_> = genome
            .snapshot()
            .into_iter()
            .filter(|(_, g)| g.critical)
            .collect();
        let mut rng = StdRng::seed_from_u64(seed);
        genome.mutate(&mut rng);
        for (name, gene) in before {
            prop_assert_eq!(genome.get(&name).unwrap().value, gene.value);
        }
    }

    #[test]
    fn prop_binary_round_trip(genome in arb_genome()) {
        let bytes = genome.to_bytes();
        let loaded = Genome::from_bytes(&bytes).unwrap();
        prop_assert_eq!(bytes, loaded.to_bytes());
    }

    #[test]
    fn prop_from_bytes_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let _ = Genome::from_bytes(&bytes);
    }
}
