//! Parameter genome
//!
//! Every numerical knob in the system lives here as a [`Gene`]: a value
//! with a declared range, a mutation rate/magnitude, and a criticality
//! flag. Generic mutation passes work uniformly because each entry carries
//! its own bounds; critical genes (structural knobs like the field node
//! ceiling) are exempt from random mutation but still honor bounded `set`.
//!
//! The genome serializes to a self-describing little-endian binary form so
//! an evolved parameter set survives restarts byte-for-byte.

use crate::error::StartupError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::RwLock;

/// One bounded parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gene {
    pub value: f32,
    pub min: f32,
    pub max: f32,
    /// Probability that a mutation sweep touches this gene.
    pub mutation_rate: f32,
    /// Step size as a fraction of the gene's range.
    pub mutation_magnitude: f32,
    /// Critical genes are never randomly mutated.
    pub critical: bool,
    pub fitness: f32,
    pub generation_created: i32,
}

impl Gene {
    pub fn new(value: f32, min: f32, max: f32, mutation_rate: f32, mutation_magnitude: f32) -> Self {
        Self {
            value: value.clamp(min, max),
            min,
            max,
            mutation_rate,
            mutation_magnitude,
            critical: false,
            fitness: 0.0,
            generation_created: 0,
        }
    }

    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }
}

#[derive(Debug, Default)]
struct Inner {
    genes: BTreeMap<String, Gene>,
    generation: i32,
}

/// Thread-safe bounded parameter store. `get`/`set` are individually
/// atomic; mutation sweeps and serialization take the writer lock once.
#[derive(Debug, Default)]
pub struct Genome {
    inner: RwLock<Inner>,
}

impl Genome {
    pub fn new() -> Self {
        Self::default()
    }

    /// The seed genome: every knob the scheduler, field, and built-in
    /// services read. Ranges are the clamping bounds for write-back.
    pub fn with_defaults() -> Self {
        let g = Self::new();
        g.define("decay_rate", Gene::new(0.05, 0.001, 0.2, 0.1, 0.05));
        g.define("spread_rate", Gene::new(0.10, 0.0, 0.5, 0.1, 0.05));
        g.define("temperature", Gene::new(0.7, 0.1, 2.0, 0.2, 0.1));
        g.define("selection_threshold", Gene::new(0.2, 0.05, 0.9, 0.2, 0.1));
        g.define("learning_rate", Gene::new(0.01, 0.0001, 0.1, 0.1, 0.2));
        g.define(
            "max_active_nodes",
            Gene::new(1000.0, 100.0, 10000.0, 0.0, 0.0).critical(),
        );
        g.define("wm_capacity", Gene::new(7.0, 3.0, 9.0, 0.0, 0.0).critical());
        g
    }

    /// Insert or replace a gene definition.
    pub fn define(&self, name: &str, gene: Gene) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.genes.insert(name.to_string(), gene);
    }

    pub fn get(&self, name: &str) -> Option<Gene> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.genes.get(name).cloned()
    }

    pub fn value(&self, name: &str) -> Option<f32> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.genes.get(name).map(|g| g.value)
    }

    pub fn value_or(&self, name: &str, default: f32) -> f32 {
        self.value(name).unwrap_or(default)
    }

    /// Bounded set: clamps to the gene's declared range. Out-of-range
    /// writes are clamped and logged, never rejected. Returns the stored
    /// value, or `None` for an unknown gene.
    pub fn set(&self, name: &str, value: f32) -> Option<f32> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let gene = inner.genes.get_mut(name)?;
        let clamped = value.clamp(gene.min, gene.max);
        if clamped != value {
            tracing::warn!(
                gene = name,
                requested = value,
                stored = clamped,
                "genome set clamped to declared range"
            );
        }
        gene.value = clamped;
        Some(clamped)
    }

    pub fn set_fitness(&self, name: &str, fitness: f32) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if let Some(gene) = inner.genes.get_mut(name) {
            gene.fitness = fitness;
        }
    }

    pub fn generation(&self) -> i32 {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).generation
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One bounded random mutation sweep. Each non-critical gene mutates
    /// with probability `mutation_rate` by a uniform step of at most
    /// `mutation_magnitude` times its range, clamped to [min, max].
    /// Advances the generation counter and returns how many genes moved.
    pub fn mutate<R: Rng>(&self, rng: &mut R) -> usize {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.generation += 1;
        let generation = inner.generation;
        let mut mutated = 0;
        for (name, gene) in inner.genes.iter_mut() {
            if gene.critical || gene.mutation_rate <= 0.0 {
                continue;
            }
            if rng.gen::<f32>() >= gene.mutation_rate {
                continue;
            }
            let span = gene.max - gene.min;
            let step = rng.gen_range(-1.0f32..=1.0) * gene.mutation_magnitude * span;
            let next = (gene.value + step).clamp(gene.min, gene.max);
            tracing::trace!(gene = %name, from = gene.value, to = next, "gene mutated");
            gene.value = next;
            gene.generation_created = generation;
            mutated += 1;
        }
        mutated
    }

    // ------------------------------------------------------------------
    // Binary form
    //
    // [generation:i32][count:i32] then per gene:
    // [name_len:i32][name_bytes]
    // [value][min][max][mutation_rate][mutation_magnitude:f32]
    // [critical:u8][fitness:f32][generation_created:i32]
    // All little-endian. Genes are stored in name order so save → load →
    // save is byte-identical.
    // ------------------------------------------------------------------

    pub fn to_bytes(&self) -> Vec<u8> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let mut buf = Vec::with_capacity(8 + inner.genes.len() * 48);
        buf.extend_from_slice(&inner.generation.to_le_bytes());
        buf.extend_from_slice(&(inner.genes.len() as i32).to_le_bytes());
        for (name, g) in &inner.genes {
            buf.extend_from_slice(&(name.len() as i32).to_le_bytes());
            buf.extend_from_slice(name.as_bytes());
            for v in [g.value, g.min, g.max, g.mutation_rate, g.mutation_magnitude] {
                buf.extend_from_slice(&v.to_le_bytes());
            }
            buf.push(g.critical as u8);
            buf.extend_from_slice(&g.fitness.to_le_bytes());
            buf.extend_from_slice(&g.generation_created.to_le_bytes());
        }
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StartupError> {
        let mut r = Reader { bytes, pos: 0 };
        let generation = r.i32()?;
        let count = r.i32()?;
        if count < 0 {
            return Err(StartupError::GenomeFormat(format!(
                "negative gene count {count}"
            )));
        }
        let mut genes = BTreeMap::new();
        for _ in 0..count {
            let name_len = r.i32()?;
            if name_len < 0 {
                return Err(StartupError::GenomeFormat(format!(
                    "negative name length {name_len}"
                )));
            }
            let name = String::from_utf8(r.take(name_len as usize)?.to_vec())
                .map_err(|e| StartupError::GenomeFormat(format!("gene name not utf-8: {e}")))?;
            let value = r.f32()?;
            let min = r.f32()?;
            let max = r.f32()?;
            let mutation_rate = r.f32()?;
            let mutation_magnitude = r.f32()?;
            let critical = r.u8()? != 0;
            let fitness = r.f32()?;
            let generation_created = r.i32()?;
            if !(min <= max) || !value.is_finite() {
                return Err(StartupError::GenomeFormat(format!(
                    "gene '{name}' has malformed bounds [{min}, {max}] / value {value}"
                )));
            }
            genes.insert(
                name,
                Gene {
                    value: value.clamp(min, max),
                    min,
                    max,
                    mutation_rate,
                    mutation_magnitude,
                    critical,
                    fitness,
                    generation_created,
                },
            );
        }
        Ok(Self {
            inner: RwLock::new(Inner { genes, generation }),
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        std::fs::write(path, self.to_bytes())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, StartupError> {
        let bytes = std::fs::read(path.as_ref()).map_err(|e| StartupError::GenomeRead {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;
        Self::from_bytes(&bytes)
    }

    /// Snapshot of all genes, name-ordered.
    pub fn snapshot(&self) -> Vec<(String, Gene)> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.genes.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], StartupError> {
        if self.pos + n > self.bytes.len() {
            return Err(StartupError::GenomeFormat(format!(
                "truncated at byte {} (wanted {} more)",
                self.pos, n
            )));
        }
        let out = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn i32(&mut self) -> Result<i32, StartupError> {
        Ok(i32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn f32(&mut self) -> Result<f32, StartupError> {
        Ok(f32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u8(&mut self) -> Result<u8, StartupError> {
        Ok(self.take(1)?[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_defaults_within_bounds() {
        let g = Genome::with_defaults();
        for (name, gene) in g.snapshot() {
            assert!(
                gene.min <= gene.value && gene.value <= gene.max,
                "{name} out of bounds"
            );
        }
        assert_eq!(g.value("wm_capacity"), Some(7.0));
    }

    #[test]
    fn test_set_clamps_to_range() {
        let g = Genome::with_defaults();
        assert_eq!(g.set("temperature", 99.0), Some(2.0));
        assert_eq!(g.set("temperature", -5.0), Some(0.1));
        assert_eq!(g.set("no_such_gene", 1.0), None);
    }

    #[test]
    fn test_mutation_respects_bounds_and_criticality() {
        let g = Genome::with_defaults();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            g.mutate(&mut rng);
        }
        for (name, gene) in g.snapshot() {
            assert!(gene.min <= gene.value && gene.value <= gene.max);
            if gene.critical {
                assert_eq!(gene.generation_created, 0, "{name} was mutated");
            }
        }
        assert_eq!(g.value("max_active_nodes"), Some(1000.0));
        assert_eq!(g.generation(), 200);
    }

    #[test]
    fn test_binary_round_trip_identical() {
        let g = Genome::with_defaults();
        let mut rng = StdRng::seed_from_u64(42);
        g.mutate(&mut rng);
        g.set_fitness("temperature", 0.8);

        let bytes = g.to_bytes();
        let loaded = Genome::from_bytes(&bytes).unwrap();
        assert_eq!(bytes, loaded.to_bytes());
        assert_eq!(loaded.generation(), g.generation());
        assert_eq!(loaded.snapshot(), g.snapshot());
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(Genome::from_bytes(&[1, 2, 3]).is_err());
        // Valid header claiming one gene, then nothing.
        let mut buf = Vec::new();
        buf.extend_from_slice(&0i32.to_le_bytes());
        buf.extend_from_slice(&1i32.to_le_bytes());
        assert!(Genome::from_bytes(&buf).is_err());
    }

    #[test]
    fn test_save_load_file() {
        let g = Genome::with_defaults();
        let path = std::env::temp_dir().join(format!("melvin_genome_{}.bin", std::process::id()));
        g.save(&path).unwrap();
        let loaded = Genome::load(&path).unwrap();
        assert_eq!(g.to_bytes(), loaded.to_bytes());
        let _ = std::fs::remove_file(&path);
    }
}
