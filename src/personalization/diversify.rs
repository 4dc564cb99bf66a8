use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::personalization::config::DiversityConfig;
use crate::personalization::types::{ContentType, DifficultyLevel, Recommendation};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8], mut hash: u64) -> u64 {
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Deterministic generator for one (learner, signal version) pair.
pub fn seeded_rng(learner_id: &str, signal_version: u64, seed: u64) -> ChaCha8Rng {
    let mut hash = fnv1a(learner_id.as_bytes(), FNV_OFFSET);
    hash = fnv1a(&signal_version.to_le_bytes(), hash);
    hash = fnv1a(&seed.to_le_bytes(), hash);
    ChaCha8Rng::seed_from_u64(hash)
}

/// Bounds repetition of content type and difficulty in the head of a ranked list.
pub struct Diversifier {
    config: DiversityConfig,
}

impl Diversifier {
    pub fn new(config: DiversityConfig) -> Self {
        Self { config }
    }

    pub fn output_size(&self) -> usize {
        self.config.output_size
    }

    /// Walks `ranked` in order. The first `unconditional_head` items are always
    /// admitted and count toward the caps. After that an item whose content type is
    /// at `max_per_category` is skipped; one whose difficulty is at
    /// `max_per_difficulty` is admitted with `overflow_admit_probability`.
    pub fn diversify<R: Rng>(
        &self,
        ranked: Vec<Recommendation>,
        output_size: usize,
        rng: &mut R,
    ) -> Vec<Recommendation> {
        diversify(
            ranked,
            self.config.max_per_category,
            self.config.max_per_difficulty,
            self.config.unconditional_head,
            self.config.overflow_admit_probability,
            output_size,
            rng,
        )
    }
}

pub fn diversify<R: Rng>(
    ranked: Vec<Recommendation>,
    max_per_category: usize,
    max_per_difficulty: usize,
    unconditional_head: usize,
    overflow_probability: f64,
    output_size: usize,
    rng: &mut R,
) -> Vec<Recommendation> {
    let probability = if overflow_probability.is_finite() {
        overflow_probability.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let mut per_category: BTreeMap<ContentType, usize> = BTreeMap::new();
    let mut per_difficulty: BTreeMap<DifficultyLevel, usize> = BTreeMap::new();
    let mut out = Vec::with_capacity(output_size.min(ranked.len()));

    for (index, rec) in ranked.into_iter().enumerate() {
        if out.len() >= output_size {
            break;
        }
        let category = rec.metadata.content_type;
        let difficulty = rec.metadata.difficulty;
        let category_count = per_category.get(&category).copied().unwrap_or(0);
        let difficulty_count = per_difficulty.get(&difficulty).copied().unwrap_or(0);

        let admit = if index < unconditional_head {
            true
        } else if category_count >= max_per_category {
            false
        } else if difficulty_count < max_per_difficulty {
            true
        } else {
            rng.random_bool(probability)
        };

        if admit {
            *per_category.entry(category).or_insert(0) += 1;
            *per_difficulty.entry(difficulty).or_insert(0) += 1;
            out.push(rec);
        }
    }
    out
}
