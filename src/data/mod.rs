//! Samples, batches and the frozen embedding table
//!
//! Records come from the preprocessing step already tokenized: four id sequences
//! per sample (full sentence and the pre/alt/cur segments), ids 0 and 1 reserved
//! for padding and out-of-vocabulary. The dataset is read-only once loaded; epoch
//! order and length ordering are expressed as index permutations over it.

pub mod permutation;

use crate::config::MaxLenConfig;
use crate::error::{CausalError, Result};
use crate::utils::SeededRng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub use permutation::{epoch_permutation, LengthOrder};

/// Padding token id.
pub const PAD_ID: u32 = 0;
/// Out-of-vocabulary token id.
pub const OOV_ID: u32 = 1;

/// One labelled example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: u64,
    /// Full sentence token ids
    pub tokens: Vec<u32>,
    pub tokens_pre: Vec<u32>,
    pub tokens_alt: Vec<u32>,
    pub tokens_cur: Vec<u32>,
    /// True length of the full sentence before padding/truncation
    pub length: usize,
    /// 1 = causal, 0 = non-causal
    pub label: usize,
}

/// Token field of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Full,
    Pre,
    Alt,
    Cur,
}

impl Field {
    pub const ALL: [Field; 4] = [Field::Full, Field::Pre, Field::Alt, Field::Cur];

    pub fn name(self) -> &'static str {
        match self {
            Field::Full => "tokens",
            Field::Pre => "tokens_pre",
            Field::Alt => "tokens_alt",
            Field::Cur => "tokens_cur",
        }
    }

    pub fn max_len(self, max_len: &MaxLenConfig) -> usize {
        match self {
            Field::Full => max_len.full,
            Field::Pre => max_len.pre,
            Field::Alt => max_len.alt,
            Field::Cur => max_len.cur,
        }
    }

    fn of(self, sample: &Sample) -> &[u32] {
        match self {
            Field::Full => &sample.tokens,
            Field::Pre => &sample.tokens_pre,
            Field::Alt => &sample.tokens_alt,
            Field::Cur => &sample.tokens_cur,
        }
    }
}

/// Immutable collection of samples.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    samples: Vec<Sample>,
}

impl Dataset {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Count of samples per label, indexed by label.
    pub fn label_counts(&self, n_class: usize) -> Vec<usize> {
        let mut counts = vec![0; n_class];
        for s in &self.samples {
            if s.label < n_class {
                counts[s.label] += 1;
            }
        }
        counts
    }
}

/// Padded token ids and labels for a contiguous group of samples.
///
/// Each field is stored row-major as `size × max_len(field)`.
#[derive(Debug, Clone)]
pub struct Batch {
    pub ids: Vec<u64>,
    pub labels: Vec<usize>,
    /// Full-sequence lengths, clamped to `[1, max_len.full]`
    pub lengths: Vec<usize>,
    pub max_len: MaxLenConfig,
    full: Vec<u32>,
    pre: Vec<u32>,
    alt: Vec<u32>,
    cur: Vec<u32>,
}

impl Batch {
    /// Assemble a batch from `indices` into `dataset`.
    ///
    /// Sequences shorter than their field's maximum are right-padded with [`PAD_ID`];
    /// longer ones are rejected.
    ///
    /// # Errors
    ///
    /// [`CausalError::SequenceTooLong`] for an over-long field, [`CausalError::Shape`]
    /// for an index outside the dataset or a label outside `0..n_class`.
    pub fn gather(
        dataset: &Dataset,
        indices: &[usize],
        max_len: &MaxLenConfig,
        n_class: usize,
    ) -> Result<Self> {
        let size = indices.len();
        let mut batch = Batch {
            ids: Vec::with_capacity(size),
            labels: Vec::with_capacity(size),
            lengths: Vec::with_capacity(size),
            max_len: max_len.clone(),
            full: Vec::with_capacity(size * max_len.full),
            pre: Vec::with_capacity(size * max_len.pre),
            alt: Vec::with_capacity(size * max_len.alt),
            cur: Vec::with_capacity(size * max_len.cur),
        };

        for &index in indices {
            let sample = dataset.get(index).ok_or_else(|| CausalError::Shape {
                context: "batch index".to_string(),
                expected: dataset.len(),
                actual: index,
            })?;
            if sample.label >= n_class {
                return Err(CausalError::Shape {
                    context: format!("label of sample {}", sample.id),
                    expected: n_class,
                    actual: sample.label,
                });
            }
            for field in Field::ALL {
                let tokens = field.of(sample);
                let limit = field.max_len(max_len);
                if tokens.len() > limit {
                    return Err(CausalError::SequenceTooLong {
                        field: field.name(),
                        len: tokens.len(),
                        max: limit,
                    });
                }
                let buf = batch.field_mut(field);
                buf.extend_from_slice(tokens);
                buf.resize(buf.len() + limit - tokens.len(), PAD_ID);
            }
            batch.ids.push(sample.id);
            batch.labels.push(sample.label);
            batch.lengths.push(sample.length.clamp(1, max_len.full));
        }

        Ok(batch)
    }

    pub fn size(&self) -> usize {
        self.ids.len()
    }

    /// Padded token ids of one field, `size × max_len(field)`.
    pub fn tokens(&self, field: Field) -> &[u32] {
        match field {
            Field::Full => &self.full,
            Field::Pre => &self.pre,
            Field::Alt => &self.alt,
            Field::Cur => &self.cur,
        }
    }

    fn field_mut(&mut self, field: Field) -> &mut Vec<u32> {
        match field {
            Field::Full => &mut self.full,
            Field::Pre => &mut self.pre,
            Field::Alt => &mut self.alt,
            Field::Cur => &mut self.cur,
        }
    }
}

/// Frozen token embedding matrix, `vocab × dim`, row-major.
///
/// Never updated by training; shared between encoders and trials.
#[derive(Debug, Clone)]
pub struct EmbeddingTable {
    vocab: usize,
    dim: usize,
    data: Vec<f32>,
}

impl EmbeddingTable {
    /// # Errors
    ///
    /// Fails if the table has fewer than the two reserved rows, or if `data`
    /// is not `vocab × dim`.
    pub fn new(vocab: usize, dim: usize, data: Vec<f32>) -> Result<Self> {
        if vocab < 2 {
            return Err(CausalError::Shape {
                context: "embedding rows (pad and OOV are reserved)".to_string(),
                expected: 2,
                actual: vocab,
            });
        }
        if dim == 0 || data.len() != vocab * dim {
            return Err(CausalError::Shape {
                context: "embedding matrix".to_string(),
                expected: vocab * dim.max(1),
                actual: data.len(),
            });
        }
        Ok(Self { vocab, dim, data })
    }

    /// Build from one vector per token id; every row must have the same width.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self> {
        let vocab = rows.len();
        let dim = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(vocab * dim);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != dim {
                return Err(CausalError::Shape {
                    context: format!("embedding row {}", i),
                    expected: dim,
                    actual: row.len(),
                });
            }
            data.extend(row);
        }
        Self::new(vocab, dim, data)
    }

    /// Random table with a zero pad row, for runs without pretrained vectors.
    pub fn random(vocab: usize, dim: usize, rng: &mut SeededRng) -> Result<Self> {
        let mut data = vec![0.0f32; vocab * dim];
        for value in data.iter_mut().skip(dim) {
            *value = rng.gen_range_f32(-0.1, 0.1);
        }
        Self::new(vocab, dim, data)
    }

    pub fn vocab(&self) -> usize {
        self.vocab
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn row(&self, id: u32) -> Option<&[f32]> {
        let id = id as usize;
        (id < self.vocab).then(|| &self.data[id * self.dim..(id + 1) * self.dim])
    }

    /// Look up every id in `tokens`, producing `tokens.len() × dim` values.
    ///
    /// # Errors
    ///
    /// [`CausalError::TokenOutOfRange`] on the first id outside the table.
    pub fn lookup(&self, tokens: &[u32], field: Field) -> Result<Vec<f32>> {
        let mut out = Vec::with_capacity(tokens.len() * self.dim);
        for &id in tokens {
            let row = self.row(id).ok_or(CausalError::TokenOutOfRange {
                field: field.name(),
                id,
                vocab: self.vocab,
            })?;
            out.extend_from_slice(row);
        }
        Ok(out)
    }
}

/// Load a JSON array of [`Sample`] records.
pub fn load_records(path: impl AsRef<Path>) -> Result<Dataset> {
    let contents = fs::read_to_string(path)?;
    let samples: Vec<Sample> = serde_json::from_str(&contents)?;
    Ok(Dataset::new(samples))
}

/// Load an embedding matrix stored as a JSON array of rows.
pub fn load_embeddings(path: impl AsRef<Path>) -> Result<EmbeddingTable> {
    let contents = fs::read_to_string(path)?;
    let rows: Vec<Vec<f32>> = serde_json::from_str(&contents)?;
    EmbeddingTable::from_rows(rows)
}
