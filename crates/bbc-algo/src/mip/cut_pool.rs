//! Global cut pool shared by the search threads.
//!
//! Rows are keyed by their left-hand side normalized to unit max-norm and
//! quantized to [`COEF_TOL`]. A row whose key is already pooled is dropped,
//! unless it has a strictly tighter right-hand side, in which case it replaces
//! the pooled row. Readers take an `Arc` snapshot; a writer only copies the
//! row vector while an older snapshot is still alive.

use std::collections::HashMap;
use std::sync::Arc;

use super::model::{Row, Sense};

/// Coefficient resolution after normalization.
pub const COEF_TOL: f64 = 1e-9;
const ZERO_COEF: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CutKey {
    sense: Sense,
    terms: Vec<(usize, i64)>,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    position: usize,
    scale: f64,
}

/// What [`CutPool::insert`] did with a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    Added,
    Tightened,
    Duplicate,
}

#[derive(Debug, Default)]
pub struct CutPool {
    rows: Arc<Vec<Row>>,
    index: HashMap<CutKey, Slot>,
    duplicates: usize,
}

fn key_of(row: &Row) -> Option<(CutKey, f64)> {
    let mut terms: Vec<(usize, f64)> = row.terms().collect();
    terms.sort_by_key(|&(j, _)| j);
    let mut merged: Vec<(usize, f64)> = Vec::with_capacity(terms.len());
    for (j, a) in terms {
        match merged.last_mut() {
            Some((last, sum)) if *last == j => *sum += a,
            _ => merged.push((j, a)),
        }
    }
    merged.retain(|&(_, a)| a.abs() > ZERO_COEF);
    let scale = merged.iter().fold(0.0_f64, |acc, &(_, a)| acc.max(a.abs()));
    if scale == 0.0 {
        return None;
    }
    let terms = merged
        .into_iter()
        .map(|(j, a)| (j, (a / scale / COEF_TOL).round() as i64))
        .collect();
    Some((CutKey { sense: row.sense, terms }, scale))
}

impl CutPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows offered but not stored.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Cheap shared view of the current rows.
    pub fn snapshot(&self) -> Arc<Vec<Row>> {
        Arc::clone(&self.rows)
    }

    pub fn insert(&mut self, row: Row) -> Insertion {
        let Some((key, scale)) = key_of(&row) else {
            // rows without support are not pooled
            self.duplicates += 1;
            return Insertion::Duplicate;
        };
        if let Some(slot) = self.index.get(&key).copied() {
            let pooled = &self.rows[slot.position];
            let old = pooled.rhs / slot.scale;
            let new = row.rhs / scale;
            let tighter = match row.sense {
                Sense::Le => new < old - COEF_TOL,
                Sense::Ge => new > old + COEF_TOL,
                Sense::Eq => false,
            };
            if !tighter {
                self.duplicates += 1;
                return Insertion::Duplicate;
            }
            Arc::make_mut(&mut self.rows)[slot.position] = row;
            self.index.insert(key, Slot { scale, ..slot });
            return Insertion::Tightened;
        }
        let position = self.rows.len();
        Arc::make_mut(&mut self.rows).push(row);
        self.index.insert(key, Slot { position, scale });
        Insertion::Added
    }

    /// Insert every row; returns how many were stored or tightened.
    pub fn extend(&mut self, rows: impl IntoIterator<Item = Row>) -> usize {
        rows.into_iter()
            .map(|row| self.insert(row))
            .filter(|i| *i != Insertion::Duplicate)
            .count()
    }
}
