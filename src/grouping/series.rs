use std::collections::{BTreeMap, BTreeSet};
use std::cmp::Ordering;

use log::debug;

use crate::grouping::title::TitleNormalizer;
use crate::{BookRecord, GroupedBook};

/// Classifies books into explicit series, inferred (title-pattern) series, or
/// standalone, and assigns each a destination group key and volume index.
pub struct SeriesGrouper {
    normalizer: TitleNormalizer,
}

impl SeriesGrouper {
    pub fn new() -> Self {
        Self {
            normalizer: TitleNormalizer::new(),
        }
    }

    /// Classify every record. Output is deterministic: sorted by group key,
    /// then display index (catalog id breaks ties), then id.
    pub fn classify(&self, records: Vec<BookRecord>) -> Vec<GroupedBook> {
        // Author is always the outer partition key, so a series name shared by
        // two authors never merges their groups.
        let mut by_author: BTreeMap<String, Vec<BookRecord>> = BTreeMap::new();
        for record in records {
            by_author
                .entry(record.primary_author().to_lowercase())
                .or_default()
                .push(record);
        }

        let mut grouped = Vec::new();
        for (_, mut books) in by_author {
            books.sort_by_key(|b| b.id);

            let mut explicit: BTreeMap<String, Vec<BookRecord>> = BTreeMap::new();
            let mut loose = Vec::new();
            for book in books {
                match book.series_name.as_deref().map(str::trim) {
                    Some(name) if !name.is_empty() => {
                        explicit.entry(name.to_lowercase()).or_default().push(book);
                    }
                    _ => loose.push(book),
                }
            }

            for (_, members) in explicit {
                grouped.extend(self.classify_explicit(members));
            }
            grouped.extend(self.classify_loose(loose));
        }

        grouped.sort_by(|a, b| {
            a.group_key
                .cmp(&b.group_key)
                .then(compare_indices(a.display_index, b.display_index))
                .then(a.record.id.cmp(&b.record.id))
        });
        grouped
    }

    /// Books sharing an explicit series name under one author. Catalog series
    /// indices are used as-is; members missing one get sequential integers in
    /// clean-title order, skipping values already taken.
    fn classify_explicit(&self, members: Vec<BookRecord>) -> Vec<GroupedBook> {
        let author = members[0].primary_author().to_string();
        let series = members[0]
            .series_name
            .as_deref()
            .unwrap_or_default()
            .trim()
            .to_string();
        let group_key = format!("{} - {}", author, series);

        let mut indexed: Vec<(BookRecord, String, Option<f64>)> = members
            .into_iter()
            .map(|b| {
                let clean = self.normalizer.clean(&b.title);
                let index = b.series_index;
                (b, clean, index)
            })
            .collect();

        // The catalog does not guarantee unique series indices. The lowest-id
        // holder of a value keeps it; later claimants are reassigned.
        let mut taken: BTreeSet<u64> = BTreeSet::new();
        let mut duplicates: Vec<usize> = Vec::new();
        for (slot, (_, _, idx)) in indexed.iter().enumerate() {
            if let Some(value) = idx {
                if !taken.insert(value.to_bits()) {
                    duplicates.push(slot);
                }
            }
        }

        // Fallback ordering for explicitly-series books the catalog left
        // unindexed: by clean title, lowest first, starting at 1.
        let mut missing: Vec<usize> = indexed
            .iter()
            .enumerate()
            .filter(|(_, (_, _, idx))| idx.is_none())
            .map(|(i, _)| i)
            .collect();
        missing.sort_by(|&a, &b| indexed[a].1.cmp(&indexed[b].1));

        let mut next = 1i64;
        for slot in duplicates {
            let value = next_free(&mut taken, &mut next);
            debug!(
                "series '{}': duplicate catalog index for '{}', reassigning volume {}",
                group_key, indexed[slot].1, value
            );
            indexed[slot].2 = Some(value);
        }
        for slot in missing {
            let value = next_free(&mut taken, &mut next);
            debug!(
                "series '{}': no catalog index for '{}', assigning volume {}",
                group_key, indexed[slot].1, value
            );
            indexed[slot].2 = Some(value);
        }

        let pad = index_pad(indexed.iter().filter_map(|(_, _, idx)| *idx));
        indexed
            .into_iter()
            .map(|(record, clean_title, index)| GroupedBook {
                record,
                group_key: group_key.clone(),
                is_series: true,
                display_index: index,
                index_pad: pad,
                clean_title,
            })
            .collect()
    }

    /// Books with no explicit series. Titles by the same author that share a
    /// prefix and carry distinct numeric hints form an inferred series;
    /// everything else is standalone.
    fn classify_loose(&self, books: Vec<BookRecord>) -> Vec<GroupedBook> {
        let mut by_prefix: BTreeMap<String, Vec<(BookRecord, String, String, f64)>> = BTreeMap::new();
        let mut standalone = Vec::new();

        for book in books {
            let clean = self.normalizer.clean(&book.title);
            match self.normalizer.sequence_hint(&clean) {
                Some(hint) => {
                    by_prefix
                        .entry(hint.prefix.to_lowercase())
                        .or_default()
                        .push((book, clean, hint.prefix, hint.index));
                }
                None => standalone.push((book, clean)),
            }
        }

        let mut grouped = Vec::new();
        for (_, members) in by_prefix {
            let distinct: BTreeSet<u64> = members.iter().map(|(_, _, _, idx)| idx.to_bits()).collect();
            if members.len() >= 2 && distinct.len() >= 2 {
                let author = members[0].0.primary_author().to_string();
                let prefix = members[0].2.clone();
                let group_key = format!("{} - {}", author, prefix);
                debug!(
                    "inferred series '{}' from {} title-pattern matches",
                    group_key,
                    members.len()
                );
                // A repeated hint inside a qualifying group would give two
                // books the same volume number; the lowest-id holder keeps
                // the hint and later ones move to the next free integer.
                let mut taken: BTreeSet<u64> = BTreeSet::new();
                let mut resolved: Vec<Option<f64>> = members
                    .iter()
                    .map(|(_, _, _, idx)| taken.insert(idx.to_bits()).then_some(*idx))
                    .collect();
                let mut next = 1i64;
                for (slot, index) in resolved.iter_mut().enumerate() {
                    if index.is_none() {
                        let value = next_free(&mut taken, &mut next);
                        debug!(
                            "inferred series '{}': duplicate hint for '{}', reassigning volume {}",
                            group_key, members[slot].1, value
                        );
                        *index = Some(value);
                    }
                }
                let pad = index_pad(resolved.iter().filter_map(|idx| *idx));
                for ((record, clean_title, _, _), index) in members.into_iter().zip(resolved) {
                    grouped.push(GroupedBook {
                        record,
                        group_key: group_key.clone(),
                        is_series: true,
                        display_index: index,
                        index_pad: pad,
                        clean_title,
                    });
                }
            } else {
                // Lone numeric hint: the number is part of the real title.
                standalone.extend(members.into_iter().map(|(b, clean, _, _)| (b, clean)));
            }
        }

        for (record, clean_title) in standalone {
            let group_key = record.primary_author().to_string();
            grouped.push(GroupedBook {
                record,
                group_key,
                is_series: false,
                display_index: None,
                index_pad: 2,
                clean_title,
            });
        }
        grouped
    }
}

impl Default for SeriesGrouper {
    fn default() -> Self {
        Self::new()
    }
}

/// Smallest positive integer not yet claimed as a display index.
fn next_free(taken: &mut BTreeSet<u64>, next: &mut i64) -> f64 {
    loop {
        let candidate = *next as f64;
        *next += 1;
        if taken.insert(candidate.to_bits()) {
            return candidate;
        }
    }
}

fn compare_indices(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

/// Volume numbers are padded to two digits, widened when a group's largest
/// index needs more.
fn index_pad(indices: impl Iterator<Item = f64>) -> usize {
    let max = indices.fold(0f64, f64::max);
    let digits = (max.trunc() as i64).to_string().len();
    digits.max(2)
}
