//! Trial-table construction helpers: repetition, block-wise shuffling,
//! frequency-balanced drawing and constrained orientation sampling.

use behex_core::{Result, Table};
use rand::Rng;
use rand::seq::SliceRandom;

/// Concatenate `n_reps` copies of a table, re-keying rows consecutively.
pub fn repeat_rows(table: &Table, n_reps: usize) -> Result<Table> {
    let mut out = Table::new(table.columns().to_vec());
    for _ in 0..n_reps {
        for position in 0..table.n_rows() {
            let cells = table
                .row_cells(position)
                .expect("position bounded by n_rows")
                .to_vec();
            out.push_row(cells)?;
        }
    }
    Ok(out)
}

/// Row-shuffling indices, shuffled within consecutive blocks of
/// `block_size` (the whole range when `None`); a shorter tail block is
/// shuffled on its own.
pub fn shuffle_indices<R: Rng + ?Sized>(
    n: usize,
    block_size: Option<usize>,
    rng: &mut R,
) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    let block = block_size.unwrap_or(n).max(1);
    for chunk in indices.chunks_mut(block) {
        chunk.shuffle(rng);
    }
    indices
}

/// Shuffle a table's rows in blocks, re-keying the result consecutively.
pub fn shuffle_rows<R: Rng + ?Sized>(
    table: &Table,
    block_size: Option<usize>,
    rng: &mut R,
) -> Result<Table> {
    let order = shuffle_indices(table.n_rows(), block_size, rng);
    let mut out = Table::new(table.columns().to_vec());
    for position in order {
        let cells = table
            .row_cells(position)
            .expect("index came from n_rows")
            .to_vec();
        out.push_row(cells)?;
    }
    Ok(out)
}

/// Draw `load` distinct indices, always preferring the least-shown ones,
/// with ties broken at random.
///
/// `shown[i]` counts how many times index `i` has been presented so far.
/// The slice is owned by the caller across the call and mutated as an
/// output parameter: each selected index's count grows by its entry in
/// `each_appears` (ones when `None`). Returns fewer than `load` indices
/// only if there are fewer indices than requested.
pub fn balance_draw<R: Rng + ?Sized>(
    shown: &mut [u32],
    load: usize,
    each_appears: Option<&[u32]>,
    rng: &mut R,
) -> Vec<usize> {
    let ones = vec![1u32; load];
    let each = each_appears.unwrap_or(&ones);
    let mut used = vec![false; shown.len()];
    let mut selected = Vec::with_capacity(each.len());

    for &add in each {
        let min_shown = shown
            .iter()
            .zip(&used)
            .filter(|(_, used)| !**used)
            .map(|(count, _)| *count)
            .min();
        let Some(min_shown) = min_shown else {
            break;
        };
        let candidates: Vec<usize> = (0..shown.len())
            .filter(|&i| !used[i] && shown[i] == min_shown)
            .collect();
        let pick = candidates[rng.random_range(0..candidates.len())];
        shown[pick] += add;
        used[pick] = true;
        selected.push(pick);
    }
    selected
}

/// Sample `num` orientations (degrees, centered on zero) whose pairwise
/// circular distance exceeds `min_diff`. `ignore_cardinal` excludes a
/// margin of that many degrees around the cardinal orientations.
/// `full_circle` spans -180..180, otherwise -90..90.
///
/// Returns the orientations and whether the full count could be drawn
/// under the separation constraint.
pub fn generate_orientations<R: Rng + ?Sized>(
    num: usize,
    min_diff: u32,
    ignore_cardinal: Option<u32>,
    full_circle: bool,
    rng: &mut R,
) -> (Vec<i32>, bool) {
    let span: i64 = if full_circle { 360 } else { 180 };
    let offset = span / 2;
    let mut usable = vec![true; span as usize];

    if let Some(margin) = ignore_cardinal.filter(|m| *m > 0) {
        let margin = margin as i64;
        let cardinals: &[i64] = if full_circle {
            &[0, 90, 180, 270, 360]
        } else {
            &[0, 90, 180]
        };
        for &angle in cardinals {
            for delta in -margin..=margin {
                let index = angle + delta;
                if (0..span).contains(&index) {
                    usable[index as usize] = false;
                }
            }
        }
    }

    let mut orientations = Vec::with_capacity(num);
    while orientations.len() < num {
        let candidates: Vec<i64> =
            (0..span).filter(|&i| usable[i as usize]).collect();
        if candidates.is_empty() {
            break;
        }
        let chosen = candidates[rng.random_range(0..candidates.len())];
        orientations.push((chosen - offset) as i32);

        // exclude the circular neighborhood of the chosen orientation
        for index in 0..span {
            let direct = (index - chosen).abs();
            let wrapped = span - direct;
            if direct.min(wrapped) <= min_diff as i64 {
                usable[index as usize] = false;
            }
        }
    }

    let success = orientations.len() == num;
    (orientations, success)
}
