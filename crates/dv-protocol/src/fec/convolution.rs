//! Rate 1/2, constraint length 5 convolutional code used by System Fusion
//!
//! Generators are G1 = 1 + D^3 + D^4 and G2 = 1 + D + D^2 + D^4. Decoding is
//! hard-decision Viterbi over the 16 encoder states with full chainback.

use crate::bits::{read_bit, write_bit};

const STATES: usize = 16;

/// Encoder outputs for an input bit leaving `state`; state bit 3 is the newest delay
fn branch(state: usize, d: bool) -> (bool, bool, usize) {
    let d1 = state & 0b1000 != 0;
    let d2 = state & 0b0100 != 0;
    let d3 = state & 0b0010 != 0;
    let d4 = state & 0b0001 != 0;
    let g1 = d ^ d3 ^ d4;
    let g2 = d ^ d1 ^ d2 ^ d4;
    let next = ((d as usize) << 3) | (state >> 1);
    (g1, g2, next)
}

/// Encode `n_bits` input bits into `2 * n_bits` output bits
pub fn encode(input: &[u8], output: &mut [u8], n_bits: usize) {
    let mut state = 0;
    for i in 0..n_bits {
        let (g1, g2, next) = branch(state, read_bit(input, i));
        write_bit(output, 2 * i, g1);
        write_bit(output, 2 * i + 1, g2);
        state = next;
    }
}

/// Decode `2 * n_steps` coded bits and return the first `n_out` data bits as bytes
///
/// The encoder is assumed to start in the all-zero state. When the input was
/// flushed with four zero tail bits the chainback starts from state zero.
pub fn decode(input: &[u8], n_steps: usize, n_out: usize) -> Vec<u8> {
    const UNREACHABLE: u32 = u32::MAX / 2;

    let mut metrics = [UNREACHABLE; STATES];
    metrics[0] = 0;
    let mut history: Vec<[u8; STATES]> = Vec::with_capacity(n_steps);

    for step in 0..n_steps {
        let r1 = read_bit(input, 2 * step);
        let r2 = read_bit(input, 2 * step + 1);
        let mut next_metrics = [UNREACHABLE; STATES];
        let mut prev = [0u8; STATES];

        for (state, &metric) in metrics.iter().enumerate() {
            if metric >= UNREACHABLE {
                continue;
            }
            for d in [false, true] {
                let (g1, g2, next) = branch(state, d);
                let cost = metric + u32::from(g1 != r1) + u32::from(g2 != r2);
                if cost < next_metrics[next] {
                    next_metrics[next] = cost;
                    prev[next] = state as u8;
                }
            }
        }

        metrics = next_metrics;
        history.push(prev);
    }

    let mut state = if metrics[0] < UNREACHABLE && n_steps >= n_out + 4 {
        0
    } else {
        (0..STATES).min_by_key(|&s| metrics[s]).unwrap_or(0)
    };

    let mut bits = vec![false; n_steps];
    for step in (0..n_steps).rev() {
        bits[step] = state & 0b1000 != 0;
        state = history[step][state] as usize;
    }

    let mut out = vec![0u8; n_out.div_ceil(8)];
    for (i, &bit) in bits.iter().take(n_out).enumerate() {
        write_bit(&mut out, i, bit);
    }
    out
}
