//! Synthetic test pattern: a white stripe bouncing vertically
//!
//! Emitted by the source endpoint whenever no producer is feeding the sink.
//! The stripe moves one row per generated frame and reverses at the frame
//! edges, so the sweep is deterministic and visually continuous.

use crate::types::FrameFormat;

/// Height of the white stripe in rows
pub const STRIPE_HEIGHT: u32 = 10;

/// Mutable sweep position, owned by the generator
///
/// `stripe_row` stays within `0..=height - STRIPE_HEIGHT`. `ascending`
/// means the stripe is moving toward row 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepState {
    pub stripe_row: u32,
    pub ascending: bool,
}

impl SweepState {
    /// Advance one step of the bounce and return the row to paint this frame
    ///
    /// The returned row is the pre-update position; the state update mirrors
    /// it so each extreme row is painted exactly once per cycle.
    pub fn advance(&mut self, height: u32) -> u32 {
        let row = self.stripe_row;
        if self.ascending {
            self.stripe_row = self.stripe_row.saturating_sub(1);
            self.ascending = self.stripe_row > 0;
        } else {
            self.stripe_row += 1;
            self.ascending = self.stripe_row >= height - STRIPE_HEIGHT;
        }
        row
    }
}

/// Paint one synthetic frame into `buf` and advance the sweep
///
/// Zeroes the whole buffer, then paints `STRIPE_HEIGHT` full rows of solid
/// white starting at the current sweep position. BGRA white is all-ones, so
/// the stripe is a plain byte fill.
pub fn paint_stripe(buf: &mut [u8], format: &FrameFormat, state: &mut SweepState) {
    debug_assert_eq!(buf.len(), format.frame_bytes());

    buf.fill(0);

    let row = state.advance(format.height);
    let stride = format.stride() as usize;
    let start = row as usize * stride;
    let end_row = (row + STRIPE_HEIGHT).min(format.height) as usize;
    buf[start..end_row * stride].fill(0xFF);
}
