//! Dequantization tables.
//!
//! Each coefficient layer has a step width and a dead-zone offset, split by
//! temporal signal because intra residuals quantize against a modified step
//! width. The tables are derived once per (plane, LOQ) and applied per
//! coefficient as `sat16(coeff * step_width + signum(coeff) * offset)`.

use lcevc_common::fixed_point::saturate_i16;

use crate::config::{DequantOffsetMode, FrameConfig, GlobalConfig, LoqIndex, MAX_LAYERS};
use crate::entropy::TemporalSignal;

const STEP_WIDTH_MAX: i32 = 32767;

/// Per-(temporal, layer) step widths and dead-zone offsets.
#[derive(Debug, Clone)]
pub struct Dequant {
    pub step_width: [[i16; MAX_LAYERS]; 2],
    pub offset: [[i16; MAX_LAYERS]; 2],
}

impl Dequant {
    /// Derive the table for one plane at one LOQ.
    ///
    /// The signalled step width is modulated per layer by the quantization
    /// matrix (16 = unity), per chroma plane by the chroma multiplier
    /// (64 = unity), and for intra residuals by the temporal step-width
    /// modifier. The dead zone is either the signalled constant or a
    /// step-width fraction.
    pub fn new(
        global: &GlobalConfig,
        frame: &FrameConfig,
        plane_index: usize,
        loq: LoqIndex,
    ) -> Self {
        let base = frame.step_widths[loq as usize].clamp(1, STEP_WIDTH_MAX);
        let quant_matrix = &frame.quant_matrix.values[loq as usize];

        let mut dequant = Self {
            step_width: [[0; MAX_LAYERS]; 2],
            offset: [[0; MAX_LAYERS]; 2],
        };

        for layer in 0..global.num_layers {
            let mut sw = (base * i32::from(quant_matrix[layer]) / 16).clamp(1, STEP_WIDTH_MAX);
            if plane_index > 0 {
                sw = (sw * i32::from(global.chroma_step_width_multiplier) / 64)
                    .clamp(1, STEP_WIDTH_MAX);
            }

            // Intra residuals overwrite carried state, so their step width
            // is narrowed by the temporal modifier on the temporal LOQ.
            let sw_intra = if loq == LoqIndex::Loq0 && global.temporal_enabled {
                (sw - sw * i32::from(global.temporal_step_width_modifier) / 255)
                    .clamp(1, STEP_WIDTH_MAX)
            } else {
                sw
            };

            let offset_for = |sw: i32| -> i16 {
                match frame.dequant_offset_mode {
                    DequantOffsetMode::ConstOffset => {
                        frame.dequant_offset.clamp(0, STEP_WIDTH_MAX) as i16
                    }
                    DequantOffsetMode::Default => (sw * 3 / 16) as i16,
                }
            };

            dequant.step_width[TemporalSignal::Inter as usize][layer] = sw as i16;
            dequant.step_width[TemporalSignal::Intra as usize][layer] = sw_intra as i16;
            dequant.offset[TemporalSignal::Inter as usize][layer] = offset_for(sw);
            dequant.offset[TemporalSignal::Intra as usize][layer] = offset_for(sw_intra);
        }

        dequant
    }

    /// Dequantize one coefficient of one layer.
    #[inline]
    pub fn apply(&self, temporal: TemporalSignal, layer: usize, coeff: i16) -> i16 {
        let sw = i32::from(self.step_width[temporal as usize][layer]);
        let offset = i32::from(self.offset[temporal as usize][layer]);
        let wide = i32::from(coeff) * sw + i32::from(coeff.signum()) * offset;
        saturate_i16(wide)
    }
}
