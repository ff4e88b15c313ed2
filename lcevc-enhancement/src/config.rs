//! Stream and frame configuration.
//!
//! The bitstream parser is an upstream collaborator: it hands the decoder a
//! fully populated [`GlobalConfig`] (stable across a GOP, rebuilt at IDR) and
//! a [`FrameConfig`] per access unit. Nothing in this crate parses headers.

use lcevc_common::FixedPoint;

/// The two enhancement levels of quality.
///
/// LOQ1 residuals are applied at base resolution before upscaling; LOQ0
/// residuals are applied at the final resolution afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoqIndex {
    Loq0 = 0,
    Loq1 = 1,
}

/// Number of enhanced LOQs.
pub const LOQ_ENHANCED_COUNT: usize = 2;

/// Maximum number of planes carrying enhancement.
pub const MAX_PLANES: usize = 3;

/// Maximum number of coefficient layers (DDS).
pub const MAX_LAYERS: usize = 16;

/// Inverse transform variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformType {
    /// Directional decomposition, 2x2, 4 coefficients.
    Dd,
    /// Directional decomposition squared, 4x4, 16 coefficients.
    Dds,
}

impl TransformType {
    /// Number of coefficients (and residuals) per transform unit.
    #[inline]
    pub fn layer_count(self) -> usize {
        match self {
            Self::Dd => 4,
            Self::Dds => 16,
        }
    }

    /// log2 of the TU side length.
    #[inline]
    pub fn tu_width_shift(self) -> u32 {
        match self {
            Self::Dd => 1,
            Self::Dds => 2,
        }
    }

    pub fn from_layer_count(count: usize) -> Self {
        if count == 16 { Self::Dds } else { Self::Dd }
    }
}

/// Per-LOQ dimensional scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalingMode {
    /// No upscale.
    None,
    /// Horizontal only.
    OneD,
    /// Vertical then horizontal.
    TwoD,
}

/// Upscale kernel selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpscaleType {
    Nearest,
    Linear,
    Cubic,
    ModifiedCubic,
    /// Kernel coefficients carried in the stream.
    AdaptiveCubic,
}

/// Chroma subsampling of the coded picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chroma {
    Monochrome,
    Yuv420,
    Yuv422,
    Yuv444,
}

impl Chroma {
    /// Width shift of chroma planes relative to luma.
    #[inline]
    pub fn width_shift(self, plane: usize) -> u32 {
        match self {
            Self::Yuv420 | Self::Yuv422 if plane > 0 => 1,
            _ => 0,
        }
    }

    /// Height shift of chroma planes relative to luma.
    #[inline]
    pub fn height_shift(self, plane: usize) -> u32 {
        match self {
            Self::Yuv420 if plane > 0 => 1,
            _ => 0,
        }
    }
}

/// Bit depth of a coded layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitDepth {
    Depth8,
    Depth10,
    Depth12,
    Depth14,
}

impl BitDepth {
    /// The unsigned storage format of this depth.
    #[inline]
    pub fn fixed_point(self) -> FixedPoint {
        match self {
            Self::Depth8 => FixedPoint::U8,
            Self::Depth10 => FixedPoint::U10,
            Self::Depth12 => FixedPoint::U12,
            Self::Depth14 => FixedPoint::U14,
        }
    }
}

/// A two-phase upscale kernel.
///
/// `forward` and `reverse` hold the taps for the two output phases; results
/// are divided by 2^14 with rounding.
#[derive(Debug, Clone, Copy)]
pub struct Kernel {
    pub length: usize,
    pub forward: [i16; 8],
    pub reverse: [i16; 8],
}

impl Kernel {
    pub fn new(forward: &[i16], reverse: &[i16]) -> Self {
        debug_assert!(matches!(forward.len(), 2 | 4 | 6 | 8));
        debug_assert_eq!(forward.len(), reverse.len());
        let mut kernel = Self {
            length: forward.len(),
            forward: [0; 8],
            reverse: [0; 8],
        };
        kernel.forward[..forward.len()].copy_from_slice(forward);
        kernel.reverse[..reverse.len()].copy_from_slice(reverse);
        kernel
    }

    /// The sample-replicating kernel.
    pub fn nearest() -> Self {
        Self::new(&[16384, 0], &[0, 16384])
    }

    pub fn linear() -> Self {
        Self::new(&[12288, 4096], &[4096, 12288])
    }

    pub fn cubic() -> Self {
        Self::new(&[-1382, 14285, 3942, -461], &[-461, 3942, 14285, -1382])
    }
}

/// Deblocking filter constants for LOQ1 DDS residuals.
#[derive(Debug, Clone, Copy, Default)]
pub struct Deblock {
    pub enabled: bool,
    /// Corner multiplier, 0..=16.
    pub corner: u8,
    /// Edge multiplier, 0..=16.
    pub side: u8,
}

/// Embedded user-data extraction config.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserDataConfig {
    pub enabled: bool,
    /// Coefficient layer the user bits are embedded in.
    pub layer_index: usize,
    /// Number of user bits to strip from each coefficient.
    pub shift: u32,
}

/// Tiled-picture configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TileDimensions {
    #[default]
    None,
    Dim512x256,
    Dim1024x512,
    Custom,
}

/// Dequantization dead-zone offset signalling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DequantOffsetMode {
    /// Offset derived from the step width.
    #[default]
    Default,
    /// The signalled constant is used directly.
    ConstOffset,
}

/// Dither kind, when enabled for a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DitherType {
    #[default]
    None,
    Uniform,
}

/// Sharpening kind. Stored and passed through; sharpening itself is applied
/// by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SharpenType {
    #[default]
    None,
    InLoop,
    OutOfLoop,
}

/// IDR flagging for an access unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NalType {
    Idr,
    NonIdr,
}

/// Interlaced field selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldType {
    #[default]
    Top = 0,
    Bottom = 1,
}

/// HDR and VUI metadata carried through to the presentation layer. The core
/// never interprets these.
#[derive(Debug, Clone, Copy, Default)]
pub struct HdrInfo {
    pub max_content_light_level: u16,
    pub max_pic_average_light_level: u16,
    pub mastering_display_present: bool,
    pub mastering_display_primaries: [[u16; 2]; 3],
    pub mastering_display_white_point: [u16; 2],
    pub mastering_display_luminance: [u32; 2],
}

/// VUI colour description pass-through.
#[derive(Debug, Clone, Copy, Default)]
pub struct VuiInfo {
    pub colour_primaries: u8,
    pub transfer_characteristics: u8,
    pub matrix_coefficients: u8,
    pub video_full_range: bool,
}

/// Edge crop amounts, applied by the caller when presenting.
#[derive(Debug, Clone, Copy, Default)]
pub struct Crop {
    pub left: u16,
    pub right: u16,
    pub top: u16,
    pub bottom: u16,
}

/// The quantization matrix: one scale per layer per LOQ, 16 = unity.
#[derive(Debug, Clone, Copy)]
pub struct QuantMatrix {
    pub values: [[u8; MAX_LAYERS]; LOQ_ENHANCED_COUNT],
}

impl Default for QuantMatrix {
    fn default() -> Self {
        Self {
            values: [[16; MAX_LAYERS]; LOQ_ENHANCED_COUNT],
        }
    }
}

/// Parameters that are global to a stream. They will not change within a
/// GOP; a new global config arrives with an IDR.
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    /// Dialect revision of the coded layer data.
    pub bitstream_version: u8,
    pub chroma: Chroma,
    pub base_depth: BitDepth,
    pub enhanced_depth: BitDepth,
    /// Use `enhanced_depth` for residuals on the base layer.
    pub loq1_use_enhanced_depth: bool,
    pub width: u16,
    pub height: u16,
    pub upscale: UpscaleType,
    pub scaling_modes: [ScalingMode; LOQ_ENHANCED_COUNT],
    pub num_planes: usize,
    pub temporal_enabled: bool,
    pub predicted_average_enabled: bool,
    pub temporal_reduced_signalling_enabled: bool,
    pub transform: TransformType,
    pub num_layers: usize,
    pub temporal_step_width_modifier: u8,
    pub chroma_step_width_multiplier: u8,
    pub kernel: Kernel,
    pub deblock: Deblock,
    pub crop_enabled: bool,
    pub crop: Crop,
    pub user_data: UserDataConfig,
    pub hdr_info: HdrInfo,
    pub vui_info: VuiInfo,
    pub tile_dimensions: TileDimensions,
    pub tile_width: [u16; MAX_PLANES],
    pub tile_height: [u16; MAX_PLANES],
    pub num_tiles: [[u32; LOQ_ENHANCED_COUNT]; MAX_PLANES],
}

impl GlobalConfig {
    /// Plane dimensions at the given LOQ.
    pub fn plane_dimensions(&self, plane: usize, loq: LoqIndex) -> (u32, u32) {
        let mut width = u32::from(self.width) >> self.chroma.width_shift(plane);
        let mut height = u32::from(self.height) >> self.chroma.height_shift(plane);

        if loq == LoqIndex::Loq1 {
            match self.scaling_modes[LoqIndex::Loq0 as usize] {
                ScalingMode::None => {}
                ScalingMode::OneD => width >>= 1,
                ScalingMode::TwoD => {
                    width >>= 1;
                    height >>= 1;
                }
            }
        }

        (width, height)
    }

    /// Whether residual surfaces are traversed in block-raster order.
    ///
    /// Plain surface raster is only used when both temporal prediction and
    /// tiling are off.
    #[inline]
    pub fn block_traversal(&self) -> bool {
        self.temporal_enabled || self.tile_dimensions != TileDimensions::None
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            bitstream_version: crate::entropy::BITSTREAM_VERSION_CURRENT,
            chroma: Chroma::Yuv420,
            base_depth: BitDepth::Depth8,
            enhanced_depth: BitDepth::Depth8,
            loq1_use_enhanced_depth: false,
            width: 0,
            height: 0,
            upscale: UpscaleType::Nearest,
            scaling_modes: [ScalingMode::TwoD, ScalingMode::None],
            num_planes: 1,
            temporal_enabled: false,
            predicted_average_enabled: false,
            temporal_reduced_signalling_enabled: false,
            transform: TransformType::Dds,
            num_layers: 16,
            temporal_step_width_modifier: 48,
            chroma_step_width_multiplier: 64,
            kernel: Kernel::nearest(),
            deblock: Deblock::default(),
            crop_enabled: false,
            crop: Crop::default(),
            user_data: UserDataConfig::default(),
            hdr_info: HdrInfo::default(),
            vui_info: VuiInfo::default(),
            tile_dimensions: TileDimensions::None,
            tile_width: [0; MAX_PLANES],
            tile_height: [0; MAX_PLANES],
            num_tiles: [[1; LOQ_ENHANCED_COUNT]; MAX_PLANES],
        }
    }
}

/// Parameters that change per access unit.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    pub nal_type: NalType,
    pub field_type: FieldType,
    /// Whether residuals are enabled on each LOQ this frame.
    pub loq_enabled: [bool; LOQ_ENHANCED_COUNT],
    /// Reset the temporal surfaces before decoding this frame.
    pub temporal_refresh: bool,
    /// Whether a temporal signal chunk is present.
    pub temporal_signalling_present: bool,
    pub quant_matrix: QuantMatrix,
    pub step_widths: [i32; LOQ_ENHANCED_COUNT],
    pub dequant_offset_mode: DequantOffsetMode,
    pub dequant_offset: i32,
    pub deblock_enabled: bool,
    pub dither_enabled: bool,
    pub dither_type: DitherType,
    pub dither_strength: u8,
    pub sharpen_type: SharpenType,
    pub sharpen_strength: f32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            nal_type: NalType::Idr,
            field_type: FieldType::Top,
            loq_enabled: [true; LOQ_ENHANCED_COUNT],
            temporal_refresh: true,
            temporal_signalling_present: false,
            quant_matrix: QuantMatrix::default(),
            step_widths: [32767; LOQ_ENHANCED_COUNT],
            dequant_offset_mode: DequantOffsetMode::Default,
            dequant_offset: 0,
            deblock_enabled: false,
            dither_enabled: false,
            dither_type: DitherType::None,
            dither_strength: 0,
            sharpen_type: SharpenType::None,
            sharpen_strength: 0.0,
        }
    }
}
