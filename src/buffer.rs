//! In-memory pixel buffers.
//!
//! A [`PixelBuffer`] is a rectangular grid of 8-bit pixels with a declared
//! [`ColorSpace`] and [`PixelOrder`]:
//!
//! | Order | Array shape | Element offset |
//! |-------|-------------|----------------|
//! | Interleaved | (height, width, channels) | `pixel * channels + channel` |
//! | Planar | (channels, height, width) | `channel * pixel_count + pixel` |
//!
//! The backing array is always kept in standard (row-major) memory order, so
//! the linear offsets above address the element storage directly.

use std::str::FromStr;

use ndarray::{Array3, ArrayView3};

use crate::error::ThresholdError;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: usize,
    pub height: usize,
}

impl Size {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> usize {
        self.width * self.height
    }
}

/// Channel interpretation of a pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorModel {
    Grayscale,
    GrayscaleAlpha,
    Rgb,
    Bgr,
    Rgba,
    Bgra,
}

impl ColorModel {
    /// Number of channels a pixel of this model carries.
    pub fn channels(&self) -> usize {
        match self {
            Self::Grayscale => 1,
            Self::GrayscaleAlpha => 2,
            Self::Rgb | Self::Bgr => 3,
            Self::Rgba | Self::Bgra => 4,
        }
    }

    /// Default model for a bare channel count, as handed over by array-based hosts.
    pub fn from_channels(channels: usize) -> Option<Self> {
        match channels {
            1 => Some(Self::Grayscale),
            2 => Some(Self::GrayscaleAlpha),
            3 => Some(Self::Rgb),
            4 => Some(Self::Rgba),
            _ => None,
        }
    }
}

/// Color model with 8-bit unsigned channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorSpace {
    pub model: ColorModel,
}

impl ColorSpace {
    /// 4-channel RGBA, 8 bits per channel.
    pub const RGBA8: ColorSpace = ColorSpace { model: ColorModel::Rgba };

    pub fn new(model: ColorModel) -> Self {
        Self { model }
    }

    pub fn channels(&self) -> usize {
        self.model.channels()
    }

    /// Largest value a channel of this color space can hold.
    pub fn max_channel_value(&self) -> u8 {
        u8::MAX
    }
}

/// Memory order of the channels of a pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelOrder {
    /// RGB RGB RGB ...
    Interleaved,
    /// RRR... GGG... BBB...
    Planar,
}

impl TryFrom<u8> for PixelOrder {
    type Error = ThresholdError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(Self::Interleaved),
            1 => Ok(Self::Planar),
            other => Err(ThresholdError::InvalidLayout(other.to_string())),
        }
    }
}

impl FromStr for PixelOrder {
    type Err = ThresholdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "interleaved" => Ok(Self::Interleaved),
            "planar" => Ok(Self::Planar),
            _ => Err(ThresholdError::InvalidLayout(s.to_string())),
        }
    }
}

/// Owned 8-bit image with an explicit color space and pixel order.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    data: Array3<u8>,
    size: Size,
    color_space: ColorSpace,
    order: PixelOrder,
}

fn array_shape(size: Size, channels: usize, order: PixelOrder) -> (usize, usize, usize) {
    match order {
        PixelOrder::Interleaved => (size.height, size.width, channels),
        PixelOrder::Planar => (channels, size.height, size.width),
    }
}

impl PixelBuffer {
    /// Allocate a zero-filled buffer.
    pub fn new(size: Size, color_space: ColorSpace, order: PixelOrder) -> Self {
        let shape = array_shape(size, color_space.channels(), order);
        Self {
            data: Array3::zeros(shape),
            size,
            color_space,
            order,
        }
    }

    /// Adopt an array shaped (H, W, C) for interleaved or (C, H, W) for planar data.
    ///
    /// The channel axis must match the color model.
    pub fn from_array(
        array: Array3<u8>,
        color_space: ColorSpace,
        order: PixelOrder,
    ) -> Result<Self, ThresholdError> {
        let (a, b, c) = array.dim();
        let (size, channels) = match order {
            PixelOrder::Interleaved => (Size::new(b, a), c),
            PixelOrder::Planar => (Size::new(c, b), a),
        };
        // empty images still carry a channel axis
        if channels != color_space.channels() {
            return Err(ThresholdError::ChannelCountMismatch {
                expected: color_space.channels(),
                actual: channels,
            });
        }
        let expected = size.area() * color_space.channels();
        if array.len() != expected {
            return Err(ThresholdError::ShapeMismatch {
                expected,
                actual: array.len(),
            });
        }

        let data = if array.is_standard_layout() {
            array
        } else {
            array.as_standard_layout().into_owned()
        };

        Ok(Self {
            data,
            size,
            color_space,
            order,
        })
    }

    /// Adopt a flat element vector laid out according to `order`.
    pub fn from_raw(
        size: Size,
        color_space: ColorSpace,
        order: PixelOrder,
        data: Vec<u8>,
    ) -> Result<Self, ThresholdError> {
        let expected = size.area() * color_space.channels();
        let actual = data.len();
        let shape = array_shape(size, color_space.channels(), order);
        let data = Array3::from_shape_vec(shape, data)
            .map_err(|_| ThresholdError::ShapeMismatch { expected, actual })?;

        Ok(Self {
            data,
            size,
            color_space,
            order,
        })
    }

    pub fn width(&self) -> usize {
        self.size.width
    }

    pub fn height(&self) -> usize {
        self.size.height
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn channels(&self) -> usize {
        self.color_space.channels()
    }

    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    pub fn order(&self) -> PixelOrder {
        self.order
    }

    /// Total number of elements (pixels times channels).
    pub fn count(&self) -> usize {
        self.data.len()
    }

    pub fn pixel_count(&self) -> usize {
        self.size.area()
    }

    /// Linear element offset of `channel` of the pixel at linear index `pixel`.
    #[inline]
    pub fn offset(&self, pixel: usize, channel: usize) -> usize {
        match self.order {
            PixelOrder::Interleaved => pixel * self.channels() + channel,
            PixelOrder::Planar => channel * self.pixel_count() + pixel,
        }
    }

    /// All elements in memory order.
    pub fn elements(&self) -> &[u8] {
        self.data
            .as_slice()
            .expect("pixel buffer storage is always in standard layout")
    }

    fn elements_mut(&mut self) -> &mut [u8] {
        self.data
            .as_slice_mut()
            .expect("pixel buffer storage is always in standard layout")
    }

    /// Element at a linear offset.
    ///
    /// # Panics
    /// If `offset >= self.count()`.
    #[inline]
    pub fn at(&self, offset: usize) -> u8 {
        self.elements()[offset]
    }

    /// Write an element at a linear offset.
    ///
    /// # Panics
    /// If `offset >= self.count()`.
    #[inline]
    pub fn set_value(&mut self, offset: usize, value: u8) {
        self.elements_mut()[offset] = value;
    }

    pub fn fill(&mut self, value: u8) {
        self.data.fill(value);
    }

    /// Channel values of the pixel at (x, y), independent of pixel order.
    pub fn pixel(&self, x: usize, y: usize) -> Vec<u8> {
        let px = y * self.size.width + x;
        (0..self.channels()).map(|c| self.at(self.offset(px, c))).collect()
    }

    pub fn as_array(&self) -> ArrayView3<'_, u8> {
        self.data.view()
    }

    pub fn into_array(self) -> Array3<u8> {
        self.data
    }

    /// Elements in memory order, without the buffer metadata.
    pub fn into_raw_vec(self) -> Vec<u8> {
        let len = self.data.len();
        match self.data.into_raw_vec_and_offset() {
            (raw, Some(0)) if raw.len() == len => raw,
            (raw, Some(start)) => raw[start..start + len].to_vec(),
            (_, None) => Vec::new(),
        }
    }
}
