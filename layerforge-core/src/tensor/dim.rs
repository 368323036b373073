use std::fmt;

/// The four semantic extents of a tensor: batch, channel, height, width.
///
/// Layout is row-major with width varying fastest, so one batch entry is a
/// contiguous run of `feature_len()` elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TensorDim {
    pub batch: usize,
    pub channel: usize,
    pub height: usize,
    pub width: usize,
}

impl TensorDim {
    pub const fn new(batch: usize, channel: usize, height: usize, width: usize) -> Self {
        TensorDim {
            batch,
            channel,
            height,
            width,
        }
    }

    /// A single row vector `1:1:1:width`.
    pub const fn from_width(width: usize) -> Self {
        TensorDim::new(1, 1, 1, width)
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        self.batch * self.channel * self.height * self.width
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of elements in one batch entry.
    pub fn feature_len(&self) -> usize {
        self.channel * self.height * self.width
    }

    /// Row count when the tensor is seen as a `(batch*channel*height) x width` matrix.
    pub fn matrix_rows(&self) -> usize {
        self.batch * self.channel * self.height
    }

    pub fn with_batch(mut self, batch: usize) -> Self {
        self.batch = batch;
        self
    }

    pub fn with_height(mut self, height: usize) -> Self {
        self.height = height;
        self
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    /// Flat element index of `(b, c, h, w)`, or `None` if any coordinate is out of range.
    pub fn index(&self, b: usize, c: usize, h: usize, w: usize) -> Option<usize> {
        if b >= self.batch || c >= self.channel || h >= self.height || w >= self.width {
            return None;
        }
        Some(((b * self.channel + c) * self.height + h) * self.width + w)
    }
}

impl fmt::Display for TensorDim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}", self.batch, self.channel, self.height, self.width)
    }
}
