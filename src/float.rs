//! Floating point conversions that enable switching
//! between f64 and f32 as the primary float type.

/// Alias for the float type used by the renderer
#[cfg(not(feature = "single_precision"))]
pub type Float = f64;
#[cfg(feature = "single_precision")]
pub type Float = f32;

pub trait ToFloat {
    fn to_float(self) -> Float;
}

impl ToFloat for f64 {
    #[allow(clippy::unnecessary_cast)]
    fn to_float(self) -> Float {
        self as Float
    }
}

impl ToFloat for f32 {
    #[allow(clippy::unnecessary_cast)]
    fn to_float(self) -> Float {
        self as Float
    }
}

impl ToFloat for u8 {
    fn to_float(self) -> Float {
        self.into()
    }
}

impl ToFloat for u32 {
    #[allow(clippy::cast_lossless)]
    fn to_float(self) -> Float {
        self as Float
    }
}

impl ToFloat for usize {
    fn to_float(self) -> Float {
        self as Float
    }
}
