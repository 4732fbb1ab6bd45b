use std::ops::{Add, AddAssign, Div, DivAssign, Index, IndexMut, Mul, MulAssign, Sub, SubAssign};

use cgmath::prelude::*;
use cgmath::Vector3;

use crate::float::*;

fn to_srgb(c: Float) -> Float {
    c.powf(1.0 / 2.2)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SrgbColor(BaseColor);

impl SrgbColor {
    pub fn to_pixel(self) -> image::Rgb<u8> {
        let conv = |f: Float| (f.max(0.0).min(1.0) * std::u8::MAX.to_float()) as u8;
        image::Rgb([conv(self.0.r()), conv(self.0.g()), conv(self.0.b())])
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color(BaseColor);

impl Color {
    pub fn new(r: Float, g: Float, b: Float) -> Self {
        Self(BaseColor::new(r, g, b))
    }

    pub fn black() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn white() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }

    pub fn to_srgb(self) -> SrgbColor {
        SrgbColor(self.0.map(to_srgb))
    }

    pub fn luma(&self) -> Float {
        self.0.luma()
    }

    /// Largest of the three components
    pub fn max_comp(&self) -> Float {
        self.0.color.x.max(self.0.color.y).max(self.0.color.z)
    }

    pub fn is_black(&self) -> bool {
        self.0.is_black()
    }

    pub fn is_finite(&self) -> bool {
        self.0.color.x.is_finite() && self.0.color.y.is_finite() && self.0.color.z.is_finite()
    }

    pub fn r(&self) -> Float {
        self.0.r()
    }

    pub fn g(&self) -> Float {
        self.0.g()
    }

    pub fn b(&self) -> Float {
        self.0.b()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct BaseColor {
    color: Vector3<Float>,
}

impl BaseColor {
    fn new(r: Float, g: Float, b: Float) -> Self {
        Self {
            color: Vector3::new(r, g, b),
        }
    }

    fn map(self, f: impl Fn(Float) -> Float) -> Self {
        Self::new(f(self.color.x), f(self.color.y), f(self.color.z))
    }

    fn luma(&self) -> Float {
        let luma_vec = Vector3::new(0.2126, 0.7152, 0.0722);
        luma_vec.dot(self.color)
    }

    fn is_black(&self) -> bool {
        self.color.x == 0.0 && self.color.y == 0.0 && self.color.z == 0.0
    }

    fn r(&self) -> Float {
        self.color.x
    }

    fn g(&self) -> Float {
        self.color.y
    }

    fn b(&self) -> Float {
        self.color.z
    }
}

impl Index<usize> for Color {
    type Output = Float;

    fn index(&self, i: usize) -> &Float {
        &self.0.color[i]
    }
}

impl IndexMut<usize> for Color {
    fn index_mut(&mut self, i: usize) -> &mut Float {
        &mut self.0.color[i]
    }
}

impl From<Vector3<Float>> for Color {
    fn from(vec: Vector3<Float>) -> Self {
        Self(BaseColor { color: vec })
    }
}

impl From<[f32; 3]> for Color {
    fn from(arr: [f32; 3]) -> Self {
        Self::new(arr[0].to_float(), arr[1].to_float(), arr[2].to_float())
    }
}

impl From<Color> for [f32; 3] {
    fn from(c: Color) -> Self {
        [c.r() as f32, c.g() as f32, c.b() as f32]
    }
}

// Arithmetic operations

impl Add for BaseColor {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl AddAssign for BaseColor {
    fn add_assign(&mut self, rhs: Self) {
        self.color += rhs.color;
    }
}

impl Sub for BaseColor {
    type Output = Self;

    fn sub(mut self, rhs: Self) -> Self {
        self -= rhs;
        self
    }
}

impl SubAssign for BaseColor {
    fn sub_assign(&mut self, rhs: Self) {
        self.color -= rhs.color;
    }
}

impl Mul for BaseColor {
    type Output = Self;

    fn mul(mut self, rhs: Self) -> Self {
        self *= rhs;
        self
    }
}

impl MulAssign for BaseColor {
    fn mul_assign(&mut self, rhs: Self) {
        self.color.mul_assign_element_wise(rhs.color);
    }
}

impl MulAssign<Float> for BaseColor {
    fn mul_assign(&mut self, rhs: Float) {
        self.color *= rhs;
    }
}

// Color operations delegated to BaseColor

impl Add for Color {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self.0 += rhs.0;
        self
    }
}

impl AddAssign for Color {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Color {
    type Output = Self;

    fn sub(mut self, rhs: Self) -> Self {
        self.0 -= rhs.0;
        self
    }
}

impl SubAssign for Color {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Mul for Color {
    type Output = Self;

    fn mul(mut self, rhs: Self) -> Self {
        self.0 *= rhs.0;
        self
    }
}

impl MulAssign for Color {
    fn mul_assign(&mut self, rhs: Self) {
        self.0 *= rhs.0;
    }
}

impl Mul<Float> for Color {
    type Output = Self;

    fn mul(mut self, rhs: Float) -> Self {
        self.0 *= rhs;
        self
    }
}

impl MulAssign<Float> for Color {
    fn mul_assign(&mut self, rhs: Float) {
        self.0 *= rhs;
    }
}

impl Mul<Color> for Float {
    type Output = Color;

    // Delegate to Color Mul
    fn mul(self, rhs: Color) -> Self::Output {
        rhs * self
    }
}

impl Div<Float> for Color {
    type Output = Self;

    fn div(mut self, rhs: Float) -> Self {
        self /= rhs;
        self
    }
}

impl DivAssign<Float> for Color {
    fn div_assign(&mut self, rhs: Float) {
        let recip = rhs.recip();
        self.0 *= recip;
    }
}
