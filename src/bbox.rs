use serde_derive::{Deserialize, Serialize};
use std::marker::PhantomData;

use nalgebra as na;

pub trait BBoxFormat: std::fmt::Debug {}

/// Left-top-right-bottom format, contains left top and right bottom corners
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct Ltrb;
impl BBoxFormat for Ltrb {}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
#[serde(transparent)]
pub struct BBox<F: BBoxFormat>([f32; 4], #[serde(skip)] PhantomData<F>);

impl<F: BBoxFormat> BBox<F> {
    #[inline]
    pub fn as_slice(&self) -> &[f32; 4] {
        &self.0
    }
}

impl BBox<Ltrb> {
    #[inline]
    pub fn ltrb(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        BBox([x1, y1, x2, y2], PhantomData)
    }

    #[inline(always)]
    pub fn left(&self) -> f32 {
        self.0[0]
    }

    #[inline(always)]
    pub fn top(&self) -> f32 {
        self.0[1]
    }

    #[inline(always)]
    pub fn right(&self) -> f32 {
        self.0[2]
    }

    #[inline(always)]
    pub fn bottom(&self) -> f32 {
        self.0[3]
    }

    #[inline(always)]
    pub fn width(&self) -> f32 {
        self.right() - self.left()
    }

    #[inline(always)]
    pub fn height(&self) -> f32 {
        self.bottom() - self.top()
    }

    #[inline]
    pub fn center(&self) -> na::Point2<f32> {
        na::Point2::new(
            (self.left() + self.right()) / 2.0,
            (self.top() + self.bottom()) / 2.0,
        )
    }

    /// Finite corners with strictly positive width and height.
    pub fn is_well_formed(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
            && self.left() < self.right()
            && self.top() < self.bottom()
    }

    #[inline]
    pub fn contains(&self, p: na::Point2<f32>) -> bool {
        p.x >= self.left() && p.x <= self.right() && p.y >= self.top() && p.y <= self.bottom()
    }

    /// Shifts a box expressed relative to this box's top-left corner into the
    /// coordinate space this box lives in.
    #[inline]
    pub fn translate_inner(&self, inner: &BBox<Ltrb>) -> BBox<Ltrb> {
        BBox::ltrb(
            self.left() + inner.left(),
            self.top() + inner.top(),
            self.left() + inner.right(),
            self.top() + inner.bottom(),
        )
    }
}

/// Squared Euclidean distance, enough for nearest-neighbour comparisons.
#[inline]
pub fn distance_squared(a: &na::Point2<f32>, b: &na::Point2<f32>) -> f32 {
    na::distance_squared(a, b)
}

#[inline]
pub fn distance(a: &na::Point2<f32>, b: &na::Point2<f32>) -> f32 {
    na::distance(a, b)
}

/// Absolute frame coordinates of a plate box reported relative to the
/// vehicle crop it was found in.
#[inline]
pub fn absolute_plate_box(vehicle: &BBox<Ltrb>, plate_relative: &BBox<Ltrb>) -> BBox<Ltrb> {
    vehicle.translate_inner(plate_relative)
}

/// A plate belongs to a vehicle when its absolute center lies inside the
/// vehicle box.
pub fn plate_belongs_to(vehicle: &BBox<Ltrb>, plate_relative: &BBox<Ltrb>) -> bool {
    let c = absolute_plate_box(vehicle, plate_relative).center();

    vehicle.contains(c)
}
