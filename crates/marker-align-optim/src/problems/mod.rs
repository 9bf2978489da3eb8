//! Problem definitions built on top of [`crate::NllsProblem`].

pub mod marker_alignment;
