//! Hand landmark detection and finger gesture classification.

pub mod alignment;
pub mod detection;
pub mod landmark;
