//! Trellis Core Types and Definitions
//!
//! This crate provides the foundational types shared by the Trellis graph
//! controller and its producers. It includes:
//!
//! - **Identifiers**: String-interned element identifiers ([`identifier::Id`])
//! - **Geometry**: Points, sizes, bounds and insets ([`geometry`] module)
//! - **Model**: Declarative graph snapshots ([`model`] module)

pub mod geometry;
pub mod identifier;
pub mod model;
