// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Ready-made [`crate::port::RenderClient`]s.

pub mod tessellation;

pub use tessellation::TessellationScene;
