// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for camera capture
//!
//! # Modules
//!
//! - [`camera`]: device enumeration, stream acquisition and frame delivery
//!   for V4L2 cameras and the image-directory virtual camera

pub mod camera;
