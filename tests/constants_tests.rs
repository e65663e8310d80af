// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use barcode_scanner::constants::{capture, file_formats, scanning};

#[test]
fn test_image_extensions_case_insensitive() {
    assert!(file_formats::is_image_extension("png"));
    assert!(file_formats::is_image_extension("JPG"));
    assert!(!file_formats::is_image_extension("mp4"));
}

#[test]
fn test_success_pause_longer_than_attempt_pause() {
    // Continuous mode must not re-report the same code faster than it polls
    assert!(scanning::SUCCESS_INTERVAL >= scanning::ATTEMPT_INTERVAL);
}

#[test]
fn test_mjpeg_is_last_resort() {
    assert_eq!(capture::PREFERRED_FOURCCS.last(), Some(&b"MJPG"));
}
