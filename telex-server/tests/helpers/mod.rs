//! Test Helper Utilities
//!
//! Shared utilities for testing telex-server

#![allow(dead_code)]

pub mod app;
pub mod fakes;

pub use app::{files_under, multipart_body, upload_request, video_part, Part, TestEnv, TestEnvBuilder};
pub use fakes::{position_sample, samples_for, FakeDecoder, FakeNormalizer};
