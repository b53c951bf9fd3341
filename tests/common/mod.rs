// Each integration test crate uses its own subset of these helpers
#![allow(dead_code)]

pub mod mocks;
pub mod test_helpers;
