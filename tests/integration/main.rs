//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises one component of the
//! update pipeline against mock ports. All tests run on the host with no
//! real hardware or network required.

mod adapter_tests;
mod mock_hw;
