//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a slice of the agent
//! against mock adapters.  All tests run on the host (x86_64) with no
//! real hardware required.

mod agent_cycle_tests;
mod mock_platform;
mod provisioning_flow_tests;
