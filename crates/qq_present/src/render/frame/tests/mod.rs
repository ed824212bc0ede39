//! Test doubles and driver property tests
//!
//! Nothing here touches a GPU. [`mock::MockBackend`] models the GPU
//! timeline lazily: submitted work completes only when something waits on
//! it, which makes "how much work is in flight" observable and turns
//! ordering mistakes into recorded violations.


mod driver_tests;
