//! # opsdroid Testing
//!
//! Utilities for testing connectors, skills and whole runtimes:
//!
//! - [`ExternalApiMockServer`]: a real HTTP server that answers with queued
//!   responses, standing in for the platform API a connector talks to
//! - [`MockConnector`] (`module = "mock"`) and [`HelloSkill`]
//!   (`module = "hello"`)
//! - [`minimal_config`], [`test_runtime`], [`running_opsdroid`] and
//!   [`call_endpoint`] for driving a runtime
//! - [`LogCapture`], a `tracing` layer for asserting on log records
//!
//! ```rust,ignore
//! use opsdroid_testing::{running_opsdroid, test_config, test_runtime};
//!
//! #[tokio::test]
//! async fn test_hello() {
//!     let droid = test_runtime();
//!     droid.load(test_config()).unwrap();
//!
//!     running_opsdroid(&droid, async {
//!         assert!(droid.is_running());
//!     })
//!     .await
//!     .unwrap();
//! }
//! ```

pub mod error;
pub mod fixtures;
pub mod harness;
pub mod logs;
pub mod mock;

pub use error::{HarnessError, HarnessResult};
pub use fixtures::{
    call_endpoint, minimal_config, running_opsdroid, test_config, test_modules, test_runtime,
    wait_for_connectors,
};
pub use harness::{EXHAUSTED_HEADER, ExternalApiMockServer, Payload, RecordedRequest};
pub use logs::{CapturedRecord, LogCapture};
pub use mock::{AuthFailure, HelloConfig, HelloSkill, MockConfig, MockConnector};
