//! Job lifecycle tracking.
//!
//! The controller drives one analysis job through its state machine; the
//! poller is the request/response fallback for progress delivery.

pub mod controller;
pub mod poller;

pub use controller::{AnalysisJobController, ControllerConfig};
pub use poller::JobPoller;
