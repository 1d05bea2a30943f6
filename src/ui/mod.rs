//! Panel UI: intent bus, toolkit seam, and the UI task.

pub mod bus;
pub mod task;
pub mod toolkit;
