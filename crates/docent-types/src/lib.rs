//! Shared types for the Docent orchestrator.
//!
//! Status events flow from the completion client, the tool loop and the
//! compactor to whatever front end is listening. The sink trait lives here so
//! that `docent-llm` and `docent-agent` can both emit without depending on
//! each other.

pub mod error;
pub mod status;

pub use error::{SinkError, SinkResult};
pub use status::{
    ChannelStatus, NoopStatus, RecordingStatus, SharedStatusSink, StatusEvent, StatusSink, emit,
};
