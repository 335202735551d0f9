//! Hand-landmark gesture control: filtering, sign and swipe classification,
//! worker scheduling and edge-triggered dispatch.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod gesture;
pub mod pipeline;
pub mod types;

pub use config::Config;
pub use dispatch::{Action, ActionExecutor, Controller, GestureDispatcher};
pub use error::{Error, Result};
pub use gesture::{GestureEngine, TemplateStore};
pub use pipeline::{FrameSource, LandmarkDetector, ResultReceiver, Session, start_session};
pub use types::{Frame, FrameResult, GestureLabel, Landmarks, PointerInfo};
