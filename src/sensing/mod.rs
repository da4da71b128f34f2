//! OS-facing collaborators and what the core derives from them.
//!
//! Capture and sampling mechanics live in the desktop shell; the core only
//! sees these traits.

pub mod activity;
pub mod frame;
pub mod phash;

pub use activity::ActivityWindow;
pub use frame::Frame;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::ActivitySample;

#[async_trait]
pub trait ScreenCapture: Send + Sync {
    async fn capture_frame(&self) -> Result<Frame>;
}

#[async_trait]
pub trait BehaviorSampler: Send + Sync {
    async fn sample(&self) -> Result<ActivitySample>;
}
