mod bounding_box;
#[cfg(feature = "webcam")]
mod camera;
mod routes;
mod server;
#[cfg(test)]
mod test_utils;
mod throttle;

pub mod app;
pub mod classifier;
pub mod config;
pub mod direction;
pub mod dispatch;
pub mod frame;
pub mod frame_source;
pub mod landmarks;
pub mod pipeline;
pub mod prediction;
pub mod telemetry;

pub use app::start_app;
pub use bounding_box::BoundingBox;
pub use direction::{Direction, GestureMap, GesturePreset};
pub use throttle::Throttle;
