pub mod deployer;
pub mod exports;
pub mod graph;
pub mod identifier;
pub mod profile;
pub mod reconciler;
pub mod resources;
pub mod service;
pub mod shared;
pub mod synthesis;
pub mod template;

pub use crate::domain::model::{Project, ServiceConfig};
pub use crate::domain::ports::{ImagePublisher, StackApi, Storage};
pub use crate::utils::error::Result;
