//! Hardware renderer core for the GS.
//!
//! Each primitive batch goes through the same steps: the GS state is turned into selector keys
//! and constants ([`plan`]), the keys are resolved into compiled shaders and state objects
//! ([`cache`]), and the resulting passes are issued through a [`DeviceContext`] that drops
//! redundant state changes.

pub mod cache;
pub mod config;
pub mod context;
/// Mapping layer from the fixed-function descriptors to `wgpu` state, for a `wgpu` backed
/// [`Device`].
#[allow(dead_code)]
pub(crate) mod convert;
pub mod data;
pub mod date;
pub mod device;
mod emulate;
pub mod error;
pub mod plan;
mod render;
pub mod selector;
pub mod state;

pub use cache::{ShaderSource, Templates};
pub use config::Config;
pub use context::DeviceContext;
pub use device::{Caps, Device};
pub use error::{CompileError, ConfigError, DrawError};
pub use plan::{DrawPlan, DrawRequest, Shuffle, Target, TextureSource, plan};
pub use render::Renderer;
