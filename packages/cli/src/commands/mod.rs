pub mod init;
pub mod inspect;
pub mod render;

pub use init::{init, InitArgs};
pub use inspect::{inspect, InspectArgs};
pub use render::{render, RenderArgs};
