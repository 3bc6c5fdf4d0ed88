pub mod logging;
pub mod node;
