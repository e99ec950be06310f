pub mod alerts;
pub mod debug_log;
pub mod map;
pub mod outlooks;
pub mod status;
pub mod surface;
pub mod utils;
