pub mod check;
pub mod cleanup;
pub mod modules;
pub mod profiles;
pub mod render;
