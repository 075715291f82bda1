pub mod config;
pub mod mapper;
pub mod melody;
pub mod note;
