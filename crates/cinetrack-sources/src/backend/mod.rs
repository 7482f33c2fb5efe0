pub mod api;
pub mod client;

pub use api::LikeCount;
pub use client::BackendClient;
