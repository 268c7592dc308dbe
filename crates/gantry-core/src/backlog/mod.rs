pub mod api;
pub mod client;
pub mod model;

pub use api::BacklogApi;
pub use client::HttpBacklogClient;
