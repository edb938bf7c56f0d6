pub mod client;
pub mod request;
pub mod response;

pub use client::{HttpClient, HttpClientBuilder};
pub use request::{ApiRequest, HttpMethod};
pub use response::ApiResponse;
