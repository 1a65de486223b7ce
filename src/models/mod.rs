pub mod client_requests;
pub mod settings;
pub mod views;
