// Shared fixtures: an in-memory ChatApi and an HTTP mock backend

pub mod fake_api;
pub mod mock_backend;

pub use fake_api::{Call, FakeApi};
pub use mock_backend::MockBackend;
