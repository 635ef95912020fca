pub mod health;
pub mod messages;
pub mod root;
pub mod scheduler;

#[cfg(test)]
mod test_support;

pub use root::{ApiState, EndpointsTags, api_service};
