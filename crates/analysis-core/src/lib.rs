pub mod error;
pub mod rate_limit;
pub mod recommendation;
pub mod ticker;
pub mod traits;
pub mod types;

pub use error::*;
pub use rate_limit::RateLimiter;
pub use recommendation::*;
pub use ticker::*;
pub use traits::*;
pub use types::*;
