pub mod buffer;
pub mod color;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod filter;
pub mod models;
pub mod paginate;
pub mod push;
pub mod rank;
pub mod serve;
pub mod session;
pub mod source;
pub mod stats;

pub use config::Config;
pub use engine::{DashboardEngine, DashboardView};
pub use models::domain::ObservationRecord;
pub use models::dto::RecordDTO;
