//! HTTP API handlers for mirage-kiosk
//!
//! `/flow/*` drives one visitor tab through the installation; `/api/*` are
//! the direct generation and persistence endpoints used by the second-device
//! result page.

pub mod flow;
pub mod generate;
pub mod health;
pub mod report;
pub mod sessions;

pub use flow::{flow_routes, TabId, TAB_HEADER};
pub use generate::generate_routes;
pub use health::health_routes;
pub use report::report_routes;
pub use sessions::session_routes;
