//! Domain services for mirage-kiosk

pub mod analysis_report;
pub mod gemini_client;
pub mod persistence_gateway;
pub mod variation_generator;

pub use analysis_report::{generate_report, AnalysisReport};
pub use gemini_client::GeminiClient;
pub use persistence_gateway::PersistenceGateway;
pub use variation_generator::{GenerationError, ImageBackend, VariationGenerator, VARIATION_INSTRUCTIONS};
