pub mod config;
pub mod error;
pub mod logging;
pub mod risk;

pub use config::{Config, ConfigError, FileLoggingSettings, LoggingSettings, SecurityConfig};
pub use error::{Error, RefusalError, Result, TimeoutError};
pub use logging::{LogFormat, init_logging};
pub use risk::{CommandRiskAssessment, RiskCategory, RiskContext};
