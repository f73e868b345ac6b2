//! Live analysis of a BrAPI server against its OpenAPI document
//!
//! Executes the request catalog built by `brapi-conformance-parser`,
//! threading extracted identifiers between requests, and validates every
//! exchange against the document.
//!
//! # Examples
//!
//! ```no_run
//! use brapi_conformance_analyzer::Analyser;
//! use brapi_conformance_common::{NoAuthorization, OptionsFile};
//! use brapi_conformance_parser::OpenApiParser;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> brapi_conformance_common::Result<()> {
//! let parser = OpenApiParser::from_file("brapi_core.yaml")?;
//! let options = OptionsFile::default().with_base_url("https://test-server.brapi.org/brapi/v2");
//! let analyser = Analyser::new(&parser, &options, Box::new(NoAuthorization))?;
//!
//! let outcome = analyser.analyse_all(CancellationToken::new()).await;
//! println!("{}", outcome.to_text()?);
//! # Ok(())
//! # }
//! ```

mod analyser;
pub mod executor;
mod output;
pub mod store;
pub mod substitution;
mod summary;
pub mod validator;

pub use analyser::{AnalysisOutcome, Analyser};
pub use executor::{RequestExecutor, RunContext};
pub use output::{generate_json, generate_text};
pub use store::VariableStore;
pub use summary::RunSummary;
pub use validator::{Exchange, OpenApiValidator};
