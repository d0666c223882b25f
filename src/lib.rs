//! swflow - Serverless Workflow Document Model and Validator
//!
//! Decodes serverless workflow definitions written in JSON or YAML into a
//! strongly typed document graph, then checks the graph for the
//! cross-references and structural rules the type system cannot express.
//! The crate does not execute workflows.
//!
//! # Architecture
//!
//! - [`model`]: The typed document graph (states, actions, definitions)
//! - [`decode`]: Shape decoding, file references and re-encoding
//! - [`index`]: Name-keyed lookup tables over a decoded workflow
//! - [`validator`]: Consistency rules producing [`Violation`]s
//! - [`report`]: Ordering and wording of violations
//! - [`error`]: Fatal decode/encode errors
//!
//! # Example
//!
//! ```rust,no_run
//! use swflow::{load_workflow, Validator};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Decode, resolving file references next to the document
//!     let workflow = load_workflow("order.sw.yaml")?;
//!
//!     // Collect every violation at once
//!     let report = Validator::new().report(&workflow);
//!     if !report.is_ok() {
//!         eprintln!("{}", report);
//!     }
//!     Ok(())
//! }
//! ```

pub mod decode;
pub mod error;
pub mod index;
pub mod model;
pub mod report;
pub mod validator;

// Re-export commonly used types
pub use decode::{
    encode_json, encode_json_pretty, encode_yaml, from_str, load_workflow, save_workflow, Decoder,
    DecoderConfig,
};
pub use error::{DecodeError, EncodeError, Error, LoadError};
pub use index::ReferenceIndex;
pub use model::{State, Workflow};
pub use report::Report;
pub use validator::{validate, Category, RuleKind, Validator, Violation};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "swflow";

/// `specVersion` written by [`Workflow::from_states`].
pub const DEFAULT_SPEC_VERSION: &str = "0.8";
