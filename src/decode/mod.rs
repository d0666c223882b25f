//! Workflow Decoding
//!
//! Turns JSON or YAML documents into typed [`Workflow`] values and back.
//!
//! # Structure
//!
//! - [`document`]: Raw bytes to a JSON value, with syntax error fragments
//! - [`shape`]: Primitive-or-object fields and path-aware object access
//! - [`variants`]: Tagged unions (states by `type`, auth by `scheme`)
//! - [`loader`]: Fetching referenced files from disk or over HTTP
//!
//! # File References
//!
//! Several top-level collections may be given as a string instead of their
//! inline value. The string is a path or URI to a document holding the
//! value:
//!
//! | Field | Inline | Referenced document |
//! |-------|--------|---------------------|
//! | `auth`, `secrets` | array | array, or object with the same key |
//! | `functions`, `events`, `retries`, `errors` | array | object with the same key |
//! | `constants`, `timeouts` | object | object, used as-is |
//!
//! Relative paths are searched in the document's own directory first (when
//! decoding a file) and then in the decoder's include paths.
//!
//! # Example
//!
//! ```
//! use swflow::decode::Decoder;
//!
//! let yaml = r#"
//! id: greeting
//! specVersion: "0.8"
//! start: Greet
//! states:
//!   - name: Greet
//!     type: inject
//!     data:
//!       message: Hello
//!     end: true
//! "#;
//!
//! let workflow = Decoder::new().decode_str(yaml).unwrap();
//! assert_eq!(workflow.states.len(), 1);
//! ```

pub mod document;
pub mod loader;
pub mod shape;
pub mod variants;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use log::{debug, info};
use serde::Serialize;
use serde_json::Value;

use self::document::DocumentFormat;
use self::loader::{DefaultLoader, ResourceLoader, DEFAULT_HTTP_TIMEOUT};
use self::shape::Fields;
use crate::error::{DecodeError, EncodeError, LoadError};
use crate::model::Workflow;

/// Nesting limit for file references that point at further references.
pub const MAX_REFERENCE_DEPTH: usize = 8;

/// Decoder settings.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Absolute directories searched for relative file references
    pub include_paths: Vec<PathBuf>,
    /// Timeout for HTTP(S) file references
    pub http_timeout: Duration,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            include_paths: Vec::new(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

/// Shape a top-level field takes once its file reference is resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
enum External {
    /// An array; `bare_file` allows the referenced document to be the
    /// array itself rather than an object wrapping it.
    List { bare_file: bool },
    /// An object, taken from the referenced document as a whole.
    Object,
}

/// Top-level fields that may be given as file references.
const EXTERNAL_FIELDS: &[(&str, External)] = &[
    ("auth", External::List { bare_file: true }),
    ("secrets", External::List { bare_file: true }),
    ("constants", External::Object),
    ("timeouts", External::Object),
    ("functions", External::List { bare_file: false }),
    ("events", External::List { bare_file: false }),
    ("retries", External::List { bare_file: false }),
    ("errors", External::List { bare_file: false }),
];

/// Workflow document decoder.
///
/// A decoder is `Send + Sync`; include paths may be replaced while other
/// threads decode, and each decode call sees one consistent snapshot.
pub struct Decoder {
    include_paths: RwLock<Arc<[PathBuf]>>,
    loader: Box<dyn ResourceLoader>,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("include_paths", &self.include_paths())
            .finish_non_exhaustive()
    }
}

impl Decoder {
    /// Creates a decoder with no include paths and the default loader.
    pub fn new() -> Self {
        Self {
            include_paths: RwLock::new(Arc::from(Vec::new())),
            loader: Box::new(DefaultLoader::default()),
        }
    }

    /// Creates a decoder from explicit settings.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::IncludePath`] if an include path is relative.
    pub fn with_config(config: DecoderConfig) -> Result<Self, DecodeError> {
        let decoder = Self {
            include_paths: RwLock::new(Arc::from(Vec::new())),
            loader: Box::new(DefaultLoader::with_timeout(config.http_timeout)),
        };
        decoder.set_include_paths(config.include_paths)?;
        Ok(decoder)
    }

    /// Replaces the resource loader.
    pub fn with_loader(mut self, loader: impl ResourceLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    /// Current include paths.
    pub fn include_paths(&self) -> Arc<[PathBuf]> {
        self.include_paths
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the include paths; every path must be absolute.
    ///
    /// On error the previous paths are kept.
    pub fn set_include_paths(&self, paths: Vec<PathBuf>) -> Result<(), DecodeError> {
        if let Some(relative) = paths.iter().find(|p| !p.is_absolute()) {
            return Err(DecodeError::IncludePath(relative.clone()));
        }
        debug!("Include paths set to {:?}", paths);
        *self
            .include_paths
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::from(paths);
        Ok(())
    }

    /// Decodes a JSON or YAML document.
    pub fn decode_slice(&self, bytes: &[u8]) -> Result<Workflow, DecodeError> {
        let value = document::parse(bytes, "workflow")?;
        self.decode_value(value)
    }

    pub fn decode_str(&self, text: &str) -> Result<Workflow, DecodeError> {
        self.decode_slice(text.as_bytes())
    }

    /// Decodes an already-parsed document.
    pub fn decode_value(&self, value: Value) -> Result<Workflow, DecodeError> {
        let search = self.include_paths().to_vec();
        self.decode_with_search(value, &search)
    }

    /// Reads and decodes a file.
    ///
    /// The file's directory is searched before the include paths when
    /// resolving relative file references.
    pub fn decode_file(&self, path: impl AsRef<Path>) -> Result<Workflow, DecodeError> {
        let path = path.as_ref();
        let label = path.display().to_string();
        info!("Loading workflow from {}", label);

        let bytes = fs::read(path).map_err(|source| DecodeError::Resource {
            path: "workflow".to_string(),
            uri: label.clone(),
            source: LoadError::Io {
                path: path.to_path_buf(),
                source,
            },
        })?;
        let value = document::parse_as(&bytes, DocumentFormat::from_extension(&label), "workflow")?;

        let mut search = Vec::new();
        let parent = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        if let Ok(dir) = fs::canonicalize(parent) {
            search.push(dir);
        }
        search.extend(self.include_paths().iter().cloned());

        self.decode_with_search(value, &search)
    }

    fn decode_with_search(&self, value: Value, search: &[PathBuf]) -> Result<Workflow, DecodeError> {
        if !value.is_object() {
            return Err(DecodeError::UnsupportedShape {
                path: "workflow".to_string(),
                accepted: "object".to_string(),
            });
        }
        let mut fields = Fields::new(value, "")?;

        for (key, external) in EXTERNAL_FIELDS {
            if let Some(raw) = fields.take_raw(key) {
                let resolved = self.resolve(raw, key, *external, search, 0)?;
                fields.put_raw(key, resolved);
            }
        }

        let workflow = decode_workflow(fields)?;
        info!(
            "Decoded workflow '{}': {} states, {} functions, {} events",
            workflow.label(),
            workflow.states.len(),
            workflow.functions.len(),
            workflow.events.len()
        );
        Ok(workflow)
    }

    /// Resolves a top-level field that may be a file reference.
    fn resolve(
        &self,
        raw: Value,
        key: &str,
        external: External,
        search: &[PathBuf],
        depth: usize,
    ) -> Result<Value, DecodeError> {
        match (raw, external) {
            (Value::String(uri), _) => {
                let resource_error = |source: LoadError| DecodeError::Resource {
                    path: key.to_string(),
                    uri: uri.clone(),
                    source,
                };
                if depth >= MAX_REFERENCE_DEPTH {
                    return Err(resource_error(LoadError::InvalidResource(format!(
                        "more than {} nested references",
                        MAX_REFERENCE_DEPTH
                    ))));
                }

                debug!("Resolving {} from {}", key, uri);
                let resource = self.loader.load(&uri, search).map_err(resource_error)?;
                let document = document::parse_as(&resource.bytes, resource.format, &uri)?;
                let extracted = extract(document, key, external)
                    .map_err(|msg| resource_error(LoadError::InvalidResource(msg)))?;

                self.resolve(extracted, key, external, search, depth + 1)
            }
            (value @ Value::Array(_), External::List { .. }) => Ok(value),
            (value @ Value::Object(_), External::Object) => Ok(value),
            (_, External::List { .. }) => Err(DecodeError::UnsupportedShape {
                path: key.to_string(),
                accepted: "string or array".to_string(),
            }),
            (_, External::Object) => Err(DecodeError::UnsupportedShape {
                path: key.to_string(),
                accepted: "string or object".to_string(),
            }),
        }
    }
}

/// Picks the field's value out of a referenced document.
fn extract(document: Value, key: &str, external: External) -> Result<Value, String> {
    match (document, external) {
        (value @ Value::Array(_), External::List { bare_file: true }) => Ok(value),
        (Value::Array(_), _) => Err(format!(
            "{} cannot be an array, only auth and secrets can",
            key
        )),
        (value @ Value::Object(_), External::Object) => Ok(value),
        (Value::Object(mut map), External::List { .. }) => map
            .remove(key)
            .ok_or_else(|| format!("external resource parameter not found: {:?}", key)),
        (other, _) => Err(format!(
            "must be an object or an array, found {}",
            shape::shape_name(&other)
        )),
    }
}

/// Decodes the root object once file references are inlined.
fn decode_workflow(mut fields: Fields) -> Result<Workflow, DecodeError> {
    Ok(Workflow {
        id: fields.opt("id")?,
        key: fields.opt("key")?,
        name: fields.opt("name")?,
        description: fields.opt("description")?,
        version: fields.opt("version")?,
        annotations: fields.or_default("annotations")?,
        data_input_schema: fields.shorthand("dataInputSchema")?,
        spec_version: fields.or_default("specVersion")?,
        secrets: fields.or_default("secrets")?,
        constants: fields.opt("constants")?,
        start: fields.shorthand("start")?,
        expression_lang: fields.or_default("expressionLang")?,
        timeouts: fields.opt("timeouts")?,
        errors: fields.list("errors")?,
        keep_active: fields.or_default("keepActive")?,
        metadata: fields.opt("metadata")?,
        auto_retries: fields.or_default("autoRetries")?,
        auth: fields.list_with("auth", variants::decode_auth)?,
        states: fields.list_with("states", variants::decode_state)?,
        events: fields.list("events")?,
        functions: fields.list("functions")?,
        retries: fields.list("retries")?,
    })
}

/// Decodes a JSON or YAML string with a default decoder.
pub fn from_str(text: &str) -> Result<Workflow, DecodeError> {
    Decoder::new().decode_str(text)
}

/// Decodes a workflow file with a default decoder.
///
/// # Example
///
/// ```no_run
/// use swflow::decode::load_workflow;
///
/// let workflow = load_workflow("order.sw.yaml").unwrap();
/// println!("{} states", workflow.states.len());
/// ```
pub fn load_workflow(path: impl AsRef<Path>) -> Result<Workflow, DecodeError> {
    Decoder::new().decode_file(path)
}

/// Encodes a workflow in its canonical JSON form.
pub fn encode_json<T: Serialize>(workflow: &T) -> Result<String, EncodeError> {
    Ok(serde_json::to_string(workflow)?)
}

pub fn encode_json_pretty<T: Serialize>(workflow: &T) -> Result<String, EncodeError> {
    Ok(serde_json::to_string_pretty(workflow)?)
}

/// Encodes a workflow in its canonical YAML form.
pub fn encode_yaml<T: Serialize>(workflow: &T) -> Result<String, EncodeError> {
    Ok(serde_yaml::to_string(workflow)?)
}

/// Writes a workflow to `path`, as YAML for `.yaml`/`.yml` files and as
/// pretty JSON otherwise.
pub fn save_workflow(workflow: &Workflow, path: impl AsRef<Path>) -> Result<(), crate::Error> {
    let path = path.as_ref();
    let text = match DocumentFormat::from_extension(&path.to_string_lossy()) {
        Some(DocumentFormat::Yaml) => encode_yaml(workflow)?,
        _ => encode_json_pretty(workflow)?,
    };
    fs::write(path, text)?;
    info!("Saved workflow '{}' to {}", workflow.label(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::loader::MemoryLoader;
    use super::*;
    use crate::model::{StateKind, UNLIMITED};
    use serde_json::json;
    use tempfile::TempDir;

    const ORDER: &str = r#"
id: order
version: "1.0"
specVersion: "0.8"
start: CheckInventory
functions:
  - name: checkInventory
    operation: https://inventory.example.com/openapi.json#check
  - name: charge
    operation: https://billing.example.com/openapi.json#charge
states:
  - name: CheckInventory
    type: operation
    actions:
      - functionRef: checkInventory
    transition: Charge
  - name: Charge
    type: operation
    actions:
      - functionRef:
          refName: charge
          arguments:
            amount: "${ .total }"
    end: true
"#;

    #[test]
    fn test_decode_yaml_document() {
        let workflow = from_str(ORDER).unwrap();
        assert_eq!(workflow.id.as_deref(), Some("order"));
        assert_eq!(workflow.start.as_ref().unwrap().state_name, "CheckInventory");
        assert_eq!(workflow.functions.len(), 2);
        assert_eq!(workflow.states.len(), 2);
        assert!(workflow.states[1].end.is_some());
    }

    #[test]
    fn test_yaml_and_json_decode_equal() {
        let from_yaml = from_str(ORDER).unwrap();
        let json = encode_json(&from_yaml).unwrap();
        let from_json = from_str(&json).unwrap();
        assert_eq!(from_yaml, from_json);
    }

    #[test]
    fn test_encode_is_idempotent() {
        let once = from_str(ORDER).unwrap();
        let first = encode_json(&once).unwrap();
        let second = encode_json(&from_str(&first).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_canonical_encoding_expands_shorthands() {
        let workflow = from_str(ORDER).unwrap();
        let encoded: Value = serde_json::to_value(&workflow).unwrap();
        assert_eq!(encoded["start"], json!({"stateName": "CheckInventory"}));
        assert_eq!(encoded["states"][0]["transition"], json!({"nextState": "Charge"}));
        assert_eq!(encoded["states"][0]["actions"][0]["functionRef"]["invoke"], json!("sync"));
        assert_eq!(encoded["expressionLang"], json!("jq"));
    }

    #[test]
    fn test_root_must_be_object() {
        let err = from_str("[1, 2]").unwrap_err();
        assert_eq!(err.to_string(), "workflow must be object");
    }

    #[test]
    fn test_unknown_state_type_aborts_decode() {
        let err = from_str(r#"{"id": "w", "states": [{"name": "A", "type": "wait"}]}"#)
            .unwrap_err();
        assert!(matches!(err, DecodeError::UnknownVariant { .. }));
    }

    #[test]
    fn test_functions_from_memory_resource() {
        let loader = MemoryLoader::new().with(
            "functions.json",
            r#"{"functions": [{"name": "f", "operation": "op"}]}"#,
        );
        let decoder = Decoder::new().with_loader(loader);
        let workflow = decoder
            .decode_str(r#"{"id": "w", "functions": "functions.json"}"#)
            .unwrap();
        assert_eq!(workflow.functions[0].name, "f");
    }

    #[test]
    fn test_secrets_bare_array_resource() {
        let loader = MemoryLoader::new().with("secrets.yaml", "- apiKey\n- dbPassword\n");
        let workflow = Decoder::new()
            .with_loader(loader)
            .decode_str(r#"{"id": "w", "secrets": "secrets.yaml"}"#)
            .unwrap();
        assert_eq!(workflow.secrets, vec!["apiKey", "dbPassword"]);
    }

    #[test]
    fn test_events_bare_array_rejected() {
        let loader = MemoryLoader::new().with("events.json", r#"[{"name": "e"}]"#);
        let err = Decoder::new()
            .with_loader(loader)
            .decode_str(r#"{"id": "w", "events": "events.json"}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Resource {
                source: LoadError::InvalidResource(_),
                ..
            }
        ));
    }

    #[test]
    fn test_missing_parameter_in_resource() {
        let loader = MemoryLoader::new().with("retries.json", r#"{"functions": []}"#);
        let err = Decoder::new()
            .with_loader(loader)
            .decode_str(r#"{"id": "w", "retries": "retries.json"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("external resource parameter not found"));
        assert_eq!(err.path(), Some("retries"));
    }

    #[test]
    fn test_constants_resource_used_directly() {
        let loader = MemoryLoader::new().with("constants.json", r#"{"region": "eu"}"#);
        let workflow = Decoder::new()
            .with_loader(loader)
            .decode_str(r#"{"id": "w", "constants": "constants.json"}"#)
            .unwrap();
        assert_eq!(workflow.constants.unwrap()["region"], json!("eu"));
    }

    #[test]
    fn test_nested_references_are_bounded() {
        let loader = MemoryLoader::new().with("loop.json", r#"{"errors": "loop.json"}"#);
        let err = Decoder::new()
            .with_loader(loader)
            .decode_str(r#"{"id": "w", "errors": "loop.json"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("nested references"));
    }

    #[test]
    fn test_missing_resource_aborts() {
        let err = Decoder::new()
            .with_loader(MemoryLoader::new())
            .decode_str(r#"{"id": "w", "events": "events.json"}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Resource {
                source: LoadError::NotFound { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_unresponsive_http_resource_times_out() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        std::thread::spawn(move || {
            // Hold the connection open without answering
            if let Ok((stream, _)) = listener.accept() {
                std::thread::sleep(Duration::from_secs(5));
                drop(stream);
            }
        });

        let decoder = Decoder::with_config(DecoderConfig {
            http_timeout: Duration::from_millis(200),
            ..DecoderConfig::default()
        })
        .unwrap();
        let document = format!(
            r#"{{"id": "w", "functions": "http://127.0.0.1:{}/functions.json"}}"#,
            port
        );
        let err = decoder.decode_str(&document).unwrap_err();
        assert!(
            matches!(
                err,
                DecodeError::Resource {
                    source: LoadError::Timeout(_),
                    ..
                }
            ),
            "{:?}",
            err
        );
    }

    #[test]
    fn test_inline_wrong_shape() {
        let err = from_str(r#"{"id": "w", "functions": {"name": "f"}}"#).unwrap_err();
        assert_eq!(err.to_string(), "functions must be string or array");
    }

    #[test]
    fn test_include_paths_must_be_absolute() {
        let decoder = Decoder::new();
        let err = decoder
            .set_include_paths(vec![PathBuf::from("relative/dir")])
            .unwrap_err();
        assert!(matches!(err, DecodeError::IncludePath(_)));
        assert!(decoder.include_paths().is_empty());

        let config = DecoderConfig {
            include_paths: vec![PathBuf::from("also/relative")],
            ..DecoderConfig::default()
        };
        assert!(Decoder::with_config(config).is_err());
    }

    #[test]
    fn test_decode_file_searches_document_dir() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("events.yaml"),
            "events:\n  - name: OrderPlaced\n    type: order.placed\n    source: shop\n",
        )
        .unwrap();
        let path = dir.path().join("order.sw.json");
        fs::write(&path, r#"{"id": "order", "events": "events.yaml"}"#).unwrap();

        let workflow = Decoder::new().decode_file(&path).unwrap();
        assert_eq!(workflow.events[0].name, "OrderPlaced");
    }

    #[test]
    fn test_decode_file_uses_include_paths() {
        let shared = TempDir::new().unwrap();
        fs::write(
            shared.path().join("errors.json"),
            r#"{"errors": [{"name": "NotFound", "code": "404"}]}"#,
        )
        .unwrap();
        let docs = TempDir::new().unwrap();
        let path = docs.path().join("w.json");
        fs::write(&path, r#"{"id": "w", "errors": "errors.json"}"#).unwrap();

        let decoder = Decoder::new();
        decoder
            .set_include_paths(vec![shared.path().to_path_buf()])
            .unwrap();
        let workflow = decoder.decode_file(&path).unwrap();
        assert_eq!(workflow.errors[0].name, "NotFound");
    }

    #[test]
    fn test_timeouts_shorthand_defaults() {
        let workflow = from_str(
            r#"{"id": "w", "timeouts": {"workflowExecTimeout": "PT1H"}, "states": [
                {"name": "S", "type": "sleep", "duration": "PT5S", "end": true}
            ]}"#,
        )
        .unwrap();
        let exec = workflow.timeouts.unwrap().workflow_exec_timeout.unwrap();
        assert_eq!(exec.duration, "PT1H");
        assert!(exec.interrupt);
        assert!(matches!(workflow.states[0].kind, StateKind::Sleep(_)));

        let unlimited = from_str(r#"{"id": "w", "timeouts": {"workflowExecTimeout": {}}}"#)
            .unwrap();
        assert_eq!(
            unlimited.timeouts.unwrap().workflow_exec_timeout.unwrap().duration,
            UNLIMITED
        );
    }

    #[test]
    fn test_save_workflow_yaml_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("saved.sw.yaml");
        let workflow = from_str(ORDER).unwrap();

        save_workflow(&workflow, &path).unwrap();
        let reloaded = load_workflow(&path).unwrap();
        assert_eq!(workflow, reloaded);
    }
}
