//! Error handling types

use thiserror::Error;

/// Result type alias for operations that can fail
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the Alloy compiler and runtime
///
/// Compiler-side variants surface during scanning, manifest ingestion, and
/// codegen. Runtime-side variants surface during resolution; they carry the
/// named resolution path (`A -> B -> C`) so the failing edge can be located
/// without a debugger.
#[derive(Error, Debug)]
pub enum Error {
    /// Source text could not be parsed into a syntax tree
    #[error("parse error in {file}: {message}")]
    Parse {
        /// File the parser choked on
        file: String,
        /// Description of the failure
        message: String,
    },

    /// A library manifest failed schema validation
    #[error("invalid manifest: {message}")]
    InvalidManifest {
        /// Description of the validation failure
        message: String,
    },

    /// A class name is both locally discovered and listed by a manifest
    #[error("duplicate registration for `{class_name}`: local {local_paths:?}, manifest `{manifest_path}`")]
    DuplicateRegistration {
        /// The colliding class name
        class_name: String,
        /// Every local file that declares the class
        local_paths: Vec<String>,
        /// The manifest import path that also lists it
        manifest_path: String,
    },

    /// A `lazy_services` entry does not carry the `alloy:` key prefix
    #[error("unsupported lazy identifier `{description}`: expected an `alloy:`-prefixed service key")]
    UnsupportedLazyIdentifier {
        /// The offending identifier description
        description: String,
    },

    /// Providers were listed in a manifest build that cannot give them stable specifiers
    #[error("manifest for `{package_name}` lists providers but build mode is `{build_mode}`; providers require `preserve-modules`")]
    ProvidersRequirePreserveModules {
        /// Package whose manifest is being emitted
        package_name: String,
        /// The configured (unsupported) build mode
        build_mode: String,
    },

    /// Dependency resolution revisited a constructor already on the stack
    #[error("circular dependency: {path}")]
    CircularDependency {
        /// The named cycle, `A -> B -> A`
        path: String,
    },

    /// A token dependency had no provided value
    #[error("missing token value for {token} (resolving {path})")]
    MissingToken {
        /// The token's description
        token: String,
        /// Resolution path at the point of failure
        path: String,
    },

    /// A dependency node was neither a constructor, token, nor deferred import
    #[error("invalid dependency of type `{type_tag}` (resolving {path})")]
    InvalidDependency {
        /// Runtime-type tag of the offending value
        type_tag: String,
        /// Resolution path at the point of failure
        path: String,
    },

    /// A deferred importer kept failing after its retry budget
    #[error("deferred import failed after {attempts} attempt(s) (resolving {path})")]
    DeferredImportFailed {
        /// Total attempts made (retries + 1)
        attempts: u32,
        /// Resolution path at the point of failure
        path: String,
        /// The last underlying cause
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A deferred importer resolved to something that is not a constructor
    #[error("deferred import resolved to `{resolved}`, not a class (resolving {path})")]
    NotAClass {
        /// Description of what the importer returned
        resolved: String,
        /// Resolution path at the point of failure
        path: String,
    },

    /// `get_by_identifier` was called with an unbound identifier
    #[error("no service registered for identifier {identifier}")]
    NoService {
        /// The unbound identifier's description
        identifier: String,
    },

    /// User code constructed a deferred-service placeholder directly
    #[error("`{class_name}` is a deferred-service placeholder and cannot be constructed directly")]
    PlaceholderInstantiated {
        /// The placeholder's class name
        class_name: String,
    },

    /// An explicit identifier was rebound to a different constructor
    #[error("identifier {identifier} is already bound to `{existing}`; cannot rebind to `{attempted}`")]
    IdentifierConflict {
        /// The identifier's description
        identifier: String,
        /// Class currently bound to it
        existing: String,
        /// Class the caller tried to bind
        attempted: String,
    },

    /// Service construction failed inside a user constructor
    #[error("construction of `{class_name}` failed: {message}")]
    Construction {
        /// The class whose constructor failed
        class_name: String,
        /// Description of the failure
        message: String,
    },

    /// I/O operation error
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O error
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// JSON parsing or serialization error
    #[error("JSON error: {source}")]
    Json {
        /// The underlying JSON error
        #[from]
        source: serde_json::Error,
    },

    /// Configuration-related error
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error
        message: String,
    },

    /// Internal invariant violation
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error
        message: String,
    },
}

// Compiler-side constructors
impl Error {
    /// Create a parse error
    pub fn parse<F: Into<String>, M: Into<String>>(file: F, message: M) -> Self {
        Self::Parse {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Create an invalid-manifest error
    pub fn invalid_manifest<S: Into<String>>(message: S) -> Self {
        Self::InvalidManifest {
            message: message.into(),
        }
    }

    /// Create a duplicate-registration error
    pub fn duplicate_registration<C, M>(class_name: C, local_paths: Vec<String>, manifest_path: M) -> Self
    where
        C: Into<String>,
        M: Into<String>,
    {
        Self::DuplicateRegistration {
            class_name: class_name.into(),
            local_paths,
            manifest_path: manifest_path.into(),
        }
    }

    /// Create an unsupported-lazy-identifier error
    pub fn unsupported_lazy_identifier<S: Into<String>>(description: S) -> Self {
        Self::UnsupportedLazyIdentifier {
            description: description.into(),
        }
    }

    /// Create a providers-require-preserve-modules error
    pub fn providers_require_preserve_modules<P, B>(package_name: P, build_mode: B) -> Self
    where
        P: Into<String>,
        B: Into<String>,
    {
        Self::ProvidersRequirePreserveModules {
            package_name: package_name.into(),
            build_mode: build_mode.into(),
        }
    }
}

// Runtime-side constructors
impl Error {
    /// Create a circular-dependency error from a named path
    pub fn circular_dependency<S: Into<String>>(path: S) -> Self {
        Self::CircularDependency { path: path.into() }
    }

    /// Create a missing-token error
    pub fn missing_token<T: Into<String>, P: Into<String>>(token: T, path: P) -> Self {
        Self::MissingToken {
            token: token.into(),
            path: path.into(),
        }
    }

    /// Create an invalid-dependency error
    pub fn invalid_dependency<T: Into<String>, P: Into<String>>(type_tag: T, path: P) -> Self {
        Self::InvalidDependency {
            type_tag: type_tag.into(),
            path: path.into(),
        }
    }

    /// Create a deferred-import-failed error wrapping the last cause
    pub fn deferred_import_failed<P: Into<String>>(
        attempts: u32,
        path: P,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::DeferredImportFailed {
            attempts,
            path: path.into(),
            source,
        }
    }

    /// Create a not-a-class error
    pub fn not_a_class<R: Into<String>, P: Into<String>>(resolved: R, path: P) -> Self {
        Self::NotAClass {
            resolved: resolved.into(),
            path: path.into(),
        }
    }

    /// Create a no-service error
    pub fn no_service<S: Into<String>>(identifier: S) -> Self {
        Self::NoService {
            identifier: identifier.into(),
        }
    }

    /// Create a placeholder-instantiated error
    pub fn placeholder_instantiated<S: Into<String>>(class_name: S) -> Self {
        Self::PlaceholderInstantiated {
            class_name: class_name.into(),
        }
    }

    /// Create an identifier-conflict error
    pub fn identifier_conflict<I, E, A>(identifier: I, existing: E, attempted: A) -> Self
    where
        I: Into<String>,
        E: Into<String>,
        A: Into<String>,
    {
        Self::IdentifierConflict {
            identifier: identifier.into(),
            existing: existing.into(),
            attempted: attempted.into(),
        }
    }

    /// Create a construction error
    pub fn construction<C: Into<String>, M: Into<String>>(class_name: C, message: M) -> Self {
        Self::Construction {
            class_name: class_name.into(),
            message: message.into(),
        }
    }
}

// Infrastructure constructors
impl Error {
    /// Create an I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
            source: None,
        }
    }

    /// Create an I/O error with source
    pub fn io_with_source<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        message: S,
        source: E,
    ) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}
