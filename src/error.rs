use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CorralError {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config from {path}: {message}")]
    ConfigParse { path: String, message: String },

    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("libvirt: {message}")]
    #[diagnostic(help("{hint}"))]
    Libvirt { message: String, hint: String },

    #[error("storage pool '{name}' not found")]
    #[diagnostic(help(
        "create the pool, or point `pool` in the config (or CORRAL_POOL) at an existing one"
    ))]
    PoolNotFound { name: String },

    #[error(
        "multiple pools contain template files with the same name; results would be unpredictable"
    )]
    DuplicateTemplateNames,

    #[error("no VM template images matching the pattern")]
    NoMatchingTemplate,

    #[error("ambiguous pattern, matches: {matches:?}")]
    #[diagnostic(help("narrow the pattern until exactly one template image matches"))]
    AmbiguousPattern { matches: Vec<String> },

    #[error("VM name '{name}' was taken while preparing the image")]
    #[diagnostic(help(
        "a concurrent invocation claimed the name; re-run to pick the next free one"
    ))]
    NameTaken { name: String },

    #[error("`{command}` exited with status {code}")]
    CommandFailed { command: String, code: i32 },

    #[error("failed to run `{command}`")]
    CommandSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}
