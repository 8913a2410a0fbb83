mod local;

pub use local::{
    read_document, temp_path_for, write_document, LocalDocumentStorage, DEFAULT_TEMP_SUFFIX,
};
pub use taskdoc_core::DocumentBackend;
