pub mod document_loader;
pub mod toml_loader;

pub use document_loader::{load_all_documents, load_document, mime_for_path};
pub use toml_loader::load_profile;
