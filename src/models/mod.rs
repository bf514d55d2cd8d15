pub mod document;
pub mod loaders;
pub mod profile;
pub mod report;

pub use document::{Batch, DocumentChunk, SourceDocument};
pub use loaders::{load_all_documents, load_profile};
pub use profile::{InvestorProfile, OccupierProfile, Persona, UserProfile};
pub use report::{FinalReport, PartialReport};
