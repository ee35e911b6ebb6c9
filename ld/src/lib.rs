pub mod error;
pub mod image;
pub mod linker;
pub mod merge;
pub mod resolve;

pub use error::LinkError;
pub use linker::{link, LinkOptions, LinkedImage};
pub use merge::{Layout, MergePlan, SectionMerger};
pub use resolve::{RelocResolver, ResolvedSym};
