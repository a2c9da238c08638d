mod claim;
mod descriptor;
mod selection;

pub use claim::ApplyClaim;
pub use descriptor::{LensDescriptor, LensFacing};
pub use selection::{LensAction, LensSelectionState};
