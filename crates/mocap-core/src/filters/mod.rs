mod force_platforms_extractor;
mod ground_reaction_wrench;

pub use force_platforms_extractor::{extract_force_platforms, ForcePlatformsExtractor};
pub use ground_reaction_wrench::{compute_wrenches, GroundReactionWrenchFilter};
