//! Load types, load cases and load combinations

mod area;
mod distributed;
mod load_case;
mod load_combo;
mod node_load;
mod point_load;

pub use area::AreaLoad;
pub use distributed::DistributedLoad;
pub use load_case::{LoadCase, GRAVITY};
pub use load_combo::LoadCombination;
pub use node_load::NodeLoad;
pub use point_load::{LoadDirection, PointLoad};
