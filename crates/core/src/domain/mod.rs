pub mod contract;
pub mod material;
pub mod recommendation;
