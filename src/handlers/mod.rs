pub mod api;
pub mod assistant;
pub mod events;
pub mod voice;
