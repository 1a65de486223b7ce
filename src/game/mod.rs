pub mod card;
pub mod completion;
pub mod game;
pub mod player;
pub mod store;
