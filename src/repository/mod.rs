//! Coordinates the local database with the device library and the server.

mod folders;
mod photos;
mod server;

pub use folders::FoldersRepository;
pub use photos::PhotosRepository;
pub use server::ServerRepository;
