pub mod error;
pub mod events;
pub mod fanout;
pub mod handler;
pub mod presence;
pub mod registry;
pub mod relay;
pub mod rooms;
pub mod server;
pub mod session;
pub mod typing;

pub use fanout::Dispatcher;
pub use handler::Gateway;
pub use registry::RoomRegistry;
pub use rooms::Room;
