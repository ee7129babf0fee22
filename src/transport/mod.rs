/// Inbound feed from the monitoring backend over Socket.IO
pub mod client;
pub mod decode;
pub mod packet;
pub mod session;

pub use client::KumaClient;
pub use session::{Credentials, Session, SessionAction};
