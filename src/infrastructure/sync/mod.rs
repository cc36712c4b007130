//! Host-to-pod transports

mod rsync;

pub use rsync::RsyncTransport;
