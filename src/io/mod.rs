pub mod anchors;

#[cfg(feature = "io_ply")]
pub mod ply;
