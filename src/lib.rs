pub mod config;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod processing {
    pub mod color;
    pub mod decode;
    pub mod layout;
    pub mod surface;
}
pub mod tasks {
    pub mod drop_zone;
    pub mod loader;
    pub mod reducer;
    pub mod viewer;
    pub mod watch;
}
