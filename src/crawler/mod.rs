// Pipeline components, leaf-first: transport and parsing, then rendering,
// merging and the orchestrator that drives them.
pub mod browser;
pub mod config;
pub mod crawler;
pub mod errors;
pub mod file_manager;
pub mod logging;
pub mod merger;
pub mod renderer;
pub mod robots;
pub mod sitemap;
pub mod transport;
