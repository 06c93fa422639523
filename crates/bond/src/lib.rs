pub mod agent;
pub mod dispatcher;
pub mod errors;
pub mod models;
pub mod normalize;
pub mod providers;
pub mod registry;
pub mod schema;
pub mod store;
