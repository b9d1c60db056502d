pub mod base_url;
pub mod surf_logging;
