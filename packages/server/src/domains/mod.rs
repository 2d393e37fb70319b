// Business domains
pub mod dispatch;
pub mod gateway;
pub mod geo_index;
pub mod presence;
pub mod ranking;
pub mod routing;
