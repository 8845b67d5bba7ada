pub mod asset;
pub mod bar;
pub mod news;
pub mod request_params;
pub mod snapshot;
pub mod timeframe;
