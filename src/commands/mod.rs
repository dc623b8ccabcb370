pub mod export_ledger;
pub mod forecast;
pub mod forecast_all;
