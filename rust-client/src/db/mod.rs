pub mod meter_registry_queries;
