//! Data access services: upstream sources and the dataset cache.

pub mod dataset_service;
pub mod postgres_service;
pub mod source;
pub mod supabase_service;
