//! Client for the GRID3 Nigeria ArcGIS FeatureServer catalog: discover
//! datasets, read their layer metadata, and pull spatially filtered feature
//! collections with transparent pagination.

pub mod async_grid3;
pub mod boundary;
pub mod catalog;
pub mod collection;
pub mod config;
pub mod domain;
pub mod error;
pub mod geometry;
pub mod grid3;
pub mod http;
pub mod metadata;
pub mod output;
pub mod preview;
pub mod query;
pub mod tui;
