//! Monster Core
//!
//! Core types shared by the Monster deployment orchestrator.
//!
//! This crate contains:
//! - Domain types: node records, archive records, pipeline status
//! - DTOs: serializable summaries of deployments and nodes for display

pub mod domain;
pub mod dto;
