//! stagehand-lib: resumable, multi-strategy source build orchestration.
//!
//! A [`manifest::Manifest`] lists components (source origin, patches, build
//! strategy, flags) and the immutable [`manifest::Settings`] every step runs
//! with. The [`orchestrator::Orchestrator`] walks the list against a
//! [`root::BuildRoot`], skipping components whose completion marker exists
//! and isolating failures to the component that caused them.

pub mod buildlog;
pub mod component;
pub mod consts;
pub mod dag;
pub mod execute;
pub mod extract;
pub mod fetch;
pub mod manifest;
pub mod orchestrator;
pub mod package;
pub mod preflight;
pub mod root;
pub mod state;
pub mod strategy;
pub mod util;
